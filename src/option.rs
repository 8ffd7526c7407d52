use chrono::{DateTime, Days, Local, Months, TimeDelta, TimeZone, Utc};
use futures::future::{BoxFuture, FutureExt};
use log::debug;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::rule::EvalContext;

/// A user-supplied veto. Receives the trigger name, returns `true` to veto.
pub type VetoFn = Arc<dyn Fn(String) -> BoxFuture<'static, bool> + Send + Sync>;

/// How often a throttled trigger may fire at most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// `last` plus one calendar unit, in `last`'s own time zone.
    ///
    /// Months, quarters and years keep the day of month, clamped to the end
    /// of shorter months. Returns `None` if the result does not exist in the
    /// time zone.
    pub fn next_allowed<Tz: TimeZone>(&self, last: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let last = last.clone();
        match self {
            Frequency::Hourly => last.checked_add_signed(TimeDelta::hours(1)),
            Frequency::Daily => last.checked_add_days(Days::new(1)),
            Frequency::Weekly => last.checked_add_days(Days::new(7)),
            Frequency::Monthly => last.checked_add_months(Months::new(1)),
            Frequency::Quarterly => last.checked_add_months(Months::new(3)),
            Frequency::Yearly => last.checked_add_months(Months::new(12)),
        }
    }

    /// Earliest instant after `last_fired` at which the trigger may fire again.
    ///
    /// Calendar arithmetic happens in local time; when the local result is
    /// ambiguous or skipped, UTC is used instead.
    pub fn earliest_next_fire(&self, last_fired: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.next_allowed(&last_fired.with_timezone(&Local))
            .map(|next| next.with_timezone(&Utc))
            .or_else(|| self.next_allowed(&last_fired))
    }
}

/// A side condition attached to a rule that can veto its fulfillment.
///
/// Options are checked in order before the wrapped rule. The first one that
/// vetoes makes the rule unfulfilled and the rule itself is not evaluated.
#[derive(Clone)]
pub enum RuleOption {
    /// Veto while less than one calendar unit has passed since the trigger
    /// last fired.
    TriggerFrequency(Frequency),
    /// Wait the full duration before letting the rule be evaluated. Vetoes
    /// if evaluation is cancelled during the wait.
    Delay(Duration),
    /// Any other veto.
    Custom(VetoFn),
}

impl RuleOption {
    pub fn trigger_frequency(frequency: Frequency) -> Self {
        RuleOption::TriggerFrequency(frequency)
    }

    pub fn delay(duration: Duration) -> Self {
        RuleOption::Delay(duration)
    }

    /// Wrap an async veto. `veto` receives the trigger name.
    pub fn custom<F, Fut>(veto: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        RuleOption::Custom(Arc::new(move |trigger| veto(trigger).boxed()))
    }

    /// Returns `true` if this option prevents `trigger` from firing now.
    pub async fn prevents_fulfillment(&self, trigger: &str, ctx: &EvalContext) -> bool {
        match self {
            RuleOption::TriggerFrequency(frequency) => {
                let Some(last_fired) = ctx.store().last_fired(trigger).await else {
                    return false;
                };
                match frequency.earliest_next_fire(last_fired) {
                    Some(next) => Utc::now() < next,
                    None => false,
                }
            }
            RuleOption::Delay(duration) => {
                tokio::select! {
                    biased;
                    _ = ctx.cancellation().cancelled() => {
                        debug!("rulekit: delay for trigger {trigger} interrupted");
                        true
                    }
                    _ = tokio::time::sleep(*duration) => false,
                }
            }
            RuleOption::Custom(veto) => veto(trigger.to_string()).await,
        }
    }
}

impl fmt::Debug for RuleOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOption::TriggerFrequency(frequency) => {
                f.debug_tuple("TriggerFrequency").field(frequency).finish()
            }
            RuleOption::Delay(duration) => f.debug_tuple("Delay").field(duration).finish(),
            RuleOption::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
