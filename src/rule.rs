use futures::future::{BoxFuture, FutureExt};
use log::debug;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::event::{DonatedEvent, Event};
use crate::option::RuleOption;
use crate::store::Store;

/// Predicate over the counters of one event.
pub type EventPredicate = Arc<dyn Fn(&DonatedEvent) -> bool + Send + Sync>;

/// Predicate with no event context, possibly async.
pub type ConditionPredicate = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// What a rule needs while it is being evaluated.
///
/// Cloning is cheap; the store is shared and the cancellation token is a
/// handle to the same signal.
#[derive(Debug, Clone)]
pub struct EvalContext {
    store: Arc<Store>,
    cancellation: CancellationToken,
}

impl EvalContext {
    pub fn new(store: Arc<Store>) -> Self {
        EvalContext {
            store,
            cancellation: CancellationToken::new(),
        }
    }

    /// Evaluate under `cancellation`. A cancelled delay option vetoes.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// A boolean rule tree, re-evaluated from scratch on every donation.
///
/// Combinators evaluate their children in order and stop at the first
/// child that decides the result, so later children are never touched.
///
/// # Examples
///
/// ```
/// use rulekit::Rule;
///
/// // Three launches, and the user has not opted out.
/// let rule = Rule::all_of([
///     Rule::event("app.launched", |e| e.donations.count >= 3),
///     Rule::condition(|| async { true }),
/// ]);
/// assert!(matches!(rule, Rule::AllOf(ref children) if children.len() == 2));
/// ```
#[derive(Clone)]
pub enum Rule {
    /// Fulfilled when the predicate holds for the event's current counters.
    Event {
        event: Event,
        condition: EventPredicate,
    },
    /// Fulfilled when the predicate resolves to `true`.
    Condition(ConditionPredicate),
    /// Fulfilled when every child is. Empty is fulfilled.
    AllOf(Vec<Rule>),
    /// Fulfilled when any child is. Empty is unfulfilled.
    AnyOf(Vec<Rule>),
    /// A rule guarded by options bound to a trigger.
    WithOptions(OptionsRule),
}

/// A rule whose options may veto it on behalf of `trigger`.
#[derive(Debug, Clone)]
pub struct OptionsRule {
    pub options: Vec<RuleOption>,
    pub trigger: String,
    pub rule: Box<Rule>,
}

impl Rule {
    pub fn event<F>(event: impl Into<Event>, condition: F) -> Self
    where
        F: Fn(&DonatedEvent) -> bool + Send + Sync + 'static,
    {
        Rule::Event {
            event: event.into(),
            condition: Arc::new(condition),
        }
    }

    pub fn condition<F, Fut>(predicate: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Rule::Condition(Arc::new(move || predicate().boxed()))
    }

    pub fn all_of(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::AllOf(rules.into_iter().collect())
    }

    pub fn any_of(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rule::AnyOf(rules.into_iter().collect())
    }

    pub fn with_options(
        options: impl IntoIterator<Item = RuleOption>,
        trigger: impl Into<String>,
        rule: Rule,
    ) -> Self {
        Rule::WithOptions(OptionsRule {
            options: options.into_iter().collect(),
            trigger: trigger.into(),
            rule: Box::new(rule),
        })
    }

    /// Options attached directly to this rule, if it is an options rule.
    pub fn options(&self) -> &[RuleOption] {
        match self {
            Rule::WithOptions(decorated) => &decorated.options,
            _ => &[],
        }
    }

    /// Evaluate the rule. Event rules read the store on every call.
    pub fn is_fulfilled<'a>(&'a self, ctx: &'a EvalContext) -> BoxFuture<'a, bool> {
        async move {
            match self {
                Rule::Event { event, condition } => {
                    let donations = ctx.store().donations(event).await;
                    condition(&DonatedEvent {
                        event: event.clone(),
                        donations,
                    })
                }
                Rule::Condition(predicate) => predicate().await,
                Rule::AllOf(rules) => {
                    for rule in rules {
                        if !rule.is_fulfilled(ctx).await {
                            return false;
                        }
                    }
                    true
                }
                Rule::AnyOf(rules) => {
                    for rule in rules {
                        if rule.is_fulfilled(ctx).await {
                            return true;
                        }
                    }
                    false
                }
                Rule::WithOptions(decorated) => decorated.is_fulfilled(ctx).await,
            }
        }
        .boxed()
    }
}

impl OptionsRule {
    pub async fn is_fulfilled(&self, ctx: &EvalContext) -> bool {
        for option in &self.options {
            if option.prevents_fulfillment(&self.trigger, ctx).await {
                debug!("rulekit: {option:?} vetoed trigger {}", self.trigger);
                return false;
            }
        }
        self.rule.is_fulfilled(ctx).await
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Event { event, .. } => f.debug_struct("Event").field("event", event).finish(),
            Rule::Condition(_) => f.write_str("Condition(..)"),
            Rule::AllOf(rules) => f.debug_tuple("AllOf").field(rules).finish(),
            Rule::AnyOf(rules) => f.debug_tuple("AnyOf").field(rules).finish(),
            Rule::WithOptions(decorated) => f.debug_tuple("WithOptions").field(decorated).finish(),
        }
    }
}
