use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::donation::EventCounters;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::executor::{Executor, MainQueue};
use crate::option::RuleOption;
use crate::rule::{EvalContext, Rule};
use crate::store::{LockMode, Store, StoreLocation};
use crate::trigger::{Signal, Trigger};
use crate::version::Version;

const DEFAULT_SIGNAL_CAPACITY: usize = 64;

/// A trigger bound to the rule that fires it.
///
/// Built with [`Registration::broadcast`] or [`Registration::callback`] and
/// handed to [`RuleKit::register`].
#[derive(Debug)]
pub struct Registration {
    trigger: Trigger,
    options: Vec<RuleOption>,
    executor: Executor,
    rule: Rule,
}

impl Registration {
    pub fn new(trigger: Trigger, rule: Rule) -> Self {
        Registration {
            trigger,
            options: Vec::new(),
            executor: Executor::default(),
            rule,
        }
    }

    /// Broadcast `signal` when `rule` is fulfilled. The trigger is named
    /// after the signal unless [`named`](Self::named) says otherwise.
    pub fn broadcast(signal: impl Into<Signal>, rule: Rule) -> Self {
        Self::new(Trigger::broadcast(signal), rule)
    }

    /// Call `callback` when `rule` is fulfilled.
    pub fn callback<F>(name: impl Into<String>, callback: F, rule: Rule) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(Trigger::callback(name, callback), rule)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.trigger = self.trigger.with_name(name);
        self
    }

    pub fn option(mut self, option: RuleOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options(mut self, options: impl IntoIterator<Item = RuleOption>) -> Self {
        self.options.extend(options);
        self
    }

    /// Run the trigger's action on `executor` instead of the main queue.
    pub fn executor(mut self, executor: Executor) -> Self {
        self.executor = executor;
        self
    }
}

#[derive(Debug)]
struct Binding {
    trigger: Trigger,
    rule: Rule,
    executor: Executor,
}

/// Builder for [`RuleKit`].
///
/// # Examples
///
/// ```
/// use rulekit::{LockMode, RuleKit};
///
/// let kit = RuleKit::builder()
///     .app_version("2.4.1")
///     .lock_mode(LockMode::None)
///     .build();
/// assert!(!kit.is_configured());
/// ```
#[derive(Debug)]
pub struct RuleKitBuilder {
    app_version: Option<Version>,
    lock_mode: LockMode,
    signal_capacity: usize,
}

impl RuleKitBuilder {
    fn new() -> Self {
        RuleKitBuilder {
            app_version: None,
            lock_mode: LockMode::default(),
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }

    /// Version stamped on every donation.
    pub fn app_version(mut self, version: impl Into<Version>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    pub fn lock_mode(mut self, mode: LockMode) -> Self {
        self.lock_mode = mode;
        self
    }

    /// How many undelivered broadcasts a slow subscriber may lag behind.
    pub fn signal_capacity(mut self, capacity: usize) -> Self {
        self.signal_capacity = capacity.max(1);
        self
    }

    /// An unconfigured kit. Call [`RuleKit::configure`] before donating.
    pub fn build(self) -> RuleKit {
        let (signals, _) = broadcast::channel(self.signal_capacity);
        RuleKit {
            inner: Arc::new(Inner {
                store: OnceLock::new(),
                configuring: Mutex::new(()),
                bindings: RwLock::new(Vec::new()),
                signals,
                main_queue: MainQueue::default(),
                app_version: self.app_version,
                lock_mode: self.lock_mode,
            }),
        }
    }

    /// Build and configure in one step.
    ///
    /// # Errors
    ///
    /// See [`RuleKit::configure`].
    pub fn configure(self, location: StoreLocation) -> Result<RuleKit> {
        let kit = self.build();
        kit.configure(location)?;
        Ok(kit)
    }
}

#[derive(Debug)]
struct Inner {
    store: OnceLock<Arc<Store>>,
    configuring: Mutex<()>,
    bindings: RwLock<Vec<Arc<Binding>>>,
    signals: broadcast::Sender<Signal>,
    main_queue: MainQueue,
    app_version: Option<Version>,
    lock_mode: LockMode,
}

/// Counts event donations and fires triggers whose rules are fulfilled.
///
/// Create one handle at startup, configure it once, and share clones of it
/// wherever events are donated. Every donation updates the store, then
/// re-evaluates every registered rule concurrently and fires each one that
/// is fulfilled. A rule that stays fulfilled fires again on the next
/// donation unless an option such as [`RuleOption::TriggerFrequency`] stops
/// it.
#[derive(Debug, Clone)]
pub struct RuleKit {
    inner: Arc<Inner>,
}

impl Default for RuleKit {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleKit {
    /// An unconfigured kit with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> RuleKitBuilder {
        RuleKitBuilder::new()
    }

    /// Open the store at `location`. Allowed exactly once per kit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyConfigured`] on a second call, leaving the
    /// first store in place, or [`Error::Location`] if the location is
    /// unusable.
    pub fn configure(&self, location: StoreLocation) -> Result<()> {
        let _configuring = self
            .inner
            .configuring
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.store.get().is_some() {
            return Err(Error::AlreadyConfigured);
        }

        let store = Store::open(&location, self.inner.lock_mode)?;
        debug!("rulekit: configured store at {}", store.path().display());
        self.inner
            .store
            .set(Arc::new(store))
            .map_err(|_| Error::AlreadyConfigured)
    }

    pub fn is_configured(&self) -> bool {
        self.inner.store.get().is_some()
    }

    /// The configured store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before [`configure`](Self::configure).
    pub fn store(&self) -> Result<&Arc<Store>> {
        self.inner.store.get().ok_or(Error::NotInitialized)
    }

    /// Receive every signal posted by broadcast triggers from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.inner.signals.subscribe()
    }

    /// Add a binding. Bindings are kept in registration order and never
    /// replace each other, even under the same trigger name.
    pub fn register(&self, registration: Registration) {
        let Registration {
            trigger,
            options,
            executor,
            rule,
        } = registration;

        let rule = if options.is_empty() {
            rule
        } else {
            Rule::with_options(options, trigger.name(), rule)
        };

        self.inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(Binding {
                trigger,
                rule,
                executor,
            }));
    }

    /// Broadcast `signal` whenever `rule` is fulfilled.
    pub fn set_rule(&self, signal: impl Into<Signal>, options: Vec<RuleOption>, rule: Rule) {
        self.register(Registration::broadcast(signal, rule).options(options));
    }

    /// Call `callback` whenever `rule` is fulfilled.
    pub fn set_callback_rule<F>(
        &self,
        name: impl Into<String>,
        callback: F,
        options: Vec<RuleOption>,
        rule: Rule,
    ) where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(Registration::callback(name, callback, rule).options(options));
    }

    /// Remove every binding whose trigger is named `name`. Returns how many
    /// were removed.
    pub fn unregister(&self, name: &str) -> usize {
        let mut bindings = self
            .inner
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = bindings.len();
        bindings.retain(|binding| binding.trigger.name() != name);
        before - bindings.len()
    }

    /// Trigger names of every binding, in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.bindings()
            .iter()
            .map(|binding| binding.trigger.name().to_string())
            .collect()
    }

    /// Record one occurrence of `event`, then fire every fulfilled trigger.
    ///
    /// Returns once every rule has been evaluated. Failures are logged and
    /// swallowed. Dropping the returned future cancels the evaluations still
    /// in flight.
    pub async fn donate(&self, event: &Event) {
        self.donate_cancellable(event, &CancellationToken::new())
            .await;
    }

    /// Like [`donate`](Self::donate), but evaluations stop when
    /// `cancellation` is cancelled. Delay options that are cut short veto
    /// their rule.
    pub async fn donate_cancellable(&self, event: &Event, cancellation: &CancellationToken) {
        if let Err(e) = self.try_donate(event, cancellation).await {
            error!("rulekit: donation failed for event {event}: {e}");
        }
    }

    /// Donate in the background without waiting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn send_donation(&self, event: impl Into<Event>) {
        let kit = self.clone();
        let event = event.into();
        drop(tokio::spawn(async move { kit.donate(&event).await }));
    }

    /// Current counters of `event`. Empty if it was never donated or the kit
    /// is not configured.
    pub async fn donations(&self, event: &Event) -> EventCounters {
        match self.store() {
            Ok(store) => store.donations(event).await,
            Err(e) => {
                error!("rulekit: reading donations for event {event} failed: {e}");
                EventCounters::empty()
            }
        }
    }

    /// Zero the counters of `event`. Failures are logged and swallowed.
    pub async fn reset(&self, event: &Event) {
        let result = match self.store() {
            Ok(store) => store.reset_donations(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!("rulekit: resetting donations failed for event {event}: {e}");
        }
    }

    /// Reset in the background without waiting.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn reset_donation(&self, event: impl Into<Event>) {
        let kit = self.clone();
        let event = event.into();
        drop(tokio::spawn(async move { kit.reset(&event).await }));
    }

    /// When the trigger named `name` last fired.
    pub async fn last_fired(&self, name: &str) -> Option<DateTime<Utc>> {
        self.store().ok()?.last_fired(name).await
    }

    async fn try_donate(&self, event: &Event, cancellation: &CancellationToken) -> Result<()> {
        let store = Arc::clone(self.store()?);
        let counters = store
            .record_donation(event, self.inner.app_version.clone())
            .await?;
        debug!("rulekit: event {event} donated, count {}", counters.count);

        self.trigger_fulfilled_rules(store, cancellation.child_token())
            .await;
        Ok(())
    }

    // Each binding is evaluated on its own task so a delayed rule never holds
    // up the others. Triggers fire as soon as their own rule is decided.
    async fn trigger_fulfilled_rules(&self, store: Arc<Store>, cancellation: CancellationToken) {
        let guard = cancellation.clone().drop_guard();
        let mut evaluations = JoinSet::new();

        for binding in self.bindings() {
            let kit = self.clone();
            let ctx =
                EvalContext::new(Arc::clone(&store)).with_cancellation(cancellation.clone());
            evaluations.spawn(async move { kit.evaluate(&binding, &ctx).await });
        }

        while let Some(result) = evaluations.join_next().await {
            if let Err(e) = result {
                warn!("rulekit: rule evaluation did not complete: {e}");
            }
        }
        drop(guard.disarm());
    }

    async fn evaluate(&self, binding: &Binding, ctx: &EvalContext) {
        if !binding.rule.is_fulfilled(ctx).await || ctx.cancellation().is_cancelled() {
            return;
        }

        let name = binding.trigger.name();
        debug!("rulekit: firing trigger {name}");

        let trigger = binding.trigger.clone();
        let signals = self.inner.signals.clone();
        binding.executor.submit(
            &self.inner.main_queue,
            Box::new(move || trigger.execute(&signals)),
        );

        if let Err(e) = ctx.store().record_fired(name).await {
            error!("rulekit: recording trigger {name} failed: {e}");
        }
    }

    fn bindings(&self) -> Vec<Arc<Binding>> {
        self.inner
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
