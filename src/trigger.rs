use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Callback run when a callback trigger fires.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// A named broadcast posted to every [`RuleKit::subscribe`](crate::RuleKit::subscribe) receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signal(String);

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Signal(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Signal {
    fn from(name: &str) -> Self {
        Signal::new(name)
    }
}

impl From<String> for Signal {
    fn from(name: String) -> Self {
        Signal(name)
    }
}

/// What a trigger does when it fires.
#[derive(Clone)]
pub enum TriggerAction {
    Broadcast(Signal),
    Callback(Callback),
}

/// A named action fired when its rule is fulfilled.
///
/// The name keys the trigger's last-fired timestamp in the store, so two
/// registrations sharing a name also share their throttling.
#[derive(Clone)]
pub struct Trigger {
    name: String,
    action: TriggerAction,
}

impl Trigger {
    /// A broadcast trigger named after its signal.
    pub fn broadcast(signal: impl Into<Signal>) -> Self {
        let signal = signal.into();
        Trigger {
            name: signal.name().to_string(),
            action: TriggerAction::Broadcast(signal),
        }
    }

    pub fn callback<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Trigger {
            name: name.into(),
            action: TriggerAction::Callback(Arc::new(callback)),
        }
    }

    /// Rename the trigger, keeping its action.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn action(&self) -> &TriggerAction {
        &self.action
    }

    /// Run the action. Broadcasts with no subscriber are dropped.
    pub fn execute(&self, signals: &broadcast::Sender<Signal>) {
        match &self.action {
            TriggerAction::Broadcast(signal) => {
                let _ = signals.send(signal.clone());
            }
            TriggerAction::Callback(callback) => callback(),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match &self.action {
            TriggerAction::Broadcast(signal) => format!("Broadcast({signal})"),
            TriggerAction::Callback(_) => "Callback(..)".to_string(),
        };
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("action", &action)
            .finish()
    }
}
