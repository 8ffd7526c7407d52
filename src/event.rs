use serde::{Deserialize, Serialize};
use std::fmt;

use crate::donation::EventCounters;

/// The name of something the application counts, e.g. `"app.launched"`.
///
/// An event is only a key into the store. It owns no state; its counters
/// live in the persisted document and are read fresh on every evaluation.
///
/// # Examples
///
/// ```
/// use rulekit::Event;
///
/// let launched = Event::new("app.launched");
/// assert_eq!(launched.as_str(), "app.launched");
/// assert_eq!(launched, Event::from("app.launched"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(String);

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Event(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event(name)
    }
}

/// An event together with its counters at the moment a rule looked at them.
///
/// This is what [`Rule::event`](crate::Rule::event) predicates receive.
#[derive(Debug, Clone, PartialEq)]
pub struct DonatedEvent {
    pub event: Event,
    pub donations: EventCounters,
}
