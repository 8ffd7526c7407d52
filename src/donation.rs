use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::version::Version;

/// One recorded occurrence of an event.
///
/// Donations are never stored one by one. Only the first and the last of
/// each event survive, inside [`EventCounters`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Donation {
    pub id: Uuid,

    /// Application version at the time of the donation, when the embedder
    /// provided one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<Version>,

    pub date: DateTime<Utc>,
}

impl Donation {
    /// A fresh donation stamped with a random id and the current time.
    pub fn now(app_version: Option<Version>) -> Self {
        Donation {
            id: Uuid::new_v4(),
            app_version,
            date: Utc::now(),
        }
    }
}

/// Aggregate counters of one event.
///
/// `count == 0` exactly when `first` and `last` are both `None`. Once set,
/// `first` is kept until the counters are reset.
///
/// # Examples
///
/// ```
/// use rulekit::{Donation, EventCounters};
///
/// let counters = EventCounters::default();
/// assert_eq!(counters.count, 0);
/// assert!(counters.first.is_none());
///
/// let once = counters.record(Donation::now(None));
/// let twice = once.record(Donation::now(None));
/// assert_eq!(twice.count, 2);
/// assert_eq!(twice.first, once.first);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EventCounters {
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Donation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Donation>,
}

impl EventCounters {
    /// The counters of an event that was never donated (or was reset).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Counters after one more donation.
    pub fn record(&self, donation: Donation) -> Self {
        EventCounters {
            count: self.count.saturating_add(1),
            first: Some(self.first.clone().unwrap_or_else(|| donation.clone())),
            last: Some(donation),
        }
    }
}
