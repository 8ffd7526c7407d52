//! Count named events, persist their aggregates, and fire triggers when a
//! declarative rule tree is fulfilled.
//!
//! "Ask for a review after five launches, at most once a month":
//!
//! ```no_run
//! use rulekit::{Event, Frequency, Rule, RuleKit, RuleOption, StoreLocation};
//!
//! # async fn run() -> rulekit::Result<()> {
//! let kit = RuleKit::builder()
//!     .app_version("3.1.0")
//!     .configure(StoreLocation::ApplicationDefault)?;
//!
//! kit.set_rule(
//!     "ask.review",
//!     vec![RuleOption::trigger_frequency(Frequency::Monthly)],
//!     Rule::event("app.launched", |e| e.donations.count >= 5),
//! );
//!
//! let mut signals = kit.subscribe();
//! kit.donate(&Event::new("app.launched")).await;
//! # let _ = signals.try_recv();
//! # Ok(())
//! # }
//! ```

pub mod document;
mod donation;
mod error;
mod event;
mod executor;
mod kit;
mod option;
mod rule;
mod store;
mod trigger;
pub mod version;

pub use document::StoredDocument;
pub use donation::{Donation, EventCounters};
pub use error::{Error, LocationError, Result};
pub use event::{DonatedEvent, Event};
pub use executor::Executor;
pub use kit::{Registration, RuleKit, RuleKitBuilder};
pub use option::{Frequency, RuleOption, VetoFn};
pub use rule::{ConditionPredicate, EvalContext, EventPredicate, OptionsRule, Rule};
pub use store::{LockMode, Store, StoreLocation};
pub use tokio_util::sync::CancellationToken;
pub use trigger::{Callback, Signal, Trigger, TriggerAction};
pub use version::Version;
