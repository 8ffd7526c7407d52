use log::warn;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// A fired trigger waiting to run.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a fired trigger's action runs.
///
/// Submission never waits for the action. A panicking action is logged and
/// does not affect the dispatcher.
#[derive(Debug, Clone, Default)]
pub enum Executor {
    /// The kit's primary context: one task running actions one at a time,
    /// in the order they were fired.
    #[default]
    Main,
    /// A new Tokio task per action.
    Spawn,
    /// Tokio's blocking pool, for actions that block.
    Blocking,
    /// A new task on a specific runtime.
    Handle(Handle),
}

impl Executor {
    pub(crate) fn submit(&self, main: &MainQueue, job: Job) {
        match self {
            Executor::Main => main.submit(job),
            Executor::Spawn => drop(tokio::spawn(async move { run_guarded(job) })),
            Executor::Blocking => drop(tokio::task::spawn_blocking(move || run_guarded(job))),
            Executor::Handle(handle) => drop(handle.spawn(async move { run_guarded(job) })),
        }
    }
}

/// Serial queue behind [`Executor::Main`].
///
/// The worker task is spawned on the runtime of the first submission.
#[derive(Debug, Default)]
pub(crate) struct MainQueue {
    sender: OnceLock<mpsc::UnboundedSender<Job>>,
}

impl MainQueue {
    fn submit(&self, job: Job) {
        let sender = self.sender.get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded_channel();
            drop(tokio::spawn(drain(receiver)));
            sender
        });

        // Worker gone with its runtime; run in place rather than lose the action.
        if let Err(mpsc::error::SendError(job)) = sender.send(job) {
            warn!("rulekit: main queue is closed, running trigger inline");
            run_guarded(job);
        }
    }
}

async fn drain(mut receiver: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = receiver.recv().await {
        run_guarded(job);
    }
}

fn run_guarded(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        warn!("rulekit: trigger action panicked");
    }
}
