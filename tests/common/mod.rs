#![allow(dead_code)]

use rulekit::{Rule, RuleKit, Store, StoreLocation};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn kit_in(dir: &Path) -> RuleKit {
    RuleKit::builder()
        .app_version("1.4.0")
        .configure(StoreLocation::Directory(dir.to_path_buf()))
        .unwrap()
}

pub fn store_in(dir: &Path) -> Arc<Store> {
    Arc::new(Store::at(dir).unwrap())
}

pub fn always() -> Rule {
    Rule::condition(|| async { true })
}

pub fn never() -> Rule {
    Rule::condition(|| async { false })
}

/// A condition that counts how many times it was evaluated.
pub fn counted(evaluations: &Arc<AtomicUsize>, result: bool) -> Rule {
    let evaluations = Arc::clone(evaluations);
    Rule::condition(move || {
        evaluations.fetch_add(1, Ordering::SeqCst);
        async move { result }
    })
}

pub fn counter_callback(fired: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
    let fired = Arc::clone(fired);
    move || {
        fired.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn recording_callback(
    log: &Arc<Mutex<Vec<&'static str>>>,
    label: &'static str,
) -> impl Fn() + Send + Sync + 'static {
    let log = Arc::clone(log);
    move || log.lock().unwrap().push(label)
}

/// Wait until `counter` reaches `expected`. Trigger actions run after
/// `donate` returns, on the kit's main queue.
pub async fn wait_for(counter: &AtomicUsize, expected: usize) -> bool {
    for _ in 0..200 {
        if counter.load(Ordering::SeqCst) >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    counter.load(Ordering::SeqCst) >= expected
}

/// Let queued trigger actions run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
