mod common;

use chrono::{Duration, Utc};
use common::store_in;
use futures::future::join_all;
use rulekit::document::FILE_NAME;
use rulekit::{Error, Event, LocationError, LockMode, Store, StoreLocation, Version};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_never_donated_event_is_empty() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    let counters = store.donations(&Event::new("never")).await;
    assert_eq!(counters.count, 0);
    assert!(counters.first.is_none());
    assert!(counters.last.is_none());
}

#[tokio::test]
async fn test_first_donation_is_first_and_last() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let event = Event::new("launch");

    store
        .record_donation(&event, Some(Version::new("2.1")))
        .await
        .unwrap();

    let counters = store.donations(&event).await;
    assert_eq!(counters.count, 1);
    assert_eq!(counters.first, counters.last);
    let first = counters.first.unwrap();
    assert_eq!(first.app_version, Some(Version::new("2.1")));
}

#[tokio::test]
async fn test_repeated_donations_keep_first() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let event = Event::new("launch");

    let after_first = store.record_donation(&event, None).await.unwrap();
    for _ in 0..4 {
        store.record_donation(&event, None).await.unwrap();
    }

    let counters = store.donations(&event).await;
    assert_eq!(counters.count, 5);
    assert_eq!(counters.first, after_first.first);
    assert_ne!(counters.first, counters.last);
    assert!(counters.first.unwrap().date <= counters.last.unwrap().date);
}

#[tokio::test]
async fn test_events_are_counted_separately() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    store.record_donation(&Event::new("a"), None).await.unwrap();
    store.record_donation(&Event::new("a"), None).await.unwrap();
    store.record_donation(&Event::new("b"), None).await.unwrap();

    assert_eq!(store.donations(&Event::new("a")).await.count, 2);
    assert_eq!(store.donations(&Event::new("b")).await.count, 1);
}

#[tokio::test]
async fn test_reset_zeroes_counters() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let event = Event::new("launch");

    for _ in 0..3 {
        store.record_donation(&event, None).await.unwrap();
    }
    store.reset_donations(&event).await.unwrap();

    let counters = store.donations(&event).await;
    assert!(counters.is_empty());
    assert!(counters.first.is_none());
    assert!(counters.last.is_none());

    // Counting starts over with a new first donation.
    let counters = store.record_donation(&event, None).await.unwrap();
    assert_eq!(counters.count, 1);
    assert_eq!(counters.first, counters.last);
}

#[tokio::test]
async fn test_reset_of_unknown_event_is_empty() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    store.reset_donations(&Event::new("ghost")).await.unwrap();
    assert!(store.donations(&Event::new("ghost")).await.is_empty());
}

#[tokio::test]
async fn test_last_fired_round_trip() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());

    assert!(store.last_fired("ask.review").await.is_none());
    let fired_at = store.record_fired("ask.review").await.unwrap();
    assert_eq!(store.last_fired("ask.review").await, Some(fired_at));

    let earlier = Utc::now() - Duration::days(3);
    store.record_fired_at("ask.review", earlier).await.unwrap();
    assert_eq!(store.last_fired("ask.review").await, Some(earlier));
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let event = Event::new("launch");

    let (counters, fired_at) = {
        let store = Store::at(dir.path()).unwrap();
        store.record_donation(&event, None).await.unwrap();
        let counters = store.record_donation(&event, None).await.unwrap();
        let fired_at = store.record_fired("ask.review").await.unwrap();
        (counters, fired_at)
    };

    let store = Store::at(dir.path()).unwrap();
    assert_eq!(store.donations(&event).await, counters);
    assert_eq!(store.last_fired("ask.review").await, Some(fired_at));
}

#[tokio::test]
async fn test_corrupt_document_resets_silently() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(FILE_NAME);
    fs::write(&path, b"\x00\x01 definitely not a document").unwrap();

    let store = store_in(dir.path());
    let counters = store.donations(&Event::new("launch")).await;

    assert!(counters.is_empty());
    assert!(!path.exists(), "corrupt document should be discarded");

    store
        .record_donation(&Event::new("launch"), None)
        .await
        .unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn test_document_is_loaded_lazily() {
    let dir = tempdir().unwrap();
    let store = Store::at(dir.path()).unwrap();

    // Written after open but before first access.
    {
        let other = Store::open(
            &StoreLocation::Directory(dir.path().to_path_buf()),
            LockMode::None,
        )
        .unwrap();
        other
            .record_donation(&Event::new("launch"), None)
            .await
            .unwrap();
    }

    assert_eq!(store.donations(&Event::new("launch")).await.count, 1);
}

#[tokio::test]
async fn test_failed_write_leaves_counters_unchanged() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("store");
    fs::create_dir(&store_dir).unwrap();
    let store = Store::at(&store_dir).unwrap();
    let event = Event::new("launch");

    store.record_donation(&event, None).await.unwrap();
    fs::remove_dir_all(&store_dir).unwrap();

    let err = store.record_donation(&event, None).await.unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }), "got {err:?}");
    assert_eq!(store.donations(&event).await.count, 1);

    let err = store.reset_donations(&event).await.unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
    assert_eq!(store.donations(&event).await.count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_donations_are_serialized() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let event = Event::new("tap");

    let donations = (0..50).map(|_| {
        let store = Arc::clone(&store);
        let event = event.clone();
        tokio::spawn(async move { store.record_donation(&event, None).await })
    });
    for result in join_all(donations).await {
        result.unwrap().unwrap();
    }

    assert_eq!(store.donations(&event).await.count, 50);
    let reopened = store.document().await;
    assert_eq!(reopened.donations["tap"].count, 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_donations_keep_dates_ordered() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let event = Event::new("tap");

    let donations = (0..32).map(|_| {
        let store = Arc::clone(&store);
        let event = event.clone();
        tokio::spawn(async move { store.record_donation(&event, None).await })
    });
    let mut newest = None;
    for result in join_all(donations).await {
        let counters = result.unwrap().unwrap();
        let date = counters.last.unwrap().date;
        newest = newest.max(Some(date));
    }

    let counters = store.donations(&event).await;
    let first = counters.first.unwrap();
    let last = counters.last.unwrap();
    assert!(first.date <= last.date, "{} > {}", first.date, last.date);
    assert_eq!(Some(last.date), newest);
}

#[tokio::test]
async fn test_disk_io_does_not_stall_other_tasks() {
    let dir = tempdir().unwrap();
    let store = store_in(dir.path());
    let (ran_tx, mut ran_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = ran_tx.send(());
    });

    store
        .record_donation(&Event::new("launch"), None)
        .await
        .unwrap();

    assert!(ran_rx.try_recv().is_ok());
}

#[test]
fn test_second_store_fails_on_lock() {
    let dir = tempdir().unwrap();
    let _first = Store::at(dir.path()).unwrap();

    let err = Store::at(dir.path()).unwrap_err();
    assert!(
        matches!(err, Error::Location(LocationError::Locked { .. })),
        "got {err:?}"
    );
    assert!(err.to_string().contains("RuleKitEvents.lock"));
}

#[test]
fn test_lock_released_on_drop() {
    let dir = tempdir().unwrap();
    {
        let _store = Store::at(dir.path()).unwrap();
    }
    let _store = Store::at(dir.path()).unwrap();
}

#[test]
fn test_lock_mode_none_allows_multiple() {
    let dir = tempdir().unwrap();
    let location = StoreLocation::Directory(dir.path().to_path_buf());
    let _first = Store::open(&location, LockMode::None).unwrap();
    let _second = Store::open(&location, LockMode::None).unwrap();
}

#[test]
fn test_store_path() {
    let dir = tempdir().unwrap();
    let store = Store::at(dir.path()).unwrap();
    assert_eq!(store.path(), dir.path().join(FILE_NAME));
}
