use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{debug, warn};
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio::task;

use crate::document::{self, StoredDocument};
use crate::donation::{Donation, EventCounters};
use crate::error::{Error, LocationError, Result};
use crate::event::Event;
use crate::version::Version;

const LOCK_FILE_NAME: &str = "RuleKitEvents.lock";
const APP_DIR_NAME: &str = "rulekit";
const GROUPS_DIR_NAME: &str = "groups";

/// Where the store keeps its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `$XDG_DATA_HOME/rulekit`, or `$HOME/.local/share/rulekit`.
    ApplicationDefault,
    /// A directory shared by every application configured with the same
    /// group identifier, under the application data directory.
    GroupContainer(String),
    /// An arbitrary existing directory.
    Directory(PathBuf),
}

impl StoreLocation {
    /// Resolve to a directory, creating the managed ones if needed.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] if no data directory can be found, the
    /// group identifier is unusable, or the directory cannot be created.
    pub fn resolve(&self) -> Result<PathBuf, LocationError> {
        let dir = match self {
            StoreLocation::ApplicationDefault => data_home()?.join(APP_DIR_NAME),
            StoreLocation::GroupContainer(identifier) => {
                if !is_valid_group_identifier(identifier) {
                    return Err(LocationError::MissingGroupIdentifier(identifier.clone()));
                }
                data_home()?
                    .join(APP_DIR_NAME)
                    .join(GROUPS_DIR_NAME)
                    .join(identifier)
            }
            StoreLocation::Directory(dir) => {
                if !dir.is_dir() {
                    return Err(LocationError::NotADirectory(dir.clone()));
                }
                return Ok(dir.clone());
            }
        };

        fs::create_dir_all(&dir).map_err(|source| LocationError::Unusable {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

fn data_home() -> Result<PathBuf, LocationError> {
    if let Some(dir) = env::var_os("XDG_DATA_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(".local").join("share"))
        .ok_or(LocationError::NoApplicationDirectory)
}

fn is_valid_group_identifier(identifier: &str) -> bool {
    !identifier.trim().is_empty()
        && identifier != "."
        && identifier != ".."
        && !identifier.contains(['/', '\\'])
}

/// Controls whether a store takes an advisory lock on its directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    /// Exclusive `flock` on `RuleKitEvents.lock`; a second store on the same
    /// directory fails with [`LocationError::Locked`].
    #[default]
    Flock,
    /// No locking. Two stores on one directory will overwrite each other.
    None,
}

/// Durable event counters and trigger timestamps.
///
/// Every operation takes the same async mutex, so reads and
/// read-modify-write updates never interleave. The document is loaded lazily
/// on first access and rewritten wholesale after each mutation. A mutation
/// that fails to persist leaves the in-memory document unchanged.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    document: Mutex<Option<StoredDocument>>,
    _lock: Option<File>,
}

impl Store {
    /// Open a store at the given location.
    ///
    /// Nothing is read from disk until the first operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Location`] if the location cannot be resolved or the
    /// lock is held by another store.
    pub fn open(location: &StoreLocation, lock_mode: LockMode) -> Result<Self> {
        let dir = location.resolve()?;
        let lock = match lock_mode {
            LockMode::Flock => Some(acquire_lock(&dir)?),
            LockMode::None => None,
        };

        Ok(Store {
            path: dir.join(document::FILE_NAME),
            document: Mutex::new(None),
            _lock: lock,
        })
    }

    /// Shorthand for a locked store in an existing directory.
    pub fn at(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(
            &StoreLocation::Directory(dir.as_ref().to_path_buf()),
            LockMode::Flock,
        )
    }

    /// Path of the persisted document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Counters of `event`, or empty counters if it was never donated.
    pub async fn donations(&self, event: &Event) -> EventCounters {
        self.read(|doc| doc.donations.get(event.as_str()).cloned())
            .await
            .unwrap_or_default()
    }

    /// Count one more donation of `event` and persist.
    ///
    /// Returns the updated counters.
    pub async fn record_donation(
        &self,
        event: &Event,
        app_version: Option<Version>,
    ) -> Result<EventCounters> {
        self.mutate(|doc| {
            let counters = doc
                .donations
                .get(event.as_str())
                .cloned()
                .unwrap_or_default()
                .record(Donation::now(app_version));
            doc.donations
                .insert(event.as_str().to_string(), counters.clone());
            counters
        })
        .await
    }

    /// Zero the counters of `event` and persist.
    pub async fn reset_donations(&self, event: &Event) -> Result<()> {
        self.mutate(|doc| {
            doc.donations
                .insert(event.as_str().to_string(), EventCounters::empty());
        })
        .await
    }

    /// When `trigger` last fired, if ever.
    pub async fn last_fired(&self, trigger: &str) -> Option<DateTime<Utc>> {
        self.read(|doc| doc.last_trigger.get(trigger).copied()).await
    }

    /// Record that `trigger` fired now and persist.
    pub async fn record_fired(&self, trigger: &str) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.record_fired_at(trigger, now).await?;
        Ok(now)
    }

    /// Record that `trigger` fired at `at` and persist.
    pub async fn record_fired_at(&self, trigger: &str, at: DateTime<Utc>) -> Result<()> {
        self.mutate(|doc| {
            doc.last_trigger.insert(trigger.to_string(), at);
        })
        .await
    }

    /// A copy of the whole in-memory document.
    pub async fn document(&self) -> StoredDocument {
        self.read(StoredDocument::clone).await
    }

    async fn read<T>(&self, f: impl FnOnce(&StoredDocument) -> T) -> T {
        let mut guard = self.document.lock().await;
        let doc = match guard.take() {
            Some(doc) => doc,
            None => self.load().await,
        };
        let output = f(&doc);
        *guard = Some(doc);
        output
    }

    // The lock stays held across the blocking save so updates never interleave.
    async fn mutate<T>(&self, f: impl FnOnce(&mut StoredDocument) -> T) -> Result<T> {
        let mut guard = self.document.lock().await;
        let current = match guard.take() {
            Some(doc) => doc,
            None => self.load().await,
        };

        let mut next = current.clone();
        let output = f(&mut next);
        *guard = Some(current);

        let path = self.path.clone();
        let saved = task::spawn_blocking(move || document::save(&path, &next).map(|()| next))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)))
            .map_err(|source| Error::Persistence {
                path: self.path.clone(),
                source,
            })?;

        *guard = Some(saved);
        Ok(output)
    }

    async fn load(&self) -> StoredDocument {
        let path = self.path.clone();
        task::spawn_blocking(move || load_or_discard(&path))
            .await
            .unwrap_or_else(|e| {
                warn!("rulekit: loading {} failed: {e}", self.path.display());
                StoredDocument::default()
            })
    }
}

fn acquire_lock(dir: &Path) -> Result<File, LocationError> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|source| LocationError::Unusable {
            path: path.clone(),
            source,
        })?;
    FileExt::try_lock_exclusive(&file).map_err(|_| LocationError::Locked { path })?;
    Ok(file)
}

// A missing file is an empty document; anything unreadable is thrown away.
fn load_or_discard(path: &Path) -> StoredDocument {
    match document::load(path) {
        Ok(Some(doc)) => doc,
        Ok(None) => {
            debug!("rulekit: no document at {}, starting empty", path.display());
            StoredDocument::default()
        }
        Err(e) => {
            warn!(
                "rulekit: discarding unreadable document {}: {e}",
                path.display()
            );
            if let Err(e) = document::delete(path) {
                warn!("rulekit: could not delete {}: {e}", path.display());
            }
            StoredDocument::default()
        }
    }
}
