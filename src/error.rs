use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by [`RuleKit`](crate::RuleKit) and [`Store`](crate::Store).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// `configure` was called on a handle that already owns a store.
    #[error("rulekit is already configured")]
    AlreadyConfigured,

    /// A store operation was issued before `configure` succeeded.
    #[error("rulekit store is not initialized, call configure first")]
    NotInitialized,

    /// The configured storage location could not be turned into a usable path.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Writing the document to disk failed. In-memory state is left untouched.
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a [`StoreLocation`](crate::StoreLocation) could not be resolved.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LocationError {
    /// Neither `XDG_DATA_HOME` nor `HOME` points somewhere usable.
    #[error("could not find an application data directory")]
    NoApplicationDirectory,

    /// The group identifier is empty or not a single path component.
    #[error("invalid or missing group identifier {0:?}")]
    MissingGroupIdentifier(String),

    /// An explicit location was given that is not an existing directory.
    #[error("store location {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The directory exists (or should) but cannot be created or opened.
    #[error("store location {} is unusable: {source}", path.display())]
    Unusable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Another store holds the advisory lock for this document.
    #[error("another store holds the lock on {}", path.display())]
    Locked { path: PathBuf },
}
