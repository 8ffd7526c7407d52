//! The persisted document holding every counter and last-fired timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::donation::EventCounters;

/// File name of the document inside the resolved store directory.
pub const FILE_NAME: &str = "RuleKitEvents.json";

/// All durable state: counters by event name, last firing by trigger name.
///
/// The whole document is rewritten on every mutation. It is plain JSON and
/// can be inspected directly:
///
/// ```text
/// $ cat RuleKitEvents.json | jq .
/// {
///   "donations": {
///     "app.launched": { "count": 3, "first": { ... }, "last": { ... } }
///   },
///   "lastTrigger": { "ask.review": "2024-05-01T09:12:44.120Z" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct StoredDocument {
    #[serde(default)]
    pub donations: BTreeMap<String, EventCounters>,

    #[serde(default)]
    pub last_trigger: BTreeMap<String, DateTime<Utc>>,
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Replace the document at `path` with `document`.
///
/// The JSON goes to a `.json.tmp` sibling, is flushed to disk, and is then
/// renamed over `path`. Readers see either the old document or the new one.
pub fn save(path: &Path, document: &StoredDocument) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(document).map_err(io::Error::other)?;

    let tmp = tmp_path(path);
    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_data()?;
    drop(file);

    fs::rename(&tmp, path)
}

/// Load the document from disk.
///
/// Returns `Ok(None)` if the file doesn't exist. Content that does not
/// decode is reported as [`io::ErrorKind::InvalidData`]; the caller decides
/// whether to discard it.
pub fn load(path: &Path) -> io::Result<Option<StoredDocument>> {
    let contents = match fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    serde_json::from_slice(&contents)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Remove the document and any leftover `.json.tmp` sibling.
///
/// Files that are already gone are not an error.
pub fn delete(path: &Path) -> io::Result<()> {
    [path.to_path_buf(), tmp_path(path)]
        .iter()
        .try_for_each(|file| match fs::remove_file(file) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        })
}
