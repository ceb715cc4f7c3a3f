//! Whole-file JSON stores: read fully, merge in memory, replace atomically.
//!
//! A missing, empty or unparseable file reads as an empty structure. The old
//! file is only replaced once the new content is completely written, so a
//! crash mid-batch loses that batch and nothing else. Not safe against
//! concurrent writers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Result, SiftError};
use crate::types::{Direction, Message, sort_messages};

/// Read a store, failing with `StoreCorrupt` if it exists but won't parse.
/// Absent and empty files yield `Ok(None)`.
pub fn try_load<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read(path).map_err(|e| SiftError::io(path, e))?;
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| SiftError::StoreCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Read a store, starting from an empty structure on any read problem.
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match try_load(path) {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!(path = %path.display(), "Store missing or empty, starting fresh");
            T::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Store unreadable, starting fresh");
            T::default()
        }
    }
}

/// Replace a store with `value`, writing to a sibling temp file first.
pub fn save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| SiftError::io(dir, e))?;
    let data = serde_json::to_vec_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SiftError::io(dir, e))?;
    tmp.write_all(&data).map_err(|e| SiftError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| SiftError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| SiftError::io(path, e.error))?;
    debug!(path = %path.display(), bytes = data.len(), "Store written");
    Ok(())
}

/// Append messages to a chronological log, skipping ones already logged.
/// Returns the number of messages actually added.
pub fn append_messages(path: &Path, new: &[Message]) -> Result<usize> {
    if new.is_empty() {
        return Ok(0);
    }
    let mut all: Vec<Message> = load_or_default(path);
    let mut seen: HashSet<(Direction, String)> = all.iter().map(Message::key).collect();
    let mut added = 0;
    for msg in new {
        if seen.insert(msg.key()) {
            all.push(msg.clone());
            added += 1;
        }
    }
    sort_messages(&mut all);
    save(path, &all)?;
    Ok(added)
}

/// Ids already present in a message log.
pub fn logged_ids(path: &Path) -> HashSet<String> {
    let all: Vec<Message> = load_or_default(path);
    all.into_iter().map(|m| m.id).collect()
}
