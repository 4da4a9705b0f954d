//! File-based cross-process hand-off of one canonical event.
//!
//! A producer writes the event as JSON to a well-known path; a separate
//! consumer reads it back. Writes go to a sibling temp file and are renamed
//! into place so a reader never observes a half-written document. This is a
//! placeholder for a real broker, not a durability guarantee.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use carelink_core::error::Result;
use carelink_core::CanonicalEvent;

/// Lets the owner of a write abandon it before the commit rename.
///
/// Cancelling and committing take the same lock, so a write either lands
/// completely before `cancel` returns or not at all.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: Mutex<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        *self.lock() = true;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-event sibling temp file, so an abandoned write never clobbers a newer one.
fn temp_path(path: &Path, event_id: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(event_id);
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_event(path: &Path, event: &CanonicalEvent) -> Result<()> {
    write_event_unless(path, event, &CancelToken::new()).map(|_| ())
}

/// Like [`write_event`], but gives up before the rename once `cancel` is set.
/// Returns whether the event was committed.
pub fn write_event_unless(path: &Path, event: &CanonicalEvent, cancel: &CancelToken) -> Result<bool> {
    if cancel.is_cancelled() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_vec_pretty(event)?;
    let tmp = temp_path(path, &event.id);
    fs::write(&tmp, body)?;

    let cancelled = cancel.lock();
    if *cancelled {
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::debug!(error = %e, tmp = %tmp.display(), "abandoned hand-off temp file not removed");
        }
        tracing::debug!(event_id = %event.id, "hand-off abandoned before commit");
        return Ok(false);
    }
    fs::rename(&tmp, path)?;
    Ok(true)
}

/// `Ok(None)` when nothing has been handed off yet.
pub fn read_event(path: &Path) -> Result<Option<CanonicalEvent>> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(CanonicalEvent::from_json(&s)?))
}

/// Read and remove the hand-off file (consume semantics).
pub fn take_event(path: &Path) -> Result<Option<CanonicalEvent>> {
    let event = read_event(path)?;
    if event.is_some() {
        fs::remove_file(path)?;
    }
    Ok(event)
}
