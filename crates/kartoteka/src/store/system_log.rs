//! Low-level action log kept at `Logs/system-log.json`.
//!
//! Each append is a read-modify-write of the whole document, keeping only the
//! newest [`MAX_LOG_ENTRIES`] entries. Appends are serialized by a process-wide
//! lock; nothing protects against a second process writing the same file.

use super::bridge::FileBridge;
use super::layout::{self, Layout, SYSTEM_LOG_INDEX};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

pub const MAX_LOG_ENTRIES: usize = 1000;

static APPEND_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
}

pub fn read_logs<B: FileBridge + ?Sized>(bridge: &B, layout: &Layout) -> Result<Vec<LogEntry>> {
    let path = layout.index_path(&SYSTEM_LOG_INDEX);
    match layout::read_index(bridge, &path, SYSTEM_LOG_INDEX.field) {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Append one entry, evicting the oldest ones beyond the cap.
pub fn append<B: FileBridge + ?Sized>(bridge: &B, layout: &Layout, message: &str) -> Result<()> {
    let _guard = APPEND_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    let path = layout.index_path(&SYSTEM_LOG_INDEX);

    let mut logs = match read_logs(bridge, layout) {
        Ok(logs) => logs,
        Err(e) => {
            warn!("system log unreadable, starting a new one: {}", e);
            Vec::new()
        }
    };
    logs.push(LogEntry {
        timestamp: Utc::now(),
        action: message.to_string(),
    });
    if logs.len() > MAX_LOG_ENTRIES {
        let excess = logs.len() - MAX_LOG_ENTRIES;
        logs.drain(..excess);
    }
    layout::write_index(bridge, &path, SYSTEM_LOG_INDEX.field, &logs)
}

/// Fire-and-forget variant: a failed append is logged and otherwise ignored.
pub fn log_action<B: FileBridge + ?Sized>(bridge: &B, layout: &Layout, message: &str) {
    if let Err(e) = append(bridge, layout, message) {
        warn!("failed to append to system log: {}", e);
    }
}
