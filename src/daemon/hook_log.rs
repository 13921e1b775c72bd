//! Hook event log I/O.
//!
//! The log is a JSON Lines file appended to by Claude Code hooks — processes
//! entirely outside this daemon's control. The daemon treats it as an
//! untrusted input source: an absent file means no events, malformed lines
//! are skipped on read, and nothing here assumes the file only ever grows.
//!
//! Compaction bounds the file: past a threshold the most recent entries are
//! kept and the file is atomically replaced (temp write + fsync + rename),
//! so an external writer appending mid-compaction lands wholly before or
//! wholly after the swap, never inside a torn write. Retained lines are
//! preserved byte-for-byte — the compactor does not re-serialize content it
//! did not write.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::HookEventKind;

/// One entry of the hook event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    /// Working directory the hook fired in.
    pub project_path: std::path::PathBuf,
    /// Event kind.
    pub kind: HookEventKind,
    /// When the hook fired (UTC).
    pub timestamp: DateTime<Utc>,
}

/// Errors from log maintenance operations.
#[derive(Debug, Error)]
pub enum HookLogError {
    /// Reading or writing the log file failed.
    #[error("hook log I/O failed at {path}")]
    Io {
        /// Affected path.
        path: std::path::PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An event could not be serialized for appending.
    #[error("failed to encode hook event: {0}")]
    Encode(#[from] serde_json::Error),
}

fn io_err(path: &Path, source: std::io::Error) -> HookLogError {
    HookLogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parse all events from the log.
///
/// An absent file is equivalent to no events. Malformed lines are skipped
/// with a warning; one bad writer must not blind the tracker.
pub fn read_events(path: &Path) -> Vec<HookEvent> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read hook log");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<HookEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping malformed hook log line");
            }
        }
    }
    events
}

/// Append one event to the log, creating the file and its directory if
/// needed. Used by the `cmon hook` command invoked from Claude Code hooks.
pub fn append_event(path: &Path, event: &HookEvent) -> Result<(), HookLogError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let mut line = serde_json::to_string(event)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    file.write_all(line.as_bytes()).map_err(|e| io_err(path, e))
}

/// The log's modification time, if the file exists.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Compact the log when it has grown past `threshold` entries, retaining
/// only the most recent `retain` lines.
///
/// Works on a snapshot of the file content and swaps the replacement in
/// atomically. Returns `Ok(true)` when a rewrite happened.
pub fn compact(path: &Path, threshold: usize, retain: usize) -> Result<bool, HookLogError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(io_err(path, e)),
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() <= threshold {
        return Ok(false);
    }

    let tail = &lines[lines.len() - retain..];
    let mut replacement = tail.join("\n");
    replacement.push('\n');

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S%f");
    let temp_path = path.with_file_name(format!(
        ".{}.tmp.{}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "hook_log".to_string()),
        timestamp
    ));

    fs::write(&temp_path, &replacement).map_err(|e| io_err(&temp_path, e))?;

    // Fsync before the rename so the swap never exposes a short file.
    let file = File::open(&temp_path).map_err(|e| io_err(&temp_path, e))?;
    file.sync_all().map_err(|e| io_err(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| io_err(path, e))?;

    debug!(
        removed = lines.len() - retain,
        kept = retain,
        "compacted hook log"
    );
    Ok(true)
}
