//! Atomic snapshot persistence.
//!
//! The store owns the one file through which the daemon talks to its
//! readers. Every write is a full atomic replacement — serialize, write a
//! temp file in the target directory, fsync, rename — so a reader opening
//! the path mid-write sees either the previous complete document or the new
//! one, never a torn mix. A failed write leaves the previous snapshot on
//! disk, still valid; the daemon simply retries next tick.
//!
//! An optional mirror path receives the same document after each primary
//! write (for cloud-synced consumers such as the widget). Mirror failures
//! are logged and never fail the primary write.
//!
//! Readers use the file's modification time against a configured threshold
//! as their staleness signal: old data is "stale", not wrong.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::MonitoringSnapshot;

/// Errors from snapshot persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The snapshot could not be serialized or parsed.
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Reading or writing a snapshot file failed.
    #[error("snapshot I/O failed at {path}")]
    Io {
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No snapshot exists yet.
    #[error("no snapshot at {path}")]
    Missing {
        /// Expected snapshot path.
        path: PathBuf,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Durable read/write of the shared snapshot document.
pub struct SnapshotStore {
    path: PathBuf,
    mirror_path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Create a store for `path` with an optional mirror.
    pub fn new(path: PathBuf, mirror_path: Option<PathBuf>) -> Self {
        Self { path, mirror_path }
    }

    /// Primary snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a snapshot atomically, then mirror it best-effort.
    pub fn write(&self, snapshot: &MonitoringSnapshot) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        write_atomic(&self.path, &json)?;
        debug!(path = %self.path.display(), "snapshot written");

        if let Some(mirror) = &self.mirror_path {
            if let Err(e) = write_atomic(mirror, &json) {
                warn!(path = %mirror.display(), error = %e, "snapshot mirror write failed");
            }
        }

        Ok(())
    }

    /// Read the current snapshot back.
    pub fn read(&self) -> Result<MonitoringSnapshot, StoreError> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::Missing {
                    path: self.path.clone(),
                }
            } else {
                io_err(&self.path, e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Age of the snapshot file, if it exists.
    pub fn age(&self) -> Option<Duration> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        modified.elapsed().ok()
    }

    /// Whether readers should treat the snapshot as stale. A missing file
    /// is stale by definition.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        match self.age() {
            Some(age) => age > threshold,
            None => true,
        }
    }
}

/// Write `content` to `path` via temp file + fsync + rename.
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }

    let timestamp = Utc::now().format("%Y%m%d-%H%M%S%f");
    let temp_path = path.with_file_name(format!(
        ".{}.tmp.{}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string()),
        timestamp
    ));

    fs::write(&temp_path, content).map_err(|e| io_err(&temp_path, e))?;

    let file = File::open(&temp_path).map_err(|e| io_err(&temp_path, e))?;
    file.sync_all().map_err(|e| io_err(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| {
        // Leave the temp file behind as a safety copy for diagnosis.
        io_err(path, e)
    })
}
