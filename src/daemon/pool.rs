//! Bounded subprocess pool with event-based completion signaling.
//!
//! The pool caps how many external commands run at once via an owned-permit
//! semaphore; a permit is held by the worker task for the lifetime of the
//! command and released by drop on every exit path (success, failure,
//! timeout, cancellation), so repeated timeouts cannot leak worker slots.
//!
//! Completion is signaled exactly once per task through a oneshot channel —
//! callers `await` the [`TaskHandle`], they never poll. A caller-side wait
//! timeout abandons the task: the worker's eventual send lands in a closed
//! channel and is discarded, and the child process itself is bounded by a
//! hard in-worker timeout (`kill_on_drop` reaps it).

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, warn};

/// A command to execute: program plus arguments.
///
/// The program is resolved via `PATH`; the pool augments `PATH` with the
/// well-known bin directories that GUI/launchd environments strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or absolute path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Convenience constructor.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    /// Exit code, `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecOutcome {
    /// True when the command exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Errors surfaced by pool execution.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool was configured with zero workers.
    #[error("subprocess pool needs at least one worker")]
    NoWorkers,

    /// The caller's wait timed out; the task was abandoned.
    #[error("task timed out after {0:?}")]
    WaitTimeout(Duration),

    /// The command ran past its hard timeout and was killed.
    #[error("command killed after exceeding {0:?}")]
    CommandTimeout(Duration),

    /// The command could not be spawned at all.
    #[error("failed to spawn {program}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The worker task vanished without signaling completion.
    #[error("worker dropped before signaling completion")]
    WorkerGone,
}

/// Handle to a submitted task. Await [`TaskHandle::wait`] for the result.
pub struct TaskHandle {
    rx: oneshot::Receiver<Result<ExecOutcome, PoolError>>,
}

impl TaskHandle {
    /// Wait for the task to complete, up to `timeout`.
    ///
    /// On timeout the task is abandoned: the worker keeps its slot until
    /// its own hard timeout fires, then releases it; whatever it produces
    /// is discarded.
    pub async fn wait(self, timeout: Duration) -> Result<ExecOutcome, PoolError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(PoolError::WorkerGone),
            Err(_) => Err(PoolError::WaitTimeout(timeout)),
        }
    }
}

/// Bounded-concurrency subprocess executor.
///
/// Cloning is cheap; clones share the same worker slots.
#[derive(Clone, Debug)]
pub struct SubprocessPool {
    slots: Arc<Semaphore>,
    command_timeout: Duration,
}

impl SubprocessPool {
    /// Create a pool with `max_workers` concurrent slots and a hard
    /// per-command timeout.
    ///
    /// Failing to create the pool is a startup-fatal condition for the
    /// daemon, so this is the only constructor and it validates its input.
    pub fn new(max_workers: usize, command_timeout: Duration) -> Result<Self, PoolError> {
        if max_workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(max_workers)),
            command_timeout,
        })
    }

    /// Submit a command for execution.
    ///
    /// Returns immediately; the command starts once a worker slot frees up.
    /// Safe to call concurrently from multiple tasks.
    pub fn submit(&self, spec: CommandSpec) -> TaskHandle {
        let (tx, rx) = oneshot::channel();
        let slots = Arc::clone(&self.slots);
        let hard_timeout = self.command_timeout;

        tokio::spawn(async move {
            // Slot held for the whole command; released by drop on every path.
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                // Semaphore closed: pool torn down, nothing to signal into.
                Err(_) => return,
            };

            let result = run_command(&spec, hard_timeout).await;
            if tx.send(result).is_err() {
                // Caller abandoned the task (wait timeout); result discarded.
                debug!(program = %spec.program, "discarding result of abandoned task");
            }
        });

        TaskHandle { rx }
    }
}

/// Execute one command with a hard timeout, capturing stdout/stderr.
async fn run_command(spec: &CommandSpec, hard_timeout: Duration) -> Result<ExecOutcome, PoolError> {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(&spec.args)
        .env("PATH", augmented_path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(hard_timeout, cmd.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(PoolError::Spawn {
                program: spec.program.clone(),
                source: e,
            })
        }
        Err(_) => {
            // Dropping the output future kills the child (kill_on_drop).
            warn!(program = %spec.program, timeout = ?hard_timeout, "command exceeded hard timeout");
            return Err(PoolError::CommandTimeout(hard_timeout));
        }
    };

    Ok(ExecOutcome {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// `PATH` with the well-known bin directories prepended.
///
/// Daemons launched from launchd or cron get a minimal `PATH` that misses
/// Homebrew and node installs; the usage command usually lives there.
fn augmented_path() -> String {
    let mut parts = vec![
        "/usr/local/bin".to_string(),
        "/usr/bin".to_string(),
        "/bin".to_string(),
        "/opt/homebrew/bin".to_string(),
    ];
    if let Ok(current) = std::env::var("PATH") {
        for p in current.split(':') {
            if !p.is_empty() && !parts.iter().any(|existing| existing == p) {
                parts.push(p.to_string());
            }
        }
    }
    parts.join(":")
}
