//! TOML configuration schema for the Claude session monitor.
//!
//! All structs derive `Deserialize` and `Serialize` with sensible defaults via
//! `#[serde(default)]`, so a partial (or absent) config file always yields a
//! usable configuration. Duration fields use human-readable strings
//! (e.g. `"10s"`, `"30m"`, `"5h"`) parsed by the `humantime` crate through
//! the accessor methods below; an unparsable value logs a warning and falls
//! back to the built-in default rather than failing the daemon.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Parse a humantime duration string, falling back to `default` with a
/// warning when the value is invalid.
fn duration_or(value: &str, default: Duration, field: &'static str) -> Duration {
    match humantime::parse_duration(value) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!(field, value, error = %e, "invalid duration in config, using default");
            default
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration encompassing all sections.
///
/// Corresponds to the full TOML file structure:
/// ```toml
/// [collector]
/// [pool]
/// [activity]
/// [resolver]
/// [notifications]
/// [daemon]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Usage collection settings (external command, billing window).
    pub collector: CollectorConfig,
    /// Subprocess pool settings.
    pub pool: PoolConfig,
    /// Activity tracker and hook log settings.
    pub activity: ActivityConfig,
    /// Project name resolver cache settings.
    pub resolver: ResolverConfig,
    /// Notification and rate limiting settings.
    pub notifications: NotificationsConfig,
    /// Daemon process settings (snapshot paths, logging).
    pub daemon: DaemonConfig,
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Settings for the usage-reporting command and billing window.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CollectorConfig {
    /// How often the daemon collects usage data (e.g. `"10s"`).
    pub fetch_interval: String,
    /// Day of month (1-31) on which the billing period starts. Days past
    /// the end of a month clamp to its last day.
    pub billing_start_day: u32,
    /// The usage-reporting command, resolved via `PATH`.
    pub command: String,
    /// Fixed arguments passed to the command.
    pub args: Vec<String>,
    /// Optional wrapper script tried before the direct command. When unset,
    /// `<config dir>/ccusage-wrapper.sh` is probed.
    pub wrapper_path: Option<String>,
    /// Hard timeout after which a running command is killed.
    pub command_timeout: String,
    /// How long a caller waits for a pooled task before abandoning it.
    /// Slightly larger than `command_timeout` so queueing delay does not
    /// count against the command itself.
    pub wait_timeout: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            fetch_interval: "10s".to_string(),
            billing_start_day: 1,
            command: "ccusage".to_string(),
            args: vec!["blocks".to_string(), "--json".to_string()],
            wrapper_path: None,
            command_timeout: "30s".to_string(),
            wait_timeout: "35s".to_string(),
        }
    }
}

impl CollectorConfig {
    /// Collection interval as a [`Duration`].
    pub fn fetch_interval(&self) -> Duration {
        duration_or(&self.fetch_interval, Duration::from_secs(10), "collector.fetch_interval")
    }

    /// Hard per-command timeout as a [`Duration`].
    pub fn command_timeout(&self) -> Duration {
        duration_or(&self.command_timeout, Duration::from_secs(30), "collector.command_timeout")
    }

    /// Caller-side wait timeout as a [`Duration`].
    pub fn wait_timeout(&self) -> Duration {
        duration_or(&self.wait_timeout, Duration::from_secs(35), "collector.wait_timeout")
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Subprocess pool settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of concurrently running subprocesses. Must be at
    /// least 1; pool creation fails otherwise.
    pub max_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { max_workers: 2 }
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// Activity tracker thresholds and hook log maintenance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ActivityConfig {
    /// Override for the hook event log path. When unset, the runtime
    /// directory default is used.
    pub log_path: Option<String>,
    /// After a Stop event, a project stays "waiting for user" for this long.
    pub waiting_threshold: String,
    /// After a Stop event, a project counts as "idle" until this elapses.
    pub idle_threshold: String,
    /// A project with no events for this long is dropped entirely.
    pub session_ttl: String,
    /// Maximum events retained per project session.
    pub max_event_history: usize,
    /// Entry count above which the hook log is compacted.
    pub compact_threshold: usize,
    /// Entries retained by a compaction pass.
    pub compact_retain: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            waiting_threshold: "2m".to_string(),
            idle_threshold: "30m".to_string(),
            session_ttl: "5h".to_string(),
            max_event_history: 20,
            compact_threshold: 100,
            compact_retain: 50,
        }
    }
}

impl ActivityConfig {
    /// Waiting-for-user threshold as a [`Duration`].
    pub fn waiting_threshold(&self) -> Duration {
        duration_or(&self.waiting_threshold, Duration::from_secs(120), "activity.waiting_threshold")
    }

    /// Idle threshold as a [`Duration`].
    pub fn idle_threshold(&self) -> Duration {
        duration_or(&self.idle_threshold, Duration::from_secs(1800), "activity.idle_threshold")
    }

    /// Session time-to-live as a [`Duration`].
    pub fn session_ttl(&self) -> Duration {
        duration_or(&self.session_ttl, Duration::from_secs(5 * 3600), "activity.session_ttl")
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Project name resolver cache settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ResolverConfig {
    /// Soft cap on cached entries; least-recently-used entries past the
    /// retention floor are evicted above this.
    pub cache_capacity: usize,
    /// An entry used within this window is never evicted, even under cap
    /// pressure.
    pub retention_floor: String,
    /// Basename-resolved entries older than this get one fresh git probe
    /// on their next hit.
    pub reprobe_interval: String,
    /// Timeout for the `git rev-parse` probe.
    pub git_timeout: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100,
            retention_floor: "15m".to_string(),
            reprobe_interval: "1h".to_string(),
            git_timeout: "5s".to_string(),
        }
    }
}

impl ResolverConfig {
    /// Minimum retention window as a [`Duration`].
    pub fn retention_floor(&self) -> Duration {
        duration_or(&self.retention_floor, Duration::from_secs(900), "resolver.retention_floor")
    }

    /// Re-probe interval as a [`Duration`].
    pub fn reprobe_interval(&self) -> Duration {
        duration_or(&self.reprobe_interval, Duration::from_secs(3600), "resolver.reprobe_interval")
    }

    /// Git probe timeout as a [`Duration`].
    pub fn git_timeout(&self) -> Duration {
        duration_or(&self.git_timeout, Duration::from_secs(5), "resolver.git_timeout")
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Notification thresholds and per-alert-kind cooldowns.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Master switch; when false no notifications are dispatched.
    pub enabled: bool,
    /// Warn when an active billing session ends within this window.
    pub time_remaining_alert: String,
    /// Alert when a project has been idle for this long.
    pub inactivity_alert: String,
    /// Cooldown between time-remaining alerts for the same session.
    pub time_remaining_cooldown: String,
    /// Cooldown between inactivity alerts for the same project.
    pub inactivity_cooldown: String,
    /// Cooldown between collection-error alerts.
    pub error_cooldown: String,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time_remaining_alert: "30m".to_string(),
            inactivity_alert: "10m".to_string(),
            time_remaining_cooldown: "5m".to_string(),
            inactivity_cooldown: "10m".to_string(),
            error_cooldown: "3m".to_string(),
        }
    }
}

impl NotificationsConfig {
    /// Time-remaining warning window as a [`Duration`].
    pub fn time_remaining_alert(&self) -> Duration {
        duration_or(&self.time_remaining_alert, Duration::from_secs(1800), "notifications.time_remaining_alert")
    }

    /// Inactivity alert threshold as a [`Duration`].
    pub fn inactivity_alert(&self) -> Duration {
        duration_or(&self.inactivity_alert, Duration::from_secs(600), "notifications.inactivity_alert")
    }

    /// Time-remaining cooldown as a [`Duration`].
    pub fn time_remaining_cooldown(&self) -> Duration {
        duration_or(&self.time_remaining_cooldown, Duration::from_secs(300), "notifications.time_remaining_cooldown")
    }

    /// Inactivity cooldown as a [`Duration`].
    pub fn inactivity_cooldown(&self) -> Duration {
        duration_or(&self.inactivity_cooldown, Duration::from_secs(600), "notifications.inactivity_cooldown")
    }

    /// Collection-error cooldown as a [`Duration`].
    pub fn error_cooldown(&self) -> Duration {
        duration_or(&self.error_cooldown, Duration::from_secs(180), "notifications.error_cooldown")
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon process configuration from the TOML `[daemon]` section.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Override for the published snapshot path. When unset, the config
    /// directory default is used.
    pub snapshot_path: Option<String>,
    /// Optional secondary path the snapshot is mirrored to after every
    /// primary write (e.g. a cloud-synced folder for the widget). Mirror
    /// failures are logged, never fatal.
    pub mirror_path: Option<String>,
    /// Snapshot age beyond which readers should report the data as stale.
    pub stale_after: String,
    /// Logging verbosity when the `CMON_LOG` env var is unset.
    pub log_level: LogLevel,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            mirror_path: None,
            stale_after: "30s".to_string(),
            log_level: LogLevel::Info,
        }
    }
}

impl DaemonConfig {
    /// Staleness threshold as a [`Duration`].
    pub fn stale_after(&self) -> Duration {
        duration_or(&self.stale_after, Duration::from_secs(30), "daemon.stale_after")
    }
}

/// Log verbosity levels (kebab-case in TOML).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages (default).
    Info,
    /// Debug-level detail.
    Debug,
    /// Full trace output.
    Trace,
}

impl LogLevel {
    /// The `tracing_subscriber::EnvFilter` directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}
