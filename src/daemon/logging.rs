//! Logging initialization for the monitor daemon.
//!
//! Configures the `tracing` subscriber with level filtering via the `CMON_LOG`
//! environment variable. Falls back to the configured `daemon.log_level` when
//! the variable is unset.
//!
//! # Usage
//!
//! ```bash
//! # Default (config log_level, info by default)
//! cmon daemon
//!
//! # Debug level
//! CMON_LOG=debug cmon daemon
//!
//! # Module-specific filtering
//! CMON_LOG=claude_monitor=debug,warn cmon daemon
//! ```

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::schema::LogLevel;

/// Initialize the tracing subscriber.
///
/// Reads the `CMON_LOG` environment variable for filter directives; when it
/// is unset or invalid, uses `fallback` from the configuration.
///
/// Output is written to stderr, which works for foreground mode and is
/// redirected to /dev/null when daemonized.
///
/// # Panics
///
/// Panics if a global subscriber has already been set (should only be
/// called once, at daemon startup).
pub fn init(fallback: LogLevel) {
    let filter = EnvFilter::try_from_env("CMON_LOG")
        .unwrap_or_else(|_| EnvFilter::new(fallback.as_filter()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_filter_parses_valid_directives() {
        let directives = ["info", "debug", "warn", "error", "trace"];
        for d in directives {
            assert!(EnvFilter::try_new(d).is_ok(), "failed to parse directive: {}", d);
        }
    }

    #[test]
    fn env_filter_parses_module_directive() {
        assert!(EnvFilter::try_new("claude_monitor=debug,warn").is_ok());
    }

    #[test]
    fn all_log_levels_are_valid_directives() {
        for level in [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert!(EnvFilter::try_new(level.as_filter()).is_ok());
        }
    }
}
