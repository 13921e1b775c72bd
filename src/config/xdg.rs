//! Platform-aware path resolution for claude-monitor.
//!
//! On **Linux**, follows the XDG Base Directory Specification:
//! - Config/data: `$XDG_CONFIG_HOME/claude-monitor` or `~/.config/claude-monitor`
//! - Runtime (hook log): `$XDG_RUNTIME_DIR` or `/tmp`
//!
//! On **macOS**, uses Apple conventions with XDG env var overrides:
//! - Config/data: `$XDG_CONFIG_HOME/claude-monitor` or `~/Library/Application Support/claude-monitor`
//! - Runtime (hook log): `$XDG_RUNTIME_DIR` or `$TMPDIR` or `/tmp`
//!
//! The snapshot file lives next to the config (it must survive reboots for
//! readers); the hook event log lives in the runtime directory because hooks
//! from any terminal must be able to append to it.

use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "claude-monitor";

/// Returns the configuration directory for claude-monitor.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/claude-monitor` (if env var set, any platform)
/// 2. Platform default:
///    - Linux: `~/.config/claude-monitor`
///    - macOS: `~/Library/Application Support/claude-monitor`
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(APP_NAME);
    }
    platform_config_dir().join(APP_NAME)
}

/// Platform-native config base directory (without XDG override).
fn platform_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support
        dirs::config_dir().expect("could not determine config directory")
    }
    #[cfg(not(target_os = "macos"))]
    {
        // ~/.config (XDG default on Linux)
        dirs::home_dir()
            .expect("could not determine home directory")
            .join(".config")
    }
}

/// Returns the path to the main configuration file.
///
/// Resolves to `config_dir()/config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Returns the default path of the published snapshot document.
///
/// Resolves to `config_dir()/monitor_data.json`.
pub fn snapshot_path() -> PathBuf {
    config_dir().join("monitor_data.json")
}

/// Returns the runtime directory for transient files.
///
/// Resolution order:
/// 1. `$XDG_RUNTIME_DIR` (if set, any platform)
/// 2. Platform default:
///    - Linux: `/tmp`
///    - macOS: `$TMPDIR` or `/tmp`
pub fn runtime_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(xdg);
    }
    platform_runtime_dir()
}

/// Platform-native runtime directory (without XDG override).
fn platform_runtime_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // macOS sets TMPDIR to a per-user secure directory, better than /tmp.
        std::env::var("TMPDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        PathBuf::from("/tmp")
    }
}

/// Returns the default path of the hook event log.
///
/// Resolves to `runtime_dir()/claude-monitor/hook_events.jsonl`. Hooks
/// running in any terminal append here; the daemon only reads (and
/// compacts) it.
pub fn hook_log_path() -> PathBuf {
    runtime_dir().join(APP_NAME).join("hook_events.jsonl")
}

/// Expands a leading `~` in a path string to the user's home directory.
///
/// If the path does not start with `~`, it is returned as-is.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = dirs::home_dir().expect("could not determine home directory");
        home.join(rest)
    } else if path == "~" {
        dirs::home_dir().expect("could not determine home directory")
    } else {
        PathBuf::from(path)
    }
}

/// Creates a directory and all parent directories with mode 0700.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Creates the configuration directory if it does not exist, returning its path.
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}
