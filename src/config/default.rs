//! Creation of the default configuration file.

use std::fs;
use std::path::PathBuf;

use crate::config::error::ConfigError;
use crate::config::schema::Config;
use crate::config::xdg;

/// Write a default `config.toml` at the XDG config path.
///
/// Refuses to overwrite an existing file unless `force` is set; with
/// `force`, the previous file is kept as `config.toml.bak`.
///
/// Returns the path of the created file.
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();

    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists { path });
        }
        let backup = path.with_extension("toml.bak");
        fs::rename(&path, &backup).map_err(|e| ConfigError::WriteError {
            path: backup,
            source: e,
        })?;
    }

    xdg::ensure_config_dir().map_err(|e| ConfigError::WriteError {
        path: path.clone(),
        source: e,
    })?;

    let content = toml::to_string_pretty(&Config::default()).map_err(|e| {
        ConfigError::SerializeError {
            message: e.to_string(),
        }
    })?;

    fs::write(&path, content).map_err(|e| ConfigError::WriteError {
        path: path.clone(),
        source: e,
    })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn with_xdg_config<F: FnOnce()>(dir: &std::path::Path, f: F) {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", dir);
        f();
        match original {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    #[serial]
    fn creates_config_file_with_defaults() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            let path = create_default_config(false).expect("should create config");
            assert!(path.exists());
            let content = fs::read_to_string(&path).expect("should read back");
            let parsed: Config = toml::from_str(&content).expect("should parse");
            assert_eq!(parsed, Config::default());
        });
    }

    #[test]
    #[serial]
    fn refuses_to_overwrite_without_force() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            create_default_config(false).expect("first create should succeed");
            let err = create_default_config(false).expect_err("second create should fail");
            assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        });
    }

    #[test]
    #[serial]
    fn force_overwrites_and_keeps_backup() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            let path = create_default_config(false).expect("first create should succeed");
            fs::write(&path, "[pool]\nmax_workers = 9\n").expect("should modify config");

            create_default_config(true).expect("forced create should succeed");

            let content = fs::read_to_string(&path).expect("should read back");
            let parsed: Config = toml::from_str(&content).expect("should parse");
            assert_eq!(parsed, Config::default());

            let backup = path.with_extension("toml.bak");
            assert!(backup.exists(), "previous config should be kept as backup");
            let backup_content = fs::read_to_string(&backup).expect("should read backup");
            assert!(backup_content.contains("max_workers = 9"));
        });
    }
}
