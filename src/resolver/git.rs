//! Git repository probing for project name resolution.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

/// Resolve the repository root name for `path`, if it sits inside a git
/// working tree.
///
/// Runs `git rev-parse --show-toplevel` in the directory with a bounded
/// timeout and returns the root's final path segment. Every failure mode —
/// not a repository, git missing, timeout, unreadable output — resolves to
/// `None` so callers can fall back to a heuristic.
pub async fn probe(path: &Path, timeout: Duration) -> Option<String> {
    if !path.is_dir() {
        return None;
    }

    let result = tokio::time::timeout(
        timeout,
        tokio::process::Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output(),
    )
    .await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!(path = %path.display(), error = %e, "git probe failed to spawn");
            return None;
        }
        Err(_) => {
            debug!(path = %path.display(), "git probe timed out");
            return None;
        }
    };

    if !output.status.success() {
        return None;
    }

    let root = String::from_utf8_lossy(&output.stdout);
    let root = root.trim();
    if root.is_empty() {
        return None;
    }

    root_name(root)
}

/// Final path segment of a repository root.
pub(crate) fn root_name(root: &str) -> Option<String> {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        // Repository at the filesystem root.
        return Some("root".to_string());
    }
    Path::new(trimmed)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_name_takes_final_segment() {
        assert_eq!(
            root_name("/Users/user/projects/my-project"),
            Some("my-project".to_string())
        );
    }

    #[test]
    fn root_name_ignores_trailing_slashes() {
        assert_eq!(root_name("/path/to/project/"), Some("project".to_string()));
    }

    #[test]
    fn root_name_of_filesystem_root() {
        assert_eq!(root_name("/"), Some("root".to_string()));
    }

    #[tokio::test]
    async fn probe_missing_directory_is_none() {
        let name = probe(
            Path::new("/nonexistent/definitely/missing"),
            Duration::from_secs(5),
        )
        .await;
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn probe_non_repository_is_none() {
        // A bare tempdir is not inside a git repository. (If the test host
        // runs from inside one, /tmp descendants still are not.)
        let dir = tempfile::tempdir().expect("tempdir");
        let name = probe(dir.path(), Duration::from_secs(5)).await;
        assert!(name.is_none());
    }

    #[tokio::test]
    async fn probe_resolves_repository_root_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = dir.path().join("sample-repo");
        std::fs::create_dir(&repo).expect("mkdir");
        let status = std::process::Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(&repo)
            .status();
        let Ok(status) = status else {
            // git unavailable on this host; the fallback path covers it.
            return;
        };
        if !status.success() {
            return;
        }

        let subdir = repo.join("src");
        std::fs::create_dir(&subdir).expect("mkdir src");

        let name = probe(&subdir, Duration::from_secs(5)).await;
        assert_eq!(name.as_deref(), Some("sample-repo"));
    }
}
