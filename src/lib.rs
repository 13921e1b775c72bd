//! Claude session monitor library
//!
//! This crate provides the core functionality for the `cmon` daemon: periodic
//! collection of Claude usage data through an external reporting command,
//! per-project activity tracking driven by Claude Code hook events, and
//! atomic publication of a monitoring snapshot consumed by all readers
//! (terminal client, widget).
//!
//! # Platform Support
//!
//! This crate currently supports **Unix-like systems only** (Linux, macOS).
//!
//! Unix-specific features used:
//! - `fork()` for daemon process creation
//! - Unix signal handling (SIGTERM, SIGINT)

use std::fmt;
use std::str::FromStr;

/// Configuration schema, loader, and path resolution.
pub mod config;

/// Daemon module providing the tick loop, subprocess substrate, and
/// process lifecycle management.
pub mod daemon;

/// Project name resolution with an adaptive, LRU-bounded cache.
pub mod resolver;

/// Persisted snapshot document types.
mod snapshot;
pub use snapshot::*;

/// Derived activity state for a project, computed from the most recent hook
/// event and the time elapsed since it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    /// A tool is running or was just requested; the agent is working.
    Active,
    /// The agent stopped moments ago and is likely waiting for user input.
    WaitingForUser,
    /// No activity for a few minutes; the project is idle.
    Idle,
    /// No activity for a long stretch; the project is effectively dormant.
    Inactive,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityStatus::Active => "active",
            ActivityStatus::WaitingForUser => "waiting",
            ActivityStatus::Idle => "idle",
            ActivityStatus::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

/// Kind of a hook event appended to the event log by Claude Code hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HookEventKind {
    /// Emitted before a tool runs; the session is actively working.
    PreToolUse,
    /// Emitted when the agent stops and hands control back to the user.
    Stop,
}

impl fmt::Display for HookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookEventKind::PreToolUse => "PreToolUse",
            HookEventKind::Stop => "Stop",
        };
        write!(f, "{}", s)
    }
}

/// Error type for parsing a [`HookEventKind`] from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError(pub String);

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hook event kind: {}", self.0)
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for HookEventKind {
    type Err = ParseKindError;

    /// Accepts the canonical event names plus kebab/snake-case CLI spellings
    /// (`PreToolUse`, `pre-tool-use`, `pre_tool_use`, `Stop`, `stop`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "pretooluse" => Ok(HookEventKind::PreToolUse),
            "stop" => Ok(HookEventKind::Stop),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_status_display() {
        assert_eq!(ActivityStatus::Active.to_string(), "active");
        assert_eq!(ActivityStatus::WaitingForUser.to_string(), "waiting");
        assert_eq!(ActivityStatus::Idle.to_string(), "idle");
        assert_eq!(ActivityStatus::Inactive.to_string(), "inactive");
    }

    #[test]
    fn activity_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&ActivityStatus::WaitingForUser)
            .expect("status should serialize");
        assert_eq!(json, "\"WAITING_FOR_USER\"");
    }

    #[test]
    fn hook_event_kind_from_str_variants() {
        assert_eq!(
            "PreToolUse".parse::<HookEventKind>(),
            Ok(HookEventKind::PreToolUse)
        );
        assert_eq!(
            "pre-tool-use".parse::<HookEventKind>(),
            Ok(HookEventKind::PreToolUse)
        );
        assert_eq!(
            "pre_tool_use".parse::<HookEventKind>(),
            Ok(HookEventKind::PreToolUse)
        );
        assert_eq!("stop".parse::<HookEventKind>(), Ok(HookEventKind::Stop));
        assert_eq!("Stop".parse::<HookEventKind>(), Ok(HookEventKind::Stop));
    }

    #[test]
    fn hook_event_kind_from_str_rejects_unknown() {
        let err = "notification".parse::<HookEventKind>().expect_err("should fail");
        assert_eq!(err, ParseKindError("notification".to_string()));
        assert!(err.to_string().contains("notification"));
    }

    #[test]
    fn hook_event_kind_round_trips_through_display() {
        for kind in [HookEventKind::PreToolUse, HookEventKind::Stop] {
            let parsed: HookEventKind = kind.to_string().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
    }
}
