//! Per-project activity tracking driven by the hook event log.
//!
//! Each project (keyed by its *resolved name*, so multiple working
//! directories and raw sessions fold into one entry) carries a derived
//! status computed from the most recent hook event and the time elapsed
//! since it:
//!
//! - last event `PreToolUse` ⇒ [`ActivityStatus::Active`], regardless of
//!   elapsed time (a tool is still running);
//! - last event `Stop` ⇒ `WaitingForUser` under the waiting threshold,
//!   `Idle` up to the idle threshold, `Inactive` past it.
//!
//! A project silent for longer than the session TTL is removed entirely.
//! Event history is bounded per project; the oldest entries fall off.
//!
//! The tracker never assumes the log grows monotonically — the file belongs
//! to external writers and gets compacted underneath us — so it merges a
//! full re-parse into its in-memory sessions and re-derives every status
//! from `now` on each tick.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::schema::ActivityConfig;
use crate::daemon::hook_log::HookEvent;
use crate::{ActivitySnapshot, ActivityStatus, HookEventKind};

/// Thresholds driving the status state machine.
#[derive(Debug, Clone, Copy)]
pub struct ActivityThresholds {
    /// Stop-to-waiting window.
    pub waiting: Duration,
    /// Stop-to-idle window (upper bound of Idle).
    pub idle: Duration,
    /// Silence after which a session is dropped.
    pub ttl: Duration,
}

impl ActivityThresholds {
    /// Thresholds from the activity config section.
    pub fn from_config(cfg: &ActivityConfig) -> Self {
        Self {
            waiting: cfg.waiting_threshold(),
            idle: cfg.idle_threshold(),
            ttl: cfg.session_ttl(),
        }
    }
}

/// Derive a status from the most recent event kind and elapsed time.
pub fn derive_status(
    last_kind: HookEventKind,
    elapsed: Duration,
    thresholds: &ActivityThresholds,
) -> ActivityStatus {
    match last_kind {
        HookEventKind::PreToolUse => ActivityStatus::Active,
        HookEventKind::Stop => {
            if elapsed < thresholds.waiting {
                ActivityStatus::WaitingForUser
            } else if elapsed < thresholds.idle {
                ActivityStatus::Idle
            } else {
                ActivityStatus::Inactive
            }
        }
    }
}

/// A hook event attributed to a resolved project name.
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    /// Project name from the resolver (grouping key).
    pub project: String,
    /// The underlying log event.
    pub event: HookEvent,
}

/// In-memory activity session for one project.
#[derive(Debug, Clone)]
pub struct ActivitySession {
    /// Resolved project name.
    pub project_name: String,
    /// Current derived status.
    pub status: ActivityStatus,
    /// Timestamp of the earliest retained event.
    pub started_at: DateTime<Utc>,
    /// Timestamp of the most recent event.
    pub last_event_at: DateTime<Utc>,
    /// Kind of the most recent event.
    pub last_kind: HookEventKind,
    /// Bounded event history, oldest first.
    pub events: VecDeque<HookEvent>,
}

/// Tracks activity sessions across ticks.
pub struct ActivityTracker {
    thresholds: ActivityThresholds,
    max_history: usize,
    sessions: HashMap<String, ActivitySession>,
}

impl ActivityTracker {
    /// Build a tracker from the activity config section.
    pub fn new(cfg: &ActivityConfig) -> Self {
        Self {
            thresholds: ActivityThresholds::from_config(cfg),
            max_history: cfg.max_event_history,
            sessions: HashMap::new(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Merge a full re-parse of the event log into the session map.
    ///
    /// Events are grouped by project, ordered by timestamp, and replace
    /// each session's history (bounded to the configured maximum). A
    /// session whose project no longer appears in the log is kept — log
    /// compaction must not erase live state; only the TTL removes it.
    ///
    /// Call [`refresh`](Self::refresh) afterwards (or rely on the next
    /// tick) to re-derive statuses.
    pub fn merge_events(&mut self, events: &[ResolvedEvent], now: DateTime<Utc>) {
        let mut grouped: HashMap<&str, Vec<&HookEvent>> = HashMap::new();
        for resolved in events {
            grouped
                .entry(resolved.project.as_str())
                .or_default()
                .push(&resolved.event);
        }

        for (project, mut project_events) in grouped {
            project_events.sort_by_key(|e| e.timestamp);

            let start = project_events.len().saturating_sub(self.max_history);
            let retained: VecDeque<HookEvent> =
                project_events[start..].iter().map(|e| (*e).clone()).collect();

            // Unreachable in practice: grouped entries always carry one event.
            let (Some(first), Some(last)) = (retained.front(), retained.back()) else {
                continue;
            };
            let started_at = first.timestamp;
            let last_event_at = last.timestamp;
            let last_kind = last.kind;

            match self.sessions.get_mut(project) {
                Some(session) => {
                    // Compaction may have dropped the session's oldest
                    // events; keep the earlier start we already learned.
                    session.started_at = session.started_at.min(started_at);
                    session.last_event_at = last_event_at;
                    session.last_kind = last_kind;
                    session.events = retained;
                }
                None => {
                    self.sessions.insert(
                        project.to_string(),
                        ActivitySession {
                            project_name: project.to_string(),
                            status: ActivityStatus::Active,
                            started_at,
                            last_event_at,
                            last_kind,
                            events: retained,
                        },
                    );
                }
            }
        }

        self.refresh(now);
    }

    /// Re-derive every session's status from `now` and drop sessions past
    /// the TTL. Status transitions happen with time alone, so this runs
    /// every tick even when the log is unchanged.
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        let thresholds = self.thresholds;
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            let elapsed = (now - session.last_event_at).to_std().unwrap_or_default();
            if elapsed >= thresholds.ttl {
                return false;
            }
            session.status = derive_status(session.last_kind, elapsed, &thresholds);
            true
        });
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(removed, "dropped activity sessions past ttl");
        }
    }

    /// Published view of all sessions, sorted by project name.
    pub fn snapshot(&self) -> Vec<ActivitySnapshot> {
        let mut snapshots: Vec<ActivitySnapshot> = self
            .sessions
            .values()
            .map(|s| ActivitySnapshot {
                project_name: s.project_name.clone(),
                status: s.status,
                started_at: s.started_at,
                last_event_at: s.last_event_at,
                event_count: s.events.len(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.project_name.cmp(&b.project_name));
        snapshots
    }

    /// Iterate live sessions (order unspecified).
    pub fn sessions(&self) -> impl Iterator<Item = &ActivitySession> {
        self.sessions.values()
    }
}
