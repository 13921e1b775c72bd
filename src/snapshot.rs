//! Persisted snapshot document types.
//!
//! The [`MonitoringSnapshot`] is the single externally-visible document the
//! daemon publishes each tick. Every write is a complete, self-consistent
//! replacement of the previous one; readers never observe a partial
//! document. Field names are camelCase on the wire so that the terminal
//! client and the widget share one schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ActivityStatus;

/// Version string embedded in every snapshot so readers can detect schema
/// drift across daemon upgrades.
pub const DAEMON_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The complete monitoring state published atomically each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSnapshot {
    /// Version of the daemon that wrote this document.
    pub daemon_version: String,
    /// When this snapshot was assembled.
    pub generated_at: DateTime<Utc>,
    /// When usage data was last collected successfully. `None` until the
    /// first successful collection; stale readers compare file age instead.
    pub last_collection_at: Option<DateTime<Utc>>,
    /// Totals for the current billing period.
    pub billing: BillingSummary,
    /// Per-session aggregates within the current billing period.
    pub sessions: Vec<SessionRecord>,
    /// Per-project activity state derived from the hook event log.
    pub activity: Vec<ActivitySnapshot>,
    /// Resolver cache statistics (optional diagnostics).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<ResolverStats>,
}

/// Billing-period totals across all sessions in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingSummary {
    /// Start of the current billing period (inclusive, UTC midnight).
    pub period_start: DateTime<Utc>,
    /// End of the current billing period (exclusive, UTC midnight).
    pub period_end: DateTime<Utc>,
    /// Number of billing sessions observed this period.
    pub session_count: usize,
    /// Total cost in USD across those sessions.
    pub total_cost_usd: f64,
    /// Total input + output tokens across those sessions.
    pub total_tokens: u64,
    /// Largest single-session token total seen this period.
    pub max_tokens_per_session: u64,
}

/// Aggregated totals for one billing session.
///
/// Keyed by the session identifier reported by the usage command; the
/// collector updates a record in place when later ticks observe the same
/// session with grown totals, so a session is never double-counted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session identifier from the usage command.
    pub session_id: String,
    /// When the session started (UTC).
    pub start_time: DateTime<Utc>,
    /// When the session window ends, if reported.
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the usage command reported the session as still active.
    pub is_active: bool,
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Cache creation + cache read tokens, tracked separately from the
    /// input/output total.
    pub cache_tokens: u64,
    /// Input + output tokens.
    pub total_tokens: u64,
    /// Session cost in USD.
    pub cost_usd: f64,
}

/// Published view of one project's activity session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    /// Resolved project name (grouping key).
    pub project_name: String,
    /// Derived status at snapshot time.
    pub status: ActivityStatus,
    /// Timestamp of the earliest retained event for this project.
    pub started_at: DateTime<Utc>,
    /// Timestamp of the most recent event.
    pub last_event_at: DateTime<Utc>,
    /// Number of events currently retained in the session history.
    pub event_count: usize,
}

/// Resolver cache statistics, published for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverStats {
    /// Number of entries currently cached.
    pub entries: usize,
    /// Lifetime cache hits.
    pub hits: u64,
    /// Lifetime cache misses.
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_snapshot() -> MonitoringSnapshot {
        let period_start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let period_end = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        MonitoringSnapshot {
            daemon_version: DAEMON_VERSION.to_string(),
            generated_at: now,
            last_collection_at: Some(now),
            billing: BillingSummary {
                period_start,
                period_end,
                session_count: 1,
                total_cost_usd: 3.1459,
                total_tokens: 4242,
                max_tokens_per_session: 4242,
            },
            sessions: vec![SessionRecord {
                session_id: "block-1".to_string(),
                start_time: now,
                end_time: None,
                is_active: true,
                input_tokens: 4000,
                output_tokens: 242,
                cache_tokens: 17,
                total_tokens: 4242,
                cost_usd: 3.1459,
            }],
            activity: vec![ActivitySnapshot {
                project_name: "claude-monitor".to_string(),
                status: ActivityStatus::Active,
                started_at: now,
                last_event_at: now,
                event_count: 3,
            }],
            resolver: Some(ResolverStats {
                entries: 2,
                hits: 10,
                misses: 2,
            }),
        }
    }

    #[test]
    fn snapshot_round_trips_identically() {
        let snapshot = sample_snapshot();
        let json = serde_json::to_string_pretty(&snapshot).expect("serialize");
        let parsed: MonitoringSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let json = serde_json::to_value(sample_snapshot()).expect("serialize");
        assert!(json.get("daemonVersion").is_some());
        assert!(json.get("lastCollectionAt").is_some());
        let billing = json.get("billing").expect("billing section");
        assert!(billing.get("periodStart").is_some());
        assert!(billing.get("maxTokensPerSession").is_some());
        let session = &json["sessions"][0];
        assert!(session.get("sessionId").is_some());
        assert!(session.get("costUsd").is_some());
    }

    #[test]
    fn resolver_stats_omitted_when_absent() {
        let mut snapshot = sample_snapshot();
        snapshot.resolver = None;
        let json = serde_json::to_value(&snapshot).expect("serialize");
        assert!(json.get("resolver").is_none());
    }
}
