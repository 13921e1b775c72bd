//! Notification rate limiting and best-effort delivery.
//!
//! The [`RateLimiter`] is the gatekeeper: `should_send` answers whether an
//! alert may go out, and the caller commits with `record_sent` after a
//! successful dispatch decision — the two calls are deliberately separate
//! so a caller that decides not to deliver after all leaves no record.
//!
//! Delivery itself is an ordered fallback chain independent of the rate
//! decision: the platform notifier command first, then an audible terminal
//! bell. Channels are best-effort side paths with no delivery confirmation
//! fed back into core state; failures are logged and nothing more.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::schema::NotificationsConfig;

/// How long a delivery command may run before being abandoned.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Kinds of alerts the daemon can raise, each with its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// An active billing session is about to end.
    TimeRemaining,
    /// A project has been sitting idle.
    Inactivity,
    /// Usage collection keeps failing.
    CollectionError,
}

impl AlertKind {
    fn label(&self) -> &'static str {
        match self {
            AlertKind::TimeRemaining => "time-remaining",
            AlertKind::Inactivity => "inactivity",
            AlertKind::CollectionError => "collection-error",
        }
    }
}

/// Per-alert-kind cooldown windows.
#[derive(Debug, Clone, Copy)]
pub struct Cooldowns {
    time_remaining: Duration,
    inactivity: Duration,
    collection_error: Duration,
}

impl Cooldowns {
    /// Cooldowns from the notifications config section.
    pub fn from_config(cfg: &NotificationsConfig) -> Self {
        Self {
            time_remaining: cfg.time_remaining_cooldown(),
            inactivity: cfg.inactivity_cooldown(),
            collection_error: cfg.error_cooldown(),
        }
    }

    /// The cooldown for one alert kind.
    pub fn for_kind(&self, kind: AlertKind) -> Duration {
        match kind {
            AlertKind::TimeRemaining => self.time_remaining,
            AlertKind::Inactivity => self.inactivity,
            AlertKind::CollectionError => self.collection_error,
        }
    }
}

/// Tracks sent notifications per `(scope, kind)` and enforces cooldowns.
///
/// Records are transient daemon state; they are never persisted.
pub struct RateLimiter {
    cooldowns: Cooldowns,
    records: HashMap<(String, AlertKind), DateTime<Utc>>,
}

impl RateLimiter {
    /// Build a limiter from the notifications config section.
    pub fn new(cfg: &NotificationsConfig) -> Self {
        Self {
            cooldowns: Cooldowns::from_config(cfg),
            records: HashMap::new(),
        }
    }

    /// Whether an alert for this `(scope, kind)` may be sent now.
    ///
    /// Allowed when no prior record exists or when the kind's cooldown has
    /// fully elapsed since the last send.
    pub fn should_send(&self, scope: &str, kind: AlertKind, now: DateTime<Utc>) -> bool {
        match self.records.get(&(scope.to_string(), kind)) {
            None => true,
            Some(last_sent) => {
                let elapsed = (now - *last_sent).to_std().unwrap_or_default();
                elapsed >= self.cooldowns.for_kind(kind)
            }
        }
    }

    /// Commit a send. Callers invoke this after `should_send` returned
    /// true and the alert was handed to the delivery chain.
    pub fn record_sent(&mut self, scope: &str, kind: AlertKind, now: DateTime<Utc>) {
        debug!(scope, kind = kind.label(), "recorded notification");
        self.records.insert((scope.to_string(), kind), now);
    }

    /// Drop records whose cooldown has fully expired; they no longer
    /// influence decisions and would otherwise accumulate forever.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cooldowns = self.cooldowns;
        self.records.retain(|(_, kind), last_sent| {
            let elapsed = (now - *last_sent).to_std().unwrap_or_default();
            elapsed < cooldowns.for_kind(*kind)
        });
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Best-effort notification dispatcher.
pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    /// Build a notifier from the notifications config section.
    pub fn new(cfg: &NotificationsConfig) -> Self {
        Self {
            enabled: cfg.enabled,
        }
    }

    /// Dispatch a notification through the channel chain.
    ///
    /// Tries each platform notifier command in order; if none succeeds,
    /// rings the terminal bell. Never returns an error — delivery has no
    /// confirmation path into core state.
    pub async fn send(&self, title: &str, message: &str) {
        if !self.enabled {
            debug!(title, "notifications disabled, dropping alert");
            return;
        }

        for (program, args) in channel_chain(title, message) {
            match try_channel(&program, &args).await {
                Ok(true) => {
                    debug!(channel = %program, title, "notification delivered");
                    return;
                }
                Ok(false) => {
                    debug!(channel = %program, "notification channel reported failure");
                }
                Err(e) => {
                    debug!(channel = %program, error = %e, "notification channel unavailable");
                }
            }
        }

        // Last resort: audible signal on stderr.
        warn!(title, "all notification channels failed, falling back to bell");
        eprint!("\x07");
    }
}

/// Platform-ordered delivery commands.
fn channel_chain(title: &str, message: &str) -> Vec<(String, Vec<String>)> {
    #[cfg(target_os = "macos")]
    {
        let script = format!(
            "display notification \"{}\" with title \"{}\" sound name \"default\"",
            message.replace('"', "\\\""),
            title.replace('"', "\\\"")
        );
        vec![
            (
                "terminal-notifier".to_string(),
                vec![
                    "-title".to_string(),
                    title.to_string(),
                    "-message".to_string(),
                    message.to_string(),
                    "-sound".to_string(),
                    "default".to_string(),
                ],
            ),
            ("osascript".to_string(), vec!["-e".to_string(), script]),
        ]
    }
    #[cfg(not(target_os = "macos"))]
    {
        vec![(
            "notify-send".to_string(),
            vec![title.to_string(), message.to_string()],
        )]
    }
}

async fn try_channel(program: &str, args: &[String]) -> std::io::Result<bool> {
    let status = tokio::time::timeout(
        DELIVERY_TIMEOUT,
        tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status(),
    )
    .await
    .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "delivery timed out"))??;
    Ok(status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn limiter_with_cooldown(cooldown: &str) -> RateLimiter {
        RateLimiter::new(&NotificationsConfig {
            time_remaining_cooldown: cooldown.to_string(),
            ..NotificationsConfig::default()
        })
    }

    #[test]
    fn first_alert_for_a_key_is_allowed() {
        let limiter = limiter_with_cooldown("30m");
        assert!(limiter.should_send("session-1", AlertKind::TimeRemaining, at(0)));
    }

    #[test]
    fn cooldown_blocks_at_29_minutes_and_allows_at_31() {
        let mut limiter = limiter_with_cooldown("30m");
        limiter.record_sent("session-1", AlertKind::TimeRemaining, at(0));

        assert!(
            !limiter.should_send("session-1", AlertKind::TimeRemaining, at(29 * 60)),
            "still inside the 30 minute cooldown"
        );
        assert!(
            limiter.should_send("session-1", AlertKind::TimeRemaining, at(31 * 60)),
            "cooldown elapsed"
        );
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut limiter = limiter_with_cooldown("30m");
        limiter.record_sent("session-1", AlertKind::TimeRemaining, at(0));
        assert!(limiter.should_send("session-1", AlertKind::TimeRemaining, at(30 * 60)));
    }

    #[test]
    fn scopes_are_rate_limited_independently() {
        let mut limiter = limiter_with_cooldown("30m");
        limiter.record_sent("session-1", AlertKind::TimeRemaining, at(0));

        assert!(!limiter.should_send("session-1", AlertKind::TimeRemaining, at(60)));
        assert!(limiter.should_send("session-2", AlertKind::TimeRemaining, at(60)));
    }

    #[test]
    fn kinds_are_rate_limited_independently() {
        let mut limiter = RateLimiter::new(&NotificationsConfig::default());
        limiter.record_sent("proj", AlertKind::Inactivity, at(0));

        assert!(!limiter.should_send("proj", AlertKind::Inactivity, at(60)));
        assert!(limiter.should_send("proj", AlertKind::TimeRemaining, at(60)));
    }

    #[test]
    fn per_kind_cooldowns_come_from_config() {
        let cfg = NotificationsConfig {
            time_remaining_cooldown: "5m".to_string(),
            inactivity_cooldown: "10m".to_string(),
            error_cooldown: "3m".to_string(),
            ..NotificationsConfig::default()
        };
        let cooldowns = Cooldowns::from_config(&cfg);
        assert_eq!(cooldowns.for_kind(AlertKind::TimeRemaining), Duration::from_secs(300));
        assert_eq!(cooldowns.for_kind(AlertKind::Inactivity), Duration::from_secs(600));
        assert_eq!(cooldowns.for_kind(AlertKind::CollectionError), Duration::from_secs(180));
    }

    #[test]
    fn should_send_alone_does_not_commit() {
        let limiter = limiter_with_cooldown("30m");
        // Asking twice without record_sent must keep answering true.
        assert!(limiter.should_send("s", AlertKind::TimeRemaining, at(0)));
        assert!(limiter.should_send("s", AlertKind::TimeRemaining, at(1)));
        assert!(limiter.is_empty());
    }

    #[test]
    fn prune_drops_expired_records_only() {
        let mut limiter = RateLimiter::new(&NotificationsConfig::default());
        limiter.record_sent("old", AlertKind::CollectionError, at(0)); // 3m cooldown
        limiter.record_sent("new", AlertKind::Inactivity, at(550)); // 10m cooldown
        assert_eq!(limiter.len(), 2);

        limiter.prune(at(600));
        assert_eq!(limiter.len(), 1);
        assert!(!limiter.should_send("new", AlertKind::Inactivity, at(600)));
        assert!(limiter.should_send("old", AlertKind::CollectionError, at(600)));
    }

    #[tokio::test]
    async fn disabled_notifier_sends_nothing() {
        let notifier = Notifier::new(&NotificationsConfig {
            enabled: false,
            ..NotificationsConfig::default()
        });
        // Must return without attempting any channel.
        notifier.send("title", "message").await;
    }
}
