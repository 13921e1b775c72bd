//! The daemon tick loop.
//!
//! One [`Monitor`] owns every piece of mutable monitoring state — the
//! collector's processed sessions, the activity session map, the resolver
//! cache, the notification records — and a single async task drives
//! [`Monitor::tick`] on a fixed interval. Nothing else mutates that state;
//! the subprocess pool hands results back through completion channels and
//! the tick applies them. That single-writer discipline is what lets the
//! core maps live without locks.
//!
//! A tick is allowed to fail in parts — collection degraded, snapshot
//! write refused, notification channel down — and still completes. No
//! per-tick error terminates the daemon.

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::schema::Config;
use crate::config::xdg;
use crate::daemon::activity::{ActivityTracker, ResolvedEvent};
use crate::daemon::collector::{billing_period, Collector};
use crate::daemon::exec::UsageReader;
use crate::daemon::hook_log;
use crate::daemon::notify::{AlertKind, Notifier, RateLimiter};
use crate::daemon::pool::{PoolError, SubprocessPool};
use crate::daemon::store::SnapshotStore;
use crate::resolver::ProjectResolver;
use crate::{ActivityStatus, MonitoringSnapshot, SessionRecord, DAEMON_VERSION};

/// Scope key for collection-error alerts; there is only one collector.
const COLLECTOR_SCOPE: &str = "usage-collector";

/// Consecutive whole-chain failures before the error alert fires.
const FAILURE_ALERT_THRESHOLD: u32 = 5;

/// Owns all tick-thread state and drives the monitoring pipeline.
pub struct Monitor {
    config: Config,
    reader: UsageReader,
    collector: Collector,
    tracker: ActivityTracker,
    resolver: ProjectResolver,
    limiter: RateLimiter,
    notifier: Notifier,
    store: SnapshotStore,
    hook_log_path: PathBuf,
    last_log_mtime: Option<SystemTime>,
    last_collection_at: Option<DateTime<Utc>>,
}

impl Monitor {
    /// Assemble the monitor from configuration.
    ///
    /// Pool creation is the one startup step allowed to fail; a daemon
    /// that cannot execute subprocesses at all has nothing to monitor.
    pub fn new(config: Config) -> Result<Self, PoolError> {
        let pool = SubprocessPool::new(config.pool.max_workers, config.collector.command_timeout())?;
        let reader = UsageReader::new(&config.collector, pool);

        let hook_log_path = config
            .activity
            .log_path
            .as_deref()
            .map(xdg::expand_tilde)
            .unwrap_or_else(xdg::hook_log_path);

        let snapshot_path = config
            .daemon
            .snapshot_path
            .as_deref()
            .map(xdg::expand_tilde)
            .unwrap_or_else(xdg::snapshot_path);
        let mirror_path = config.daemon.mirror_path.as_deref().map(xdg::expand_tilde);
        let store = SnapshotStore::new(snapshot_path, mirror_path);

        Ok(Self {
            reader,
            collector: Collector::new(),
            tracker: ActivityTracker::new(&config.activity),
            resolver: ProjectResolver::new(&config.resolver),
            limiter: RateLimiter::new(&config.notifications),
            notifier: Notifier::new(&config.notifications),
            store,
            hook_log_path,
            last_log_mtime: None,
            last_collection_at: None,
            config,
        })
    }

    /// The store this monitor publishes through.
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one tick at the current time.
    pub async fn tick(&mut self) {
        self.tick_at(Utc::now()).await;
    }

    /// Run one tick at an explicit time (separated out for tests).
    pub async fn tick_at(&mut self, now: DateTime<Utc>) {
        let (period_start, period_end) =
            billing_period(self.config.collector.billing_start_day, now);

        // 1. Collect usage through the strategy chain; degraded is fine.
        let report = self.reader.collect(Some(period_start.date_naive())).await;
        if self.reader.consecutive_failures() == 0 {
            self.last_collection_at = Some(now);
        }

        // 2. Fold blocks into the billing-period view.
        let records =
            self.collector
                .aggregate(&report.blocks, self.config.collector.billing_start_day, now);

        // 3. Refresh activity from the hook log.
        self.refresh_activity(now).await;

        // 4. Bound the hook log.
        match hook_log::compact(
            &self.hook_log_path,
            self.config.activity.compact_threshold,
            self.config.activity.compact_retain,
        ) {
            Ok(true) => info!("hook log compacted"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "hook log compaction failed"),
        }

        // 5. Alerts, gated by the rate limiter.
        self.evaluate_alerts(&records, now).await;

        // 6. Publish. A refused write keeps the previous snapshot valid
        //    on disk and is retried next tick.
        let snapshot = self.build_snapshot(records, period_start, period_end, now);
        if let Err(e) = self.store.write(&snapshot) {
            warn!(error = %e, "snapshot write failed, previous snapshot remains current");
        }

        // 7. Housekeeping on tick-owned state.
        self.resolver.evict(now);
        self.limiter.prune(now);
    }

    /// Re-read the hook log when it changed and merge it into the tracker.
    /// Statuses re-derive from `now` every tick regardless.
    async fn refresh_activity(&mut self, now: DateTime<Utc>) {
        let mtime = hook_log::modified_time(&self.hook_log_path);
        if mtime != self.last_log_mtime {
            self.last_log_mtime = mtime;
            let events = hook_log::read_events(&self.hook_log_path);
            debug!(events = events.len(), "hook log changed, re-reading");

            let mut resolved = Vec::with_capacity(events.len());
            for event in events {
                let project = self.resolver.resolve(&event.project_path, now).await;
                resolved.push(ResolvedEvent { project, event });
            }
            self.tracker.merge_events(&resolved, now);
        } else {
            self.tracker.refresh(now);
        }
    }

    /// Evaluate alert conditions and dispatch through the limiter.
    async fn evaluate_alerts(&mut self, records: &[SessionRecord], now: DateTime<Utc>) {
        if !self.config.notifications.enabled {
            return;
        }

        // Active billing sessions approaching their window end.
        let warn_window = self.config.notifications.time_remaining_alert();
        for record in records {
            let Some(end_time) = record.end_time else {
                continue;
            };
            if !record.is_active || end_time <= now {
                continue;
            }
            let remaining = (end_time - now).to_std().unwrap_or_default();
            if remaining <= warn_window
                && self
                    .limiter
                    .should_send(&record.session_id, AlertKind::TimeRemaining, now)
            {
                let minutes = remaining.as_secs() / 60;
                self.notifier
                    .send(
                        "Claude session ending",
                        &format!("Session window closes in {} minutes.", minutes),
                    )
                    .await;
                self.limiter
                    .record_sent(&record.session_id, AlertKind::TimeRemaining, now);
            }
        }

        // Projects sitting idle past the inactivity threshold.
        let idle_after = self.config.notifications.inactivity_alert();
        let mut idle_projects = Vec::new();
        for session in self.tracker.sessions() {
            if session.status != ActivityStatus::Idle {
                continue;
            }
            let elapsed = (now - session.last_event_at).to_std().unwrap_or_default();
            if elapsed >= idle_after {
                idle_projects.push((session.project_name.clone(), elapsed.as_secs() / 60));
            }
        }
        for (project, minutes) in idle_projects {
            if self.limiter.should_send(&project, AlertKind::Inactivity, now) {
                self.notifier
                    .send(
                        "Claude project idle",
                        &format!("{} has been idle for {} minutes.", project, minutes),
                    )
                    .await;
                self.limiter.record_sent(&project, AlertKind::Inactivity, now);
            }
        }

        // Persistent collection failure.
        let failures = self.reader.consecutive_failures();
        if failures > FAILURE_ALERT_THRESHOLD
            && self
                .limiter
                .should_send(COLLECTOR_SCOPE, AlertKind::CollectionError, now)
        {
            self.notifier
                .send(
                    "Claude monitor degraded",
                    &format!("Usage collection failed {} times in a row.", failures),
                )
                .await;
            self.limiter
                .record_sent(COLLECTOR_SCOPE, AlertKind::CollectionError, now);
        }
    }

    fn build_snapshot(
        &self,
        records: Vec<SessionRecord>,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> MonitoringSnapshot {
        MonitoringSnapshot {
            daemon_version: DAEMON_VERSION.to_string(),
            generated_at: now,
            last_collection_at: self.last_collection_at,
            billing: self.collector.summary(period_start, period_end),
            sessions: records,
            activity: self.tracker.snapshot(),
            resolver: Some(self.resolver.stats()),
        }
    }

    /// Drive ticks until the shutdown receiver fires.
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.collector.fetch_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval = ?self.config.collector.fetch_interval(),
            snapshot = %self.store.path().display(),
            hook_log = %self.hook_log_path.display(),
            "monitor loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown_rx.recv() => {
                    info!("monitor loop shutting down");
                    break;
                }
            }
        }
    }
}
