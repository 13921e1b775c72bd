//! Billing-period aggregation of raw usage blocks.
//!
//! The collector filters blocks to the current billing window and folds
//! them into per-session [`SessionRecord`]s keyed by session identifier.
//! The processed map grows monotonically within a period: a session seen on
//! an earlier tick is updated in place when later ticks report grown
//! totals, never added twice. Records whose session start falls outside
//! the window are pruned, which also handles period rollover.
//!
//! All timestamps are UTC; billing math never touches local time.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use tracing::debug;

use crate::daemon::exec::UsageBlock;
use crate::{BillingSummary, SessionRecord};

/// Number of days in the given month.
fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("first of month is always valid")
        .pred_opt()
        .expect("first of month has a predecessor")
        .day()
}

/// Midnight UTC on the given date, with the day clamped into the month.
fn month_day_utc(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    let clamped = day.min(days_in_month(year, month));
    Utc.with_ymd_and_hms(year, month, clamped, 0, 0, 0)
        .single()
        .expect("clamped calendar date is valid")
}

/// Compute the current billing window `[start, end)` for a period that
/// begins on `start_day` of each month, relative to `now` in UTC.
///
/// A `start_day` past the end of a month clamps to that month's last day
/// (a period configured for the 31st starts on Feb 28/29 in February).
pub fn billing_period(start_day: u32, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_day = start_day.clamp(1, 31);
    let (year, month) = (now.year(), now.month());

    let (start_year, start_month) = if now.day() >= start_day.min(days_in_month(year, month)) {
        (year, month)
    } else if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    };
    let start = month_day_utc(start_year, start_month, start_day);

    let (end_year, end_month) = if start_month == 12 {
        (start_year + 1, 1)
    } else {
        (start_year, start_month + 1)
    };
    let end = month_day_utc(end_year, end_month, start_day);

    (start, end)
}

fn record_from_block(block: &UsageBlock) -> SessionRecord {
    let tokens = &block.token_counts;
    SessionRecord {
        session_id: block.id.clone(),
        start_time: block.start_time,
        end_time: block.end_time,
        is_active: block.is_active,
        input_tokens: tokens.input_tokens,
        output_tokens: tokens.output_tokens,
        cache_tokens: tokens.cache_total(),
        total_tokens: tokens.input_tokens + tokens.output_tokens,
        cost_usd: block.cost_usd,
    }
}

/// Folds usage blocks into deduplicated per-session records.
#[derive(Debug, Default)]
pub struct Collector {
    processed: HashMap<String, SessionRecord>,
}

impl Collector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently tracked for the period.
    pub fn session_count(&self) -> usize {
        self.processed.len()
    }

    /// Aggregate one tick's blocks into the period view and return the
    /// full record set, sorted by session start time.
    ///
    /// Blocks outside `[period_start, period_end)` are ignored; records
    /// that have fallen outside the window (period rollover) are pruned.
    /// An empty `blocks` slice leaves accumulated state untouched apart
    /// from that pruning — a degraded collection never corrupts totals.
    pub fn aggregate(
        &mut self,
        blocks: &[UsageBlock],
        billing_start_day: u32,
        now: DateTime<Utc>,
    ) -> Vec<SessionRecord> {
        let (period_start, period_end) = billing_period(billing_start_day, now);

        let before = self.processed.len();
        self.processed
            .retain(|_, r| r.start_time >= period_start && r.start_time < period_end);
        let pruned = before - self.processed.len();
        if pruned > 0 {
            debug!(pruned, "pruned sessions outside billing window");
        }

        for block in blocks {
            if block.start_time < period_start || block.start_time >= period_end {
                continue;
            }
            // Same id on a later tick: totals may have grown, replace in place.
            self.processed
                .insert(block.id.clone(), record_from_block(block));
        }

        self.records()
    }

    /// Current record set, sorted by start time.
    pub fn records(&self) -> Vec<SessionRecord> {
        let mut records: Vec<SessionRecord> = self.processed.values().cloned().collect();
        records.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.session_id.cmp(&b.session_id)));
        records
    }

    /// Billing summary across the current record set.
    pub fn summary(&self, period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> BillingSummary {
        let mut total_cost = 0.0;
        let mut total_tokens = 0u64;
        let mut max_tokens = 0u64;
        for record in self.processed.values() {
            total_cost += record.cost_usd;
            total_tokens += record.total_tokens;
            max_tokens = max_tokens.max(record.total_tokens);
        }
        BillingSummary {
            period_start,
            period_end,
            session_count: self.processed.len(),
            total_cost_usd: total_cost,
            total_tokens,
            max_tokens_per_session: max_tokens,
        }
    }
}
