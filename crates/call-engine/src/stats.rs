//! Summary statistics over completed calls

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use voipmon_quality_core::QualityCategory;

use crate::call::Call;

/// Aggregates for one time window
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PeriodStats {
    pub call_count: usize,
    /// Seconds
    pub avg_duration: f64,
    /// Sum of positive per-call MOS averages over `call_count`
    pub avg_mos: f64,
    pub avg_packet_loss: f64,
    pub avg_jitter: f64,
    /// Lowercase category name to number of calls
    pub quality_distribution: BTreeMap<String, usize>,
}

impl PeriodStats {
    pub fn from_calls<'a, I>(calls: I) -> Self
    where
        I: IntoIterator<Item = &'a Call>,
    {
        let mut stats = PeriodStats::default();
        let mut total_duration = 0.0;
        let mut total_mos = 0.0;
        let mut total_loss = 0.0;
        let mut total_jitter = 0.0;

        for call in calls {
            stats.call_count += 1;
            total_duration += call.duration;
            if call.avg_mos > 0.0 {
                total_mos += call.avg_mos;
            }
            total_loss += call.packet_loss_rate;
            total_jitter += call.avg_jitter;

            let bucket = QualityCategory::from_mos(call.avg_mos)
                .as_str()
                .to_ascii_lowercase();
            *stats.quality_distribution.entry(bucket).or_insert(0) += 1;
        }

        if stats.call_count > 0 {
            let n = stats.call_count as f64;
            stats.avg_duration = total_duration / n;
            stats.avg_mos = total_mos / n;
            stats.avg_packet_loss = total_loss / n;
            stats.avg_jitter = total_jitter / n;
        }

        stats
    }
}

/// Dashboard summary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Completed calls in history
    pub total_calls: usize,
    pub active_calls: usize,
    /// Completed and active calls started today (local time)
    pub today_calls: usize,
    pub today: PeriodStats,
    pub last_24h: PeriodStats,
    pub last_7d: PeriodStats,
    pub last_30d: PeriodStats,
}

impl SummaryStats {
    /// Compute the summary as of `now`
    pub fn compute(history: &[Call], active: &[&Call], now: DateTime<Utc>) -> Self {
        let today = now.with_timezone(&Local).date_naive();
        let started_today = |call: &Call| call.start_time.with_timezone(&Local).date_naive() == today;
        let within = |days: i64| {
            let from = now - Duration::days(days);
            move |call: &&Call| call.start_time >= from && call.start_time <= now
        };

        let today_calls = history.iter().filter(|c| started_today(*c)).count()
            + active.iter().filter(|c| started_today(**c)).count();

        Self {
            total_calls: history.len(),
            active_calls: active.len(),
            today_calls,
            today: PeriodStats::from_calls(history.iter().filter(|c| started_today(*c))),
            last_24h: PeriodStats::from_calls(history.iter().filter(within(1))),
            last_7d: PeriodStats::from_calls(history.iter().filter(within(7))),
            last_30d: PeriodStats::from_calls(history.iter().filter(within(30))),
        }
    }
}
