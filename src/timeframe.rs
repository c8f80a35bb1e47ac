use chrono::{DateTime, Duration, TimeDelta, Utc};
use clap::ValueEnum;

use crate::models::RawCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Timeframe {
    /// Since midnight UTC today
    Daily,
    /// Last 7 days
    Weekly,
    /// Last 30 days
    Monthly,
}

impl Timeframe {
    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Daily => "Daily",
            Timeframe::Weekly => "Weekly",
            Timeframe::Monthly => "Monthly",
        }
    }
}

/// Longest window `--since-days` can ask for.
pub const MAX_SINCE_DAYS: i64 = 36_500;

/// Start of the reporting window. `since_days` overrides the timeframe and is
/// clamped to `1..=MAX_SINCE_DAYS`.
pub fn window_start(
    now: DateTime<Utc>,
    timeframe: Timeframe,
    since_days: Option<i64>,
) -> DateTime<Utc> {
    if let Some(days) = since_days {
        return TimeDelta::try_days(days.clamp(1, MAX_SINCE_DAYS))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
    }

    match timeframe {
        Timeframe::Daily => now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc())
            .unwrap_or(now),
        Timeframe::Weekly => now - Duration::days(7),
        Timeframe::Monthly => now - Duration::days(30),
    }
}

/// Keeps calls created in `[start, end]`, newest first.
pub fn within_window(
    calls: Vec<RawCall>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<RawCall> {
    let mut kept: Vec<RawCall> = calls
        .into_iter()
        .filter(|call| call.created_at >= start && call.created_at <= end)
        .collect();
    kept.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    kept
}
