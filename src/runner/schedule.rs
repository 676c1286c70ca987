//! Daemon scheduling: daily at a wall-clock time or on a fixed period.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone};

/// When the next batch should start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at this local time.
    Daily(NaiveTime),
    /// A fixed period after the previous cycle finished.
    Every(Duration),
}

impl Schedule {
    /// Delay from `now` until the next cycle.
    pub fn delay_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        match self {
            Self::Every(period) => *period,
            Self::Daily(at) => next_daily(now, *at)
                .signed_duration_since(now.clone())
                .to_std()
                .unwrap_or_default(),
        }
    }
}

/// Parse a `HH:MM` time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| format!("invalid time '{}', expected HH:MM: {}", raw, e))
}

/// First instant strictly after `now` whose local time is `at`.
pub fn next_daily<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();
    loop {
        // Skips days where `at` falls into a DST gap.
        if let Some(candidate) = tz.from_local_datetime(&day.and_time(at)).earliest() {
            if candidate > *now {
                return candidate;
            }
        }
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => return now.clone(),
        }
    }
}
