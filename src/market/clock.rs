//! Regular-session window for US equities, expressed in UTC.

use crate::config::SessionConfig;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};

/// Decides whether the market is open and whether a tick falls inside the
/// post-open exclusion window.
#[derive(Debug, Clone)]
pub struct MarketClock {
    open: NaiveTime,
    close: NaiveTime,
    skip_minutes_after_open: u32,
}

impl MarketClock {
    pub fn new(session: &SessionConfig, skip_minutes_after_open: u32) -> Self {
        let open = NaiveTime::from_hms_opt(session.open_hour_utc, session.open_minute_utc, 0)
            .unwrap_or(NaiveTime::MIN);
        let close = NaiveTime::from_hms_opt(session.close_hour_utc, session.close_minute_utc, 0)
            .unwrap_or(NaiveTime::MIN);

        Self {
            open,
            close,
            skip_minutes_after_open,
        }
    }

    /// Weekday and between open and close, both inclusive.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = now.time();
        t >= self.open && t <= self.close
    }

    /// Minutes elapsed since today's open (negative before the open).
    pub fn minutes_since_open(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now.time() - self.open).num_seconds();
        secs as f64 / 60.0
    }

    /// True while strategy evaluation must be skipped after the open.
    pub fn in_pre_open_exclusion(&self, now: DateTime<Utc>) -> bool {
        if self.skip_minutes_after_open == 0 || !self.is_open(now) {
            return false;
        }
        self.minutes_since_open(now) < f64::from(self.skip_minutes_after_open)
    }
}
