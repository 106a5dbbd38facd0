//! Wall-clock schedule: fire at fixed UTC hours every day.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Fixed times of day (whole UTC hours) at which a cycle is triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    hours: Vec<u32>,
}

impl DailySchedule {
    /// Build from a list of hours. Out-of-range hours are dropped;
    /// duplicates collapse.
    pub fn new(hours: &[u32]) -> Self {
        let mut hours: Vec<u32> = hours.iter().copied().filter(|h| *h < 24).collect();
        hours.sort_unstable();
        hours.dedup();
        if hours.is_empty() {
            hours.push(0);
        }
        Self { hours }
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    /// The first fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        for day in [today, today + Duration::days(1)] {
            for &h in &self.hours {
                let Some(time) = NaiveTime::from_hms_opt(h, 0, 0) else {
                    continue;
                };
                let at = day.and_time(time).and_utc();
                if at > now {
                    return at;
                }
            }
        }
        // Unreachable with at least one valid hour; fall back to a day later.
        now + Duration::days(1)
    }

    /// Time left until the next fire, clamped at zero.
    pub fn until_next(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.next_after(now) - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}
