use std::sync::Mutex;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock that only moves when told to.
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

pub fn calendar_day(instant: OffsetDateTime, offset: UtcOffset) -> Date {
    instant.to_offset(offset).date()
}

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn days_between(from: Date, to: Date) -> i64 {
    (to - from).whole_days()
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::{Clock, FixedClock, calendar_day, days_between};
    use time::macros::{date, datetime, offset};
    use time::{Duration, UtcOffset};

    #[test]
    fn calendar_day_truncates_in_configured_offset() {
        let instant = datetime!(2025-03-03 23:30 UTC);

        assert_eq!(calendar_day(instant, UtcOffset::UTC), date!(2025 - 03 - 03));
        assert_eq!(calendar_day(instant, offset!(+2)), date!(2025 - 03 - 04));
    }

    #[test]
    fn days_between_counts_calendar_days() {
        assert_eq!(days_between(date!(2025 - 03 - 03), date!(2025 - 03 - 10)), 7);
        assert_eq!(days_between(date!(2025 - 03 - 10), date!(2025 - 03 - 03)), -7);
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(datetime!(2025-03-03 09:00 UTC));
        clock.advance(Duration::days(2));

        assert_eq!(clock.now(), datetime!(2025-03-05 09:00 UTC));
    }
}
