use std::sync::Mutex;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

/// Source of "now" for every time-dependent rule.
///
/// Schedule times are ward wall-clock values, so services read `local_now()`;
/// audit timestamps use `now()`.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset {
        Utc.fix()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&self.offset()).naive_local()
    }

    fn today(&self) -> NaiveDate {
        self.local_now().date()
    }
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(ward_utc_offset_minutes: i32) -> Self {
        let offset = ward_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Ward UTC offset of {} minutes is out of range, using UTC",
                    ward_utc_offset_minutes
                );
                Utc.fix()
            });
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Manually driven clock in UTC.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Clock whose ward wall time equals `local`.
    pub fn at_local(local: NaiveDateTime) -> Self {
        Self::new(local.and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fixed_clock_reports_local_wall_time() {
        let local = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let clock = FixedClock::at_local(local);

        assert_eq!(clock.local_now(), local);
        clock.advance(Duration::hours(17));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
    }

    #[test]
    fn system_clock_applies_ward_offset() {
        let clock = SystemClock::new(120);
        let diff = clock.local_now() - clock.now().naive_utc();
        assert!((diff - Duration::minutes(120)).num_seconds().abs() <= 1);
    }

    #[test]
    fn absurd_offset_falls_back_to_utc() {
        for minutes in [i32::MAX, i32::MIN, 24 * 60] {
            assert_eq!(SystemClock::new(minutes).offset(), Utc.fix());
        }
    }
}
