//! Time source used for rotation decisions and history names

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    /// Offset of the calendar that period boundaries follow, at `at`
    fn offset_at(&self, at: &DateTime<Utc>) -> FixedOffset;

    /// `at` on that calendar
    fn local(&self, at: &DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset_at(at))
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset_at(&self, at: &DateTime<Utc>) -> FixedOffset {
        Local.offset_from_utc_datetime(&at.naive_utc()).fix()
    }
}

/// Clock that only moves when told to
///
/// Its calendar is UTC unless built with [`ManualClock::with_offset`].
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_offset(now, Utc.fix())
    }

    pub fn with_offset(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn offset_at(&self, _at: &DateTime<Utc>) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(
            clock.now(),
            Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 1).unwrap()
        );

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_manual_clock_calendar() {
        let start = Utc.with_ymd_and_hms(2024, 1, 16, 0, 30, 0).unwrap();
        assert_eq!(ManualClock::new(start).local(&start).offset().local_minus_utc(), 0);

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = ManualClock::with_offset(start, tokyo).local(&start);
        assert_eq!(local.to_rfc3339(), "2024-01-16T09:30:00+09:00");
    }

    #[test]
    fn test_system_clock_offset_matches_local() {
        let now = Utc::now();
        assert_eq!(
            SystemClock.offset_at(&now),
            now.with_timezone(&Local).offset().fix()
        );
    }
}
