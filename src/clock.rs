//! Injected clock port. Expiry is checked lazily against `now()`, there is
//! no timer thread anywhere in the crate.
use super::referral::TimeStamp;
use chrono::Utc;
use std::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// Hand-cranked clock for tests that need to cross the validity window.
pub struct ManualClock(Mutex<TimeStamp<Utc>>);

impl ManualClock {
    pub fn starting_at(start: TimeStamp<Utc>) -> Self {
        Self(Mutex::new(start))
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.0.lock().expect("clock lock poisoned");
        *now = now.plus_seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeStamp<Utc> {
        self.0.lock().expect("clock lock poisoned").clone()
    }
}
