//! Injectable wall clock.
//!
//! Every timestamp the services write (`updated_at`, `expires_at`, rate-limit
//! marks) comes from a [`Clock`], so expiry and rate limiting can be tested at
//! exact boundaries.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.now.lock();
    *now += by;
  }

  pub fn set(&self, to: DateTime<Utc>) { *self.now.lock() = to; }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock() }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn manual_clock_advances() {
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    clock.advance(TimeDelta::seconds(91));
    assert_eq!(clock.now(), start + TimeDelta::seconds(91));
  }
}
