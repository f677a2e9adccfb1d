//! Time values and clock sources for timed waits.
//!
//! Implements the [`Timespec`] value type, nanosecond conversion helpers,
//! and the [`Clock`] abstraction the condition variable consumes: a
//! monotonic reading for relative-budget arithmetic and a wall reading for
//! absolute deadlines. Both are injected at construction so timeout logic
//! is testable against a deterministic clock.

use std::sync::atomic::{AtomicI64, Ordering};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A second/nanosecond time value, signed so it can carry both wall-clock
/// deadlines and (possibly negative) remaining budgets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999 in a normalized value).
    pub tv_nsec: i64,
}

impl Timespec {
    /// Build a normalized `Timespec` from a nanosecond count.
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Timespec {
            tv_sec: nanos.div_euclid(NANOS_PER_SEC),
            tv_nsec: nanos.rem_euclid(NANOS_PER_SEC),
        }
    }

    /// Total nanoseconds, saturating at the `i64` range limits.
    #[must_use]
    pub const fn as_nanos(&self) -> i64 {
        self.tv_sec
            .saturating_mul(NANOS_PER_SEC)
            .saturating_add(self.tv_nsec)
    }

    pub(crate) const fn to_libc(self) -> libc::timespec {
        libc::timespec {
            tv_sec: self.tv_sec,
            tv_nsec: self.tv_nsec,
        }
    }
}

/// Returns true if `tv_nsec` is in the normalized range [0, 999_999_999].
#[must_use]
pub const fn valid_timespec_nsec(tv_nsec: i64) -> bool {
    tv_nsec >= 0 && tv_nsec < NANOS_PER_SEC
}

/// Remaining budget after `elapsed` nanoseconds have been spent.
/// Non-positive means the budget is exhausted.
#[must_use]
pub const fn remaining_nanos(budget: i64, elapsed: i64) -> i64 {
    budget.saturating_sub(elapsed)
}

/// Wait budget implied by an absolute wall-clock deadline observed at `now`.
/// Non-positive means the deadline is already in the past.
#[must_use]
pub const fn deadline_budget(deadline_nanos: i64, now_wall_nanos: i64) -> i64 {
    deadline_nanos.saturating_sub(now_wall_nanos)
}

/// Clock source consumed by the condition variable.
///
/// `now_monotonic` drives all relative-timeout arithmetic (it must never go
/// backwards); `now_wall` is only read once per deadline wait to convert the
/// absolute deadline into a relative budget.
pub trait Clock: Send + Sync {
    /// Monotonic reading in nanoseconds from an arbitrary origin.
    fn now_monotonic(&self) -> i64;
    /// Wall-clock reading in nanoseconds since the Unix epoch.
    fn now_wall(&self) -> i64;
}

/// The process clocks, read via `clock_gettime(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

fn clock_gettime(clock_id: libc::clockid_t) -> Timespec {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a live, writable timespec; clock_id is a known clock.
    let rc = unsafe { libc::clock_gettime(clock_id, &mut ts) };
    debug_assert_eq!(rc, 0, "clock_gettime failed for clock {clock_id}");
    Timespec {
        tv_sec: ts.tv_sec,
        tv_nsec: ts.tv_nsec,
    }
}

impl Clock for SystemClock {
    fn now_monotonic(&self) -> i64 {
        clock_gettime(libc::CLOCK_MONOTONIC).as_nanos()
    }

    fn now_wall(&self) -> i64 {
        clock_gettime(libc::CLOCK_REALTIME).as_nanos()
    }
}

/// A manually advanced clock for deterministic timeout tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    monotonic: AtomicI64,
    wall: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given readings.
    #[must_use]
    pub fn new(monotonic: i64, wall: i64) -> Self {
        ManualClock {
            monotonic: AtomicI64::new(monotonic),
            wall: AtomicI64::new(wall),
        }
    }

    /// Advance both readings by `nanos`.
    pub fn advance(&self, nanos: i64) {
        self.monotonic.fetch_add(nanos, Ordering::SeqCst);
        self.wall.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_monotonic(&self) -> i64 {
        self.monotonic.load(Ordering::SeqCst)
    }

    fn now_wall(&self) -> i64 {
        self.wall.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_nanos_normalizes_positive() {
        let ts = Timespec::from_nanos(NANOS_PER_SEC + 250);
        assert_eq!(ts.tv_sec, 1);
        assert_eq!(ts.tv_nsec, 250);
        assert!(valid_timespec_nsec(ts.tv_nsec));
    }

    #[test]
    fn from_nanos_normalizes_negative() {
        let ts = Timespec::from_nanos(-1);
        assert_eq!(ts.tv_sec, -1);
        assert_eq!(ts.tv_nsec, NANOS_PER_SEC - 1);
        assert!(valid_timespec_nsec(ts.tv_nsec));
        assert_eq!(ts.as_nanos(), -1);
    }

    #[test]
    fn nanos_roundtrip() {
        for nanos in [0, 1, 999_999_999, NANOS_PER_SEC, 86_400 * NANOS_PER_SEC] {
            assert_eq!(Timespec::from_nanos(nanos).as_nanos(), nanos);
        }
    }

    #[test]
    fn as_nanos_saturates() {
        let ts = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: NANOS_PER_SEC - 1,
        };
        assert_eq!(ts.as_nanos(), i64::MAX);
    }

    #[test]
    fn timespec_nsec_range_check() {
        assert!(valid_timespec_nsec(0));
        assert!(valid_timespec_nsec(999_999_999));
        assert!(!valid_timespec_nsec(-1));
        assert!(!valid_timespec_nsec(NANOS_PER_SEC));
    }

    #[test]
    fn remaining_nanos_signs() {
        assert_eq!(remaining_nanos(100, 40), 60);
        assert_eq!(remaining_nanos(100, 100), 0);
        assert_eq!(remaining_nanos(100, 150), -50);
        assert_eq!(remaining_nanos(i64::MIN, 1), i64::MIN);
    }

    #[test]
    fn deadline_budget_past_deadline_is_non_positive() {
        assert!(deadline_budget(1_000, 2_000) < 0);
        assert_eq!(deadline_budget(2_000, 2_000), 0);
        assert_eq!(deadline_budget(3_000, 2_000), 1_000);
    }

    #[test]
    fn system_clock_monotonic_never_decreases() {
        let clock = SystemClock;
        let a = clock.now_monotonic();
        let b = clock.now_monotonic();
        assert!(b >= a);
    }

    #[test]
    fn system_clock_wall_is_past_2020() {
        // 2020-01-01T00:00:00Z in nanoseconds since the epoch.
        const Y2020_NS: i64 = 1_577_836_800 * NANOS_PER_SEC;
        assert!(SystemClock.now_wall() > Y2020_NS);
    }

    #[test]
    fn manual_clock_advances_both_readings() {
        let clock = ManualClock::new(10, 1_000);
        clock.advance(5);
        assert_eq!(clock.now_monotonic(), 15);
        assert_eq!(clock.now_wall(), 1_005);
    }
}
