//! Monitor condition variable.
//!
//! [`Condition`] layers wait/signal/broadcast semantics over a futex word:
//! signal and broadcast bump a sequence counter and wake the word; a wait
//! captures the counter under the lock, releases the lock, blocks while
//! the counter is unchanged and relocks before returning. Because the
//! counter is captured before the release and `FUTEX_WAIT` re-checks it
//! atomically in the kernel, a signal arriving between release and block
//! is observed as a counter mismatch rather than lost.
//!
//! The condition never loops on the caller's predicate and may return
//! spuriously; callers follow the monitor pattern and re-check.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::MonitorError;
use crate::futex::{self, WaitOutcome};
use crate::interrupt;
use crate::mutex::RawMutex;
use crate::time::{deadline_budget, remaining_nanos, Clock, SystemClock, Timespec};

/// A condition variable bound to one [`RawMutex`] for its whole lifetime.
///
/// Every operation requires the calling thread to hold that mutex; every
/// wait flavor returns with the mutex reacquired, on success and on every
/// error path. The type is deliberately neither `Clone` nor `Copy`: its
/// identity is the futex word waiters block on.
pub struct Condition {
    /// Bumped by signal/broadcast (and by interruption, via the park
    /// registration); the futex word waiters block on. Shared so an
    /// interrupter can bump it even after the target moved on.
    seq: Arc<AtomicU32>,
    /// Number of threads currently inside a wait.
    waiters: AtomicU32,
    mutex: Arc<RawMutex>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("seq", &self.seq.load(Ordering::Relaxed))
            .field("waiters", &self.waiters.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Condition {
    /// Bind a condition to `mutex`, using the system clocks for timed waits.
    #[must_use]
    pub fn new(mutex: Arc<RawMutex>) -> Self {
        Condition::with_clock(mutex, Arc::new(SystemClock))
    }

    /// Bind a condition to `mutex` with an injected clock source.
    ///
    /// The injected clock is authoritative for all timeout and deadline
    /// arithmetic; the kernel-side futex timeout only bounds how long a
    /// single block lasts before the clock is consulted again.
    #[must_use]
    pub fn with_clock(mutex: Arc<RawMutex>, clock: Arc<dyn Clock>) -> Self {
        Condition {
            seq: Arc::new(AtomicU32::new(0)),
            waiters: AtomicU32::new(0),
            mutex,
            clock,
        }
    }

    /// The mutex this condition is bound to.
    #[must_use]
    pub fn mutex(&self) -> &Arc<RawMutex> {
        &self.mutex
    }

    /// True if at least one thread is blocked in a wait on this condition.
    #[must_use]
    pub fn has_waiters(&self) -> bool {
        self.waiter_count() > 0
    }

    /// Number of threads currently blocked in a wait on this condition.
    #[must_use]
    pub fn waiter_count(&self) -> u32 {
        self.waiters.load(Ordering::Acquire)
    }

    /// Wait until signalled, broadcast, interrupted or woken spuriously.
    ///
    /// The mutex is atomically released for the duration of the block and
    /// is held again when this returns, including on the
    /// [`MonitorError::Interrupted`] path. Interruption clears the pending
    /// flag. A pending interrupt on entry fails the wait immediately; in
    /// that case it is unspecified whether the mutex was ever released.
    pub fn wait(&self) -> Result<(), MonitorError> {
        self.wait_core(None).map(|_| ())
    }

    /// Wait with a relative budget of `timeout_nanos` nanoseconds.
    ///
    /// Returns the estimated remaining budget: positive means the thread
    /// woke with time to spare (signal, broadcast or spurious wakeup);
    /// non-positive means the budget is exhausted. A positive result can
    /// be passed to a subsequent call to finish waiting out the original
    /// budget. The estimate does not overstate the time left: elapsed time
    /// is measured on the monotonic clock and includes the relock.
    ///
    /// A budget `<= 0` returns immediately with the mutex still held.
    pub fn wait_nanos(&self, timeout_nanos: i64) -> Result<i64, MonitorError> {
        self.wait_core(Some(timeout_nanos))
    }

    /// Convenience form of [`wait_nanos`](Condition::wait_nanos) taking a
    /// [`Duration`]. Returns `false` if the wait detectably timed out.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, MonitorError> {
        let nanos = i64::try_from(timeout.as_nanos()).unwrap_or(i64::MAX);
        Ok(self.wait_nanos(nanos)? > 0)
    }

    /// Wait until the absolute wall-clock `deadline`.
    ///
    /// The deadline is converted to a relative budget against the wall
    /// clock once, at entry; the wait itself runs on the monotonic clock.
    /// Returns `false` if the deadline had elapsed by the time of return.
    /// A deadline already in the past returns immediately.
    pub fn wait_until(&self, deadline: Timespec) -> Result<bool, MonitorError> {
        let budget = deadline_budget(deadline.as_nanos(), self.clock.now_wall());
        Ok(self.wait_core(Some(budget))? > 0)
    }

    /// Uninterruptible wait. Not backed by the native primitive; reported
    /// as [`MonitorError::Unsupported`] rather than emulated by dropping
    /// interrupts on the floor.
    pub fn wait_uninterruptibly(&self) -> Result<(), MonitorError> {
        Err(MonitorError::Unsupported)
    }

    /// Wake at least one waiting thread, with no fairness guarantee.
    ///
    /// A no-op when nobody is waiting: signals are not latched for future
    /// waiters. The woken thread still has to reacquire the mutex, so it
    /// does not run inside the monitor before the signaler releases it.
    pub fn signal(&self) -> Result<(), MonitorError> {
        self.wake(1)
    }

    /// Wake every thread currently waiting on this condition. Each woken
    /// thread reacquires the mutex in turn.
    pub fn broadcast(&self) -> Result<(), MonitorError> {
        self.wake(i32::MAX)
    }

    fn wake(&self, count: i32) -> Result<(), MonitorError> {
        if !self.mutex.is_held_by_current() {
            return Err(MonitorError::NotOwned);
        }
        self.seq.fetch_add(1, Ordering::Release);
        if self.has_waiters() {
            let woken = futex::wake(&self.seq, count);
            if count > 1 {
                log::trace!("broadcast woke {woken} waiter(s)");
            }
        }
        Ok(())
    }

    /// Shared wait choreography. `budget` is a relative nanosecond bound,
    /// `None` for an unbounded wait. Returns the remaining budget (0 for
    /// unbounded waits).
    ///
    /// Step order matters: the sequence counter is captured and the waiter
    /// registered *before* the mutex is released, so a signal sent by the
    /// next lock holder either wakes the futex after this thread parked or
    /// is detected as a counter mismatch by `FUTEX_WAIT`.
    fn wait_core(&self, budget: Option<i64>) -> Result<i64, MonitorError> {
        if !self.mutex.is_held_by_current() {
            return Err(MonitorError::NotOwned);
        }
        if interrupt::clear_interrupt() {
            // Pending on entry: fail before releasing the lock.
            return Err(MonitorError::Interrupted);
        }
        if let Some(budget) = budget {
            if budget <= 0 {
                // Exhausted before it began; the lock was never released.
                return Ok(budget);
            }
        }

        let start = self.clock.now_monotonic();
        let expected = self.seq.load(Ordering::Acquire);
        self.waiters.fetch_add(1, Ordering::AcqRel);
        let park = interrupt::park_on(&self.seq);

        self.mutex.release();

        let mut interrupted = false;
        loop {
            if interrupt::is_interrupted() {
                interrupted = true;
                break;
            }
            let timeout = match budget {
                None => None,
                Some(budget) => {
                    let elapsed = self.clock.now_monotonic() - start;
                    let left = remaining_nanos(budget, elapsed);
                    if left <= 0 {
                        break;
                    }
                    Some(Timespec::from_nanos(left).to_libc())
                }
            };
            let outcome = futex::wait(&self.seq, expected, timeout);
            if interrupt::is_interrupted() {
                interrupted = true;
                break;
            }
            match outcome {
                // Signalled, broadcast or spurious: return to the caller,
                // which re-checks its predicate per the monitor pattern.
                WaitOutcome::Woken | WaitOutcome::Mismatch => break,
                // Kernel timeout or an OS signal: the injected clock (or
                // the interrupt flag) decides at the top of the loop.
                WaitOutcome::TimedOut | WaitOutcome::OsSignal => continue,
            }
        }

        self.waiters.fetch_sub(1, Ordering::AcqRel);
        // Stop advertising the park word before blocking on the mutex:
        // from here on the wait can no longer be interrupted, only the
        // relock can be delayed.
        drop(park);

        self.mutex.relock();

        if interrupted {
            interrupt::clear_interrupt();
            return Err(MonitorError::Interrupted);
        }
        match budget {
            None => Ok(0),
            Some(budget) => {
                let elapsed = self.clock.now_monotonic() - start;
                Ok(remaining_nanos(budget, elapsed))
            }
        }
    }
}
