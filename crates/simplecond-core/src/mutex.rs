//! Futex-backed mutual-exclusion lock with owner tracking.
//!
//! The lock word protocol is the classic three-state futex mutex:
//! 0 = unlocked, 1 = locked uncontended, 2 = locked with (possible)
//! waiters. On top of that the lock records the owning thread id, which is
//! what lets the condition variable reject wait and signal calls from a
//! thread that does not hold the lock instead of corrupting the monitor.

use core::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::cell::Cell;

use crate::error::MonitorError;
use crate::futex;

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

thread_local! {
    static CACHED_TID: Cell<i32> = const { Cell::new(0) };
}

/// Kernel thread id of the calling thread, cached per thread.
pub(crate) fn current_tid() -> i32 {
    CACHED_TID.with(|cached| {
        let tid = cached.get();
        if tid != 0 {
            return tid;
        }
        // SAFETY: gettid takes no arguments and cannot fail.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) as i32 };
        cached.set(tid);
        tid
    })
}

/// A mutex suitable for pairing with [`Condition`](crate::Condition).
///
/// Not reentrant. The owner id exists for lock-discipline checks only; it
/// never participates in the lock/unlock fast path ordering.
#[derive(Debug, Default)]
pub struct RawMutex {
    state: AtomicU32,
    owner: AtomicI32,
}

impl RawMutex {
    /// Create an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        RawMutex {
            state: AtomicU32::new(UNLOCKED),
            owner: AtomicI32::new(0),
        }
    }

    /// Acquire the lock, blocking until it is available.
    pub fn lock(&self) {
        loop {
            if self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            // Mark as contended and park until a release wakes us.
            let _ = self.state.compare_exchange(
                LOCKED,
                CONTENDED,
                Ordering::Acquire,
                Ordering::Relaxed,
            );
            let _ = futex::wait(&self.state, CONTENDED, None);
        }
        self.owner.store(current_tid(), Ordering::Relaxed);
    }

    /// Acquire the lock if it is free. Returns `true` on success.
    pub fn try_lock(&self) -> bool {
        let acquired = self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if acquired {
            self.owner.store(current_tid(), Ordering::Relaxed);
        }
        acquired
    }

    /// Release the lock.
    ///
    /// Fails with [`MonitorError::NotOwned`] if the calling thread is not
    /// the current owner; the lock state is untouched in that case.
    pub fn unlock(&self) -> Result<(), MonitorError> {
        if !self.is_held_by_current() {
            return Err(MonitorError::NotOwned);
        }
        self.release();
        Ok(())
    }

    /// True if the calling thread currently owns the lock.
    #[must_use]
    pub fn is_held_by_current(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == current_tid()
            && self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Unconditional release: clear the owner, open the lock word and wake
    /// one parked thread. Callers have already verified ownership.
    pub(crate) fn release(&self) {
        self.owner.store(0, Ordering::Relaxed);
        self.state.store(UNLOCKED, Ordering::Release);
        futex::wake(&self.state, 1);
    }

    /// Reacquire the lock after a condition wait, parking on contention.
    ///
    /// No spin phase: the caller just woke from a condition wait, so any
    /// contention window is expected to be short.
    pub(crate) fn relock(&self) {
        loop {
            if self
                .state
                .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
            let _ = self.state.compare_exchange(
                LOCKED,
                CONTENDED,
                Ordering::Acquire,
                Ordering::Relaxed,
            );
            let _ = futex::wait(&self.state, CONTENDED, None);
        }
        self.owner.store(current_tid(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn current_tid_is_stable_and_nonzero() {
        let a = current_tid();
        let b = current_tid();
        assert_ne!(a, 0);
        assert_eq!(a, b);
    }

    #[test]
    fn lock_unlock_roundtrip() {
        let m = RawMutex::new();
        assert!(!m.is_held_by_current());
        m.lock();
        assert!(m.is_held_by_current());
        m.unlock().unwrap();
        assert!(!m.is_held_by_current());
    }

    #[test]
    fn unlock_without_lock_is_rejected() {
        let m = RawMutex::new();
        assert_eq!(m.unlock(), Err(MonitorError::NotOwned));
    }

    #[test]
    fn double_unlock_is_rejected() {
        let m = RawMutex::new();
        m.lock();
        m.unlock().unwrap();
        assert_eq!(m.unlock(), Err(MonitorError::NotOwned));
    }

    #[test]
    fn try_lock_fails_while_held_elsewhere() {
        let m = Arc::new(RawMutex::new());
        m.lock();
        let m2 = m.clone();
        let observed = thread::spawn(move || m2.try_lock()).join().unwrap();
        assert!(!observed);
        m.unlock().unwrap();
    }

    #[test]
    fn unlock_from_non_owner_thread_is_rejected() {
        let m = Arc::new(RawMutex::new());
        m.lock();
        let m2 = m.clone();
        let result = thread::spawn(move || m2.unlock()).join().unwrap();
        assert_eq!(result, Err(MonitorError::NotOwned));
        m.unlock().unwrap();
    }

    #[test]
    fn contended_counter_increments_are_exclusive() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        struct Shared {
            mutex: RawMutex,
            counter: std::cell::UnsafeCell<u64>,
        }
        // SAFETY: counter is only touched with the mutex held.
        unsafe impl Sync for Shared {}

        let shared = Arc::new(Shared {
            mutex: RawMutex::new(),
            counter: std::cell::UnsafeCell::new(0),
        });

        let mut handles = Vec::new();
        for _ in 0..THREADS {
            let s = shared.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..PER_THREAD {
                    s.mutex.lock();
                    // SAFETY: exclusive access under the mutex.
                    unsafe { *s.counter.get() += 1 };
                    s.mutex.unlock().unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        shared.mutex.lock();
        // SAFETY: exclusive access under the mutex.
        let total = unsafe { *shared.counter.get() };
        shared.mutex.unlock().unwrap();
        assert_eq!(total, (THREADS * PER_THREAD) as u64);
    }
}
