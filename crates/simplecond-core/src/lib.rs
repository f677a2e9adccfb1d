//! Monitor-style condition variable for preemptive OS threads.
//!
//! Provides [`Condition`], a wait/signal primitive bound to an external
//! [`RawMutex`], with unbounded, timed (nanosecond budget), deadline
//! (wall clock) and interruptible wait flavors. The blocking core is
//! futex-based: signal and broadcast bump a sequence counter and wake the
//! futex word; a waiter atomically releases the paired mutex, blocks on
//! the sequence word and relocks the mutex before returning, so a signal
//! can never fall between the release and the block ("lost wakeup").
//!
//! Spurious wakeups are permitted. Callers use the standard monitor
//! pattern and re-check their predicate in a loop:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use std::sync::atomic::{AtomicBool, Ordering};
//! # use simplecond_core::{Condition, RawMutex};
//! let mutex = Arc::new(RawMutex::new());
//! let cond = Condition::new(mutex.clone());
//! let ready = AtomicBool::new(false);
//!
//! mutex.lock();
//! while !ready.load(Ordering::Acquire) {
//!     cond.wait().expect("interrupted");
//! }
//! mutex.unlock().expect("lock discipline violated");
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("simplecond is built on futex(2) and only targets Linux");

pub mod cond;
pub mod error;
pub(crate) mod futex;
pub mod interrupt;
pub mod mutex;
pub mod time;

pub use cond::Condition;
pub use error::MonitorError;
pub use interrupt::InterruptHandle;
pub use mutex::RawMutex;
pub use time::{Clock, ManualClock, SystemClock, Timespec, NANOS_PER_SEC};
