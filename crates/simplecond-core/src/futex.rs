//! Thin wrappers over the Linux `futex(2)` syscall.
//!
//! Only the private-futex operations the mutex and condition variable
//! need are exposed: relative-timeout wait and wake. The raw trap goes
//! through `libc::syscall`; kernel error codes are folded into
//! [`WaitOutcome`] so the callers never touch errno directly.

use core::sync::atomic::AtomicU32;
use std::io;
use std::ptr;

const FUTEX_WAIT: libc::c_int = 0;
const FUTEX_WAKE: libc::c_int = 1;
const FUTEX_PRIVATE_FLAG: libc::c_int = 0x80;

/// How a `FUTEX_WAIT` call came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// Woken by a `FUTEX_WAKE` on the word, or spuriously.
    Woken,
    /// The word no longer held the expected value at wait time.
    Mismatch,
    /// Interrupted by an OS signal (`EINTR`), not by cooperative interruption.
    OsSignal,
    /// The relative timeout elapsed.
    TimedOut,
}

/// Block on `word` while it still contains `expected`.
///
/// `timeout` is a relative bound measured on `CLOCK_MONOTONIC`; `None`
/// waits indefinitely. Unknown kernel errors are reported as `Woken` so a
/// caller loop can re-evaluate its own exit conditions instead of spinning
/// on a persistent error.
pub(crate) fn wait(word: &AtomicU32, expected: u32, timeout: Option<libc::timespec>) -> WaitOutcome {
    let uaddr = word.as_ptr() as *const u32;
    let ts_ptr = timeout
        .as_ref()
        .map_or(ptr::null(), |ts| ts as *const libc::timespec);
    // SAFETY: uaddr points into a live AtomicU32 borrowed for the duration
    // of the call; ts_ptr is null or points to a stack timespec.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            uaddr,
            FUTEX_WAIT | FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        )
    };
    if rc == 0 {
        return WaitOutcome::Woken;
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::EAGAIN) => WaitOutcome::Mismatch,
        Some(libc::EINTR) => WaitOutcome::OsSignal,
        Some(libc::ETIMEDOUT) => WaitOutcome::TimedOut,
        _ => WaitOutcome::Woken,
    }
}

/// Wake up to `count` threads blocked on `word`. Returns the number woken.
pub(crate) fn wake(word: &AtomicU32, count: i32) -> i32 {
    // SAFETY: the word is a live AtomicU32 borrowed for the duration of the
    // call; FUTEX_WAKE never writes through the address.
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr() as *const u32,
            FUTEX_WAKE | FUTEX_PRIVATE_FLAG,
            count,
            ptr::null::<libc::timespec>(),
            ptr::null::<u32>(),
            0u32,
        )
    };
    if rc < 0 { 0 } else { rc as i32 }
}
