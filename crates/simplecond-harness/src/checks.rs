//! Live contract checks.
//!
//! Each check builds a fresh monitor, drives real threads through one
//! guarantee of the wait/signal contract and reports a pass/fail verdict
//! with a human-readable detail line. Checks rendezvous through the
//! waiter count and atomic flags; blocking steps that could hang on a
//! regression are bounded by generous timed waits and reported as
//! failures instead.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use serde::{Deserialize, Serialize};
use simplecond_core::{interrupt, Condition, MonitorError, RawMutex, NANOS_PER_SEC};

/// Upper bound for any single blocking step inside a check. Generous on
/// purpose: reaching it means the contract is broken, not that the
/// machine is slow.
const STEP_BUDGET_NANOS: i64 = 10 * NANOS_PER_SEC;

/// Outcome of one contract check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    /// Stable check identifier.
    pub id: String,
    /// One-line statement of the guarantee being checked.
    pub description: String,
    /// Whether the guarantee held.
    pub passed: bool,
    /// Human-readable evidence or failure detail.
    pub detail: String,
}

impl CheckResult {
    fn new(id: &str, description: &str, passed: bool, detail: String) -> Self {
        CheckResult {
            id: id.to_string(),
            description: description.to_string(),
            passed,
            detail,
        }
    }
}

struct Monitor {
    mutex: Arc<RawMutex>,
    cond: Condition,
}

impl Monitor {
    fn new() -> Arc<Self> {
        let mutex = Arc::new(RawMutex::new());
        let cond = Condition::new(mutex.clone());
        Arc::new(Monitor { mutex, cond })
    }
}

fn await_waiters(cond: &Condition, n: u32) {
    while cond.waiter_count() < n {
        std::hint::spin_loop();
    }
}

/// Run every contract check, in a stable order.
#[must_use]
pub fn run_all() -> Vec<CheckResult> {
    let checks: [fn() -> CheckResult; 6] = [
        check_no_lost_wakeup,
        check_lock_reacquired_exactly_once,
        check_signal_not_latched,
        check_broadcast_wakes_all,
        check_interrupt_unblocks_waiter,
        check_ready_flag_rendezvous,
    ];
    checks
        .iter()
        .map(|check| {
            let result = check();
            log::debug!(
                "contract check {}: {}",
                result.id,
                if result.passed { "pass" } else { "FAIL" }
            );
            result
        })
        .collect()
}

/// A signal sent after the waiter is observably blocked must wake it.
fn check_no_lost_wakeup() -> CheckResult {
    const ID: &str = "no-lost-wakeup";
    const DESC: &str = "a signal sent after a wait is observed blocked always wakes it";

    let m = Monitor::new();
    let woke = Arc::new(AtomicU32::new(0));

    let m2 = m.clone();
    let woke2 = woke.clone();
    let waiter = thread::spawn(move || {
        m2.mutex.lock();
        let verdict = m2.cond.wait_nanos(STEP_BUDGET_NANOS);
        if matches!(verdict, Ok(left) if left > 0) {
            woke2.fetch_add(1, Ordering::AcqRel);
        }
        m2.mutex.unlock().unwrap();
    });

    await_waiters(&m.cond, 1);
    m.mutex.lock();
    let signal_ok = m.cond.signal().is_ok();
    m.mutex.unlock().unwrap();
    waiter.join().unwrap();

    let woken = woke.load(Ordering::Acquire);
    CheckResult::new(
        ID,
        DESC,
        signal_ok && woken == 1,
        format!("signal accepted: {signal_ok}, waiters woken in time: {woken}"),
    )
}

/// After a wait returns, releasing the mutex succeeds exactly once.
fn check_lock_reacquired_exactly_once() -> CheckResult {
    const ID: &str = "lock-reacquired-once";
    const DESC: &str = "a returning wait holds the mutex again, and only once";

    let m = Monitor::new();
    let m2 = m.clone();
    let waiter = thread::spawn(move || {
        m2.mutex.lock();
        let _ = m2.cond.wait_nanos(STEP_BUDGET_NANOS);
        let first = m2.mutex.unlock();
        let second = m2.mutex.unlock();
        (first, second)
    });

    await_waiters(&m.cond, 1);
    m.mutex.lock();
    m.cond.signal().expect("signaler holds the mutex");
    m.mutex.unlock().unwrap();

    let (first, second) = waiter.join().unwrap();
    let passed = first == Ok(()) && second == Err(MonitorError::NotOwned);
    CheckResult::new(
        ID,
        DESC,
        passed,
        format!("first unlock: {first:?}, second unlock: {second:?}"),
    )
}

/// Signals sent with zero waiters must not wake a later waiter.
fn check_signal_not_latched() -> CheckResult {
    const ID: &str = "signal-not-latched";
    const DESC: &str = "signals with no waiters are discarded, not queued";

    let m = Monitor::new();
    m.mutex.lock();
    for _ in 0..3 {
        m.cond.signal().expect("signaler holds the mutex");
    }
    m.cond.broadcast().expect("signaler holds the mutex");
    // A short timed wait after the fact must run to its timeout.
    let remaining = m.cond.wait_nanos(20_000_000).unwrap_or(i64::MAX);
    m.mutex.unlock().unwrap();

    CheckResult::new(
        ID,
        DESC,
        remaining <= 0,
        format!("remaining budget after earlier signals: {remaining}"),
    )
}

/// Broadcast with N waiters releases all N.
fn check_broadcast_wakes_all() -> CheckResult {
    const ID: &str = "broadcast-wakes-all";
    const DESC: &str = "broadcast releases every blocked waiter";
    const WAITERS: u32 = 4;

    let m = Monitor::new();
    let woke = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..WAITERS {
        let m2 = m.clone();
        let woke2 = woke.clone();
        handles.push(thread::spawn(move || {
            m2.mutex.lock();
            if matches!(m2.cond.wait_nanos(STEP_BUDGET_NANOS), Ok(left) if left > 0) {
                woke2.fetch_add(1, Ordering::AcqRel);
            }
            m2.mutex.unlock().unwrap();
        }));
    }

    await_waiters(&m.cond, WAITERS);
    m.mutex.lock();
    let broadcast_ok = m.cond.broadcast().is_ok();
    m.mutex.unlock().unwrap();
    for h in handles {
        h.join().unwrap();
    }

    let woken = woke.load(Ordering::Acquire);
    CheckResult::new(
        ID,
        DESC,
        broadcast_ok && woken == WAITERS && m.cond.waiter_count() == 0,
        format!("woken {woken}/{WAITERS}, left blocked: {}", m.cond.waiter_count()),
    )
}

/// Interruption unblocks a waiter with the distinct error, a cleared flag
/// and the mutex held.
fn check_interrupt_unblocks_waiter() -> CheckResult {
    const ID: &str = "interrupt-unblocks";
    const DESC: &str = "interruption ends a blocked wait with the lock reacquired";

    let m = Monitor::new();
    let (tx, rx) = mpsc::channel();

    let m2 = m.clone();
    let waiter = thread::spawn(move || {
        tx.send(interrupt::current()).unwrap();
        m2.mutex.lock();
        let verdict = m2.cond.wait_nanos(STEP_BUDGET_NANOS);
        let flag_cleared = !interrupt::is_interrupted();
        let unlock = m2.mutex.unlock();
        (verdict, flag_cleared, unlock)
    });

    let handle = rx.recv().unwrap();
    await_waiters(&m.cond, 1);
    handle.interrupt();

    let (verdict, flag_cleared, unlock) = waiter.join().unwrap();
    let passed =
        verdict == Err(MonitorError::Interrupted) && flag_cleared && unlock == Ok(());
    CheckResult::new(
        ID,
        DESC,
        passed,
        format!("verdict: {verdict:?}, flag cleared: {flag_cleared}, unlock: {unlock:?}"),
    )
}

/// The canonical two-thread monitor rendezvous terminates.
fn check_ready_flag_rendezvous() -> CheckResult {
    const ID: &str = "ready-flag-rendezvous";
    const DESC: &str = "predicate-loop waiter observes the flagged signal and terminates";

    let m = Monitor::new();
    let ready = Arc::new(AtomicBool::new(false));
    let observed = Arc::new(AtomicBool::new(false));

    let m2 = m.clone();
    let ready2 = ready.clone();
    let observed2 = observed.clone();
    let consumer = thread::spawn(move || {
        m2.mutex.lock();
        while !ready2.load(Ordering::Acquire) {
            // Bounded so a broken signal path fails instead of hanging.
            if m2.cond.wait_nanos(STEP_BUDGET_NANOS).unwrap_or(0) <= 0 {
                break;
            }
        }
        observed2.store(ready2.load(Ordering::Acquire), Ordering::Release);
        m2.mutex.unlock().unwrap();
    });

    await_waiters(&m.cond, 1);
    m.mutex.lock();
    ready.store(true, Ordering::Release);
    m.cond.signal().expect("signaler holds the mutex");
    m.mutex.unlock().unwrap();
    consumer.join().unwrap();

    let passed = observed.load(Ordering::Acquire);
    CheckResult::new(ID, DESC, passed, format!("consumer observed ready: {passed}"))
}
