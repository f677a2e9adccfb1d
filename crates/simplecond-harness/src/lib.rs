//! Conformance harness for the monitor condition variable.
//!
//! Runs the wait/signal contract as live, named checks against real
//! threads and renders the results as a markdown or JSON report. The
//! checks cover the ordering-sensitive guarantees (lost wakeups, lock
//! reacquisition, unlatched signals, broadcast coverage, interruption);
//! wall-time-sensitive behavior stays in the core crate's integration
//! tests where scheduler slop can be budgeted per assertion.

pub mod checks;
pub mod report;

pub use checks::{run_all, CheckResult};
pub use report::ConformanceReport;
