//! Error taxonomy for monitor operations.
//!
//! Timeout and deadline expiry are deliberately absent: they are ordinary
//! outcomes reported through return values, never through this channel.

use thiserror::Error;

/// Errors reported by [`Condition`](crate::Condition) and
/// [`RawMutex`](crate::RawMutex) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// The calling thread does not hold the associated mutex. This is a
    /// caller defect, not a condition to retry; it is reported instead of
    /// silently corrupting the wait queue.
    #[error("calling thread does not hold the associated mutex")]
    NotOwned,

    /// The thread was interrupted while waiting (or carried a pending
    /// interrupt into the wait). The pending flag has been cleared and the
    /// mutex is held again on return.
    #[error("thread interrupted while waiting")]
    Interrupted,

    /// The requested wait flavor is not backed by the native primitive.
    #[error("wait flavor not supported by the underlying primitive")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_distinct() {
        let msgs = [
            MonitorError::NotOwned.to_string(),
            MonitorError::Interrupted.to_string(),
            MonitorError::Unsupported.to_string(),
        ];
        assert_ne!(msgs[0], msgs[1]);
        assert_ne!(msgs[1], msgs[2]);
        assert_ne!(msgs[0], msgs[2]);
    }
}
