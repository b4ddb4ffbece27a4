// src/utils/cancel.rs
//! Cooperative cancellation shared by the acquisition and processing threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. Cloning yields a handle to the same flag.
///
/// Blocking socket reads check the flag before every `recv` and after every
/// timed-out `recv`, so cancellation latency is bounded by the socket timeout.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// New, un-set flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to wind down
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether a stop has been requested
    pub fn is_stop_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag so the owner can be restarted
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = StopSignal::new();
        let other = signal.clone();
        assert!(!other.is_stop_requested());

        signal.request_stop();
        assert!(other.is_stop_requested());

        other.reset();
        assert!(!signal.is_stop_requested());
    }
}
