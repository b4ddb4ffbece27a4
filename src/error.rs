// src/error.rs
//! Unified error handling for the acquisition-and-control pipeline
//!
//! Each stage owns a focused error type next to its code. [`EmgError`]
//! wraps them so thread entry points and the orchestration layer can return
//! one type, and classifies them for the retry-or-abort decision.

use crate::acquisition::BufferError;
use crate::config::ConfigError;
use crate::control::ControlError;
#[cfg(feature = "simulation")]
use crate::hal::simulator::SimulatorError;
use crate::hal::ProtocolError;
use crate::processing::ProcessingError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the entire EMG system
#[derive(Debug, Error)]
pub enum EmgError {
    /// Socket, framing or device errors
    #[error("[COMM] {0}")]
    Protocol(#[from] ProtocolError),

    /// Ring buffer construction errors
    #[error("[BUFFER] {0}")]
    Buffer(#[from] BufferError),

    /// Conditioning errors
    #[error("[PROCESSING] {0}")]
    Processing(#[from] ProcessingError),

    /// Controller and setpoint errors
    #[error("[CONTROL] {0}")]
    Control(#[from] ControlError),

    /// Synthetic source configuration errors
    #[cfg(feature = "simulation")]
    #[error("[SIMULATOR] {0}")]
    Simulator(#[from] SimulatorError),

    /// Configuration loading or validation errors
    #[error("[CONFIG] {0}")]
    Config(#[from] ConfigError),

    /// A pipeline thread could not be started
    #[error("[SYSTEM] failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        /// Thread name
        name: &'static str,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// A pipeline thread panicked
    #[error("[SYSTEM] {0} thread panicked")]
    ThreadPanicked(&'static str),
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// System can continue normally
    Low,
    /// System degraded but functional
    Medium,
    /// Acquisition stopped, reconnection needed
    High,
    /// Cannot run with this setup
    Critical,
}

impl EmgError {
    /// Whether the failing operation may simply be retried
    pub fn is_recoverable(&self) -> bool {
        match self {
            EmgError::Protocol(e) => e.is_recoverable(),
            _ => false,
        }
    }

    /// How bad the error is for a running system
    pub fn severity(&self) -> Severity {
        match self {
            EmgError::Protocol(ProtocolError::Transport { .. }) => Severity::Medium,
            EmgError::Protocol(ProtocolError::FrameSize { .. }) => Severity::Medium,
            EmgError::Protocol(_) => Severity::High,
            EmgError::Processing(ProcessingError::SignalTooShort { .. }) => Severity::Medium,
            EmgError::ThreadPanicked(_) => Severity::Critical,
            EmgError::Buffer(_)
            | EmgError::Processing(_)
            | EmgError::Control(_)
            | EmgError::Config(_)
            | EmgError::ThreadSpawn { .. } => Severity::Critical,
            #[cfg(feature = "simulation")]
            EmgError::Simulator(_) => Severity::Critical,
        }
    }
}

/// Result type alias for EMG operations
pub type EmgResult<T> = Result<T, EmgError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_transport_errors_are_recoverable() {
        let err: EmgError = ProtocolError::Transport {
            operation: "read data",
            source: IoError::new(ErrorKind::ConnectionReset, "reset"),
        }
        .into();
        assert!(err.is_recoverable());
        assert_eq!(err.severity(), Severity::Medium);
    }

    #[test]
    fn test_disconnect_is_not_recoverable() {
        let err: EmgError = ProtocolError::DeviceDisconnected { channel: "data" }.into();
        assert!(!err.is_recoverable());
        assert_eq!(err.severity(), Severity::High);
    }

    #[test]
    fn test_configuration_errors_are_critical() {
        let err: EmgError = ProcessingError::InvalidRate {
            original_hz: 10.0,
            target_hz: 20.0,
        }
        .into();
        assert_eq!(err.severity(), Severity::Critical);
        assert!(Severity::Critical > Severity::High);
    }

    #[test]
    fn test_error_display() {
        let err: EmgError = ConfigError::Validation(vec!["a".into(), "b".into()]).into();
        let display = format!("{}", err);
        assert!(display.starts_with("[CONFIG]"));
        assert!(display.contains("a; b"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EmgError>();
    }
}
