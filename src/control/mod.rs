// src/control/mod.rs
//! Sequential hand/wrist control and actuator setpoint shaping
//!
//! A deliberate co-contraction of the antagonist pair toggles between hand
//! and wrist control. The active mode receives the proportional difference
//! of the two channels, the other mode receives zero.

pub mod sequential;
pub mod setpoint;

pub use sequential::*;
pub use setpoint::*;

use thiserror::Error;

/// Errors raised while configuring or running the control stage
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Saturation lower bound above upper bound
    #[error("saturation bounds are inverted: min {min} V > max {max} V")]
    InvalidSaturation {
        /// Configured lower bound
        min: f64,
        /// Configured upper bound
        max: f64,
    },

    /// Deadband threshold negative or not finite
    #[error("deadband for {axis} must be a non-negative number, got {value}")]
    InvalidDeadband {
        /// `hand` or `wrist`
        axis: &'static str,
        /// Offending value
        value: f64,
    },

    /// Hysteresis width negative or threshold not finite
    #[error("hysteresis threshold {threshold} with width {width} is invalid")]
    InvalidHysteresis {
        /// Configured threshold
        threshold: f64,
        /// Configured half-width of the dead zone
        width: f64,
    },

    /// A control channel index is not present in the block
    #[error("control channel {index} is outside a {available}-channel block")]
    ChannelOutOfRange {
        /// 0-based row requested
        index: usize,
        /// Rows in the block
        available: usize,
    },

    /// Antagonist channels have different lengths
    #[error("channel lengths differ: {primary} vs {secondary}")]
    LengthMismatch {
        /// Samples in the primary channel
        primary: usize,
        /// Samples in the secondary channel
        secondary: usize,
    },
}

/// Result alias for the control stage
pub type ControlResult<T> = Result<T, ControlError>;
