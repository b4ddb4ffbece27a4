// src/processing/mod.rs
//! Signal conditioning from raw device blocks to control-rate envelopes

pub mod conditioner;
pub mod filters;

pub use conditioner::*;
pub use filters::{BandType, FilterSpec, IirCoefficients, ZeroPhaseFilter};

use thiserror::Error;

/// Errors raised while configuring or running the conditioning stage
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProcessingError {
    /// `floor(original / target)` is below 1 or a rate is not positive
    #[error("cannot decimate from {original_hz} Hz to {target_hz} Hz")]
    InvalidRate {
        /// Device sampling rate
        original_hz: f64,
        /// Requested control rate
        target_hz: f64,
    },

    /// Filter order, band or cutoffs are inconsistent
    #[error("invalid filter configuration: {0}")]
    FilterConfig(String),

    /// Too few samples for the zero-phase filter's edge padding
    #[error("signal has {len} samples, zero-phase filtering needs more than {padlen}")]
    SignalTooShort {
        /// Samples available
        len: usize,
        /// Padding the filter applies on each side
        padlen: usize,
    },

    /// Conditioned rows could not be reassembled into a block
    #[error("conditioned block has inconsistent shape: {0}")]
    Shape(String),
}

/// Result alias for the conditioning stage
pub type ProcessingResult<T> = Result<T, ProcessingError>;
