// src/hal/types.rs
//! Core types shared by block sources and the processing stages

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by block sources and the Trigno protocol client
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Connecting a socket failed
    #[error("failed to connect to {endpoint}: {source}")]
    Connection {
        /// `host:port` that was dialled
        endpoint: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The greeting on the command socket could not be drained
    #[error("handshake with {endpoint} failed: {reason}")]
    Handshake {
        /// `host:port` of the command socket
        endpoint: String,
        /// What went wrong
        reason: String,
    },

    /// The peer closed the connection (`recv` returned zero bytes)
    #[error("device closed the {channel} connection")]
    DeviceDisconnected {
        /// Which socket was closed, `command` or `data`
        channel: &'static str,
    },

    /// Transient socket fault; the read produced no data
    #[error("transport error during {operation}: {source}")]
    Transport {
        /// Operation in progress
        operation: &'static str,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// A raw frame did not have the expected byte length
    #[error("frame has {actual} bytes, expected {expected}")]
    FrameSize {
        /// Bytes implied by the configured shape
        expected: usize,
        /// Bytes received
        actual: usize,
    },

    /// A selected channel index is outside the device's channel count
    #[error("channel {channel} is outside the device range 1..={total}")]
    InvalidChannel {
        /// 1-based channel index as configured
        channel: usize,
        /// Channels the device streams
        total: usize,
    },

    /// Command or data socket used before `connect` or after `close`
    #[error("client is not connected")]
    NotConnected,
}

impl ProtocolError {
    /// Transport faults may be retried; everything else ends the acquisition loop
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProtocolError::Transport { .. })
    }
}

/// Result alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Physical unit the raw float stream is expressed in after scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Device output as-is
    #[default]
    #[serde(alias = "v")]
    Volts,
    /// Volts times 1000
    #[serde(alias = "mv")]
    Millivolts,
    /// Divided by the sensor's 11 mV full-scale range
    Normalized,
}

impl Units {
    /// Multiplier applied to the device's volt readings
    pub fn scale(self) -> f64 {
        match self {
            Units::Volts => 1.0,
            Units::Millivolts => 1000.0,
            Units::Normalized => 1.0 / 0.011,
        }
    }
}

/// 0-based rows selected from the full device frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSelection {
    indices: Vec<usize>,
}

impl ChannelSelection {
    /// Build from 1-based channel numbers as written in configuration
    pub fn from_active(active: &[usize], total_channels: usize) -> ProtocolResult<Self> {
        let mut indices = Vec::with_capacity(active.len());
        for &channel in active {
            if channel == 0 || channel > total_channels {
                return Err(ProtocolError::InvalidChannel {
                    channel,
                    total: total_channels,
                });
            }
            indices.push(channel - 1);
        }
        Ok(Self { indices })
    }

    /// Build from a 1-based inclusive range, e.g. `(1, 4)` selects rows 0..=3
    pub fn from_range(low: usize, high: usize, total_channels: usize) -> ProtocolResult<Self> {
        let active: Vec<usize> = (low..=high).collect();
        if active.is_empty() {
            return Err(ProtocolError::InvalidChannel {
                channel: low,
                total: total_channels,
            });
        }
        Self::from_active(&active, total_channels)
    }

    /// Every channel of the device
    pub fn all(total_channels: usize) -> Self {
        Self {
            indices: (0..total_channels).collect(),
        }
    }

    /// 0-based row indices
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of selected channels
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when nothing is selected
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Samples of the active channels, shape (channels × samples)
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBlock {
    /// One row per channel
    pub samples: Array2<f64>,
    /// Rate the columns were sampled at
    pub sample_rate_hz: f64,
    /// Wall-clock time the block was produced
    pub timestamp_ns: u64,
}

impl ChannelBlock {
    /// Wrap a sample matrix
    pub fn new(samples: Array2<f64>, sample_rate_hz: f64, timestamp_ns: u64) -> Self {
        Self {
            samples,
            sample_rate_hz,
            timestamp_ns,
        }
    }

    /// All-zero block
    pub fn zeros(channels: usize, samples: usize, sample_rate_hz: f64, timestamp_ns: u64) -> Self {
        Self::new(Array2::zeros((channels, samples)), sample_rate_hz, timestamp_ns)
    }

    /// Number of rows
    pub fn channel_count(&self) -> usize {
        self.samples.nrows()
    }

    /// Number of columns
    pub fn samples_per_channel(&self) -> usize {
        self.samples.ncols()
    }

    /// View one channel's samples
    pub fn channel(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        if index < self.channel_count() {
            Some(self.samples.index_axis(Axis(0), index))
        } else {
            None
        }
    }

    /// Keep only the selected rows and multiply by `gain`
    pub fn select(&self, selection: &ChannelSelection, gain: f64) -> ProtocolResult<Self> {
        if let Some(&bad) = selection
            .indices()
            .iter()
            .find(|&&row| row >= self.channel_count())
        {
            return Err(ProtocolError::InvalidChannel {
                channel: bad + 1,
                total: self.channel_count(),
            });
        }
        let selected = self.samples.select(Axis(0), selection.indices()) * gain;
        Ok(Self::new(selected, self.sample_rate_hz, self.timestamp_ns))
    }
}

/// How much of a block actually came off the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFill {
    /// Every byte was received
    Complete,
    /// A `recv` timed out and the rest of the block is zeros
    ZeroPadded {
        /// Bytes received before the timeout
        received_bytes: usize,
    },
}

/// Result of a blocking block read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A block of the requested shape
    Block {
        /// The samples
        block: ChannelBlock,
        /// Whether zero padding was applied
        fill: BlockFill,
    },
    /// The stop flag was raised before the block completed
    Cancelled,
}

impl ReadOutcome {
    /// The block, if one was produced
    pub fn into_block(self) -> Option<ChannelBlock> {
        match self {
            ReadOutcome::Block { block, .. } => Some(block),
            ReadOutcome::Cancelled => None,
        }
    }
}
