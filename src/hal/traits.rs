// src/hal/traits.rs
//! Core HAL traits for EMG block sources

use crate::hal::types::{ProtocolResult, ReadOutcome};
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

/// Anything that yields fixed-shape blocks of active-channel samples
pub trait BlockSource: Send {
    /// Begin streaming
    fn start(&mut self) -> ProtocolResult<()>;

    /// Blocking read of one block of `samples_per_block` samples per channel
    fn read_block(&mut self, samples_per_block: usize) -> ProtocolResult<ReadOutcome>;

    /// Stop streaming
    fn stop(&mut self) -> ProtocolResult<()>;

    /// Number of rows in every produced block
    fn channel_count(&self) -> usize;

    /// Rate of the produced columns in Hz
    fn sample_rate_hz(&self) -> f64;
}

/// Byte stream underneath the protocol client
///
/// Implemented for `TcpStream`; tests substitute scripted streams.
pub trait Transport: Read + Write + Send {
    /// Bound each blocking read by `timeout`
    fn apply_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;

    /// Release the underlying connection. Must tolerate repeated calls.
    fn close(&mut self) -> std::io::Result<()>;
}

impl Transport for TcpStream {
    fn apply_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }

    fn close(&mut self) -> std::io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
