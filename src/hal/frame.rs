// src/hal/frame.rs
//! Interleaved little-endian float frames as streamed on the data socket
//!
//! One sample period is `total_channels` consecutive `f32` values, so the
//! byte layout is sample-major and the decoded matrix is channel-major.

use crate::hal::types::{ProtocolError, ProtocolResult};
use ndarray::Array2;

/// Width of one value on the wire
pub const BYTES_PER_VALUE: usize = 4;

/// Bytes needed for `samples` periods of `total_channels` values
pub fn frame_len(total_channels: usize, samples: usize) -> usize {
    total_channels * samples * BYTES_PER_VALUE
}

/// Unpack a raw frame into a (total_channels × samples) matrix
pub fn decode_interleaved(
    bytes: &[u8],
    total_channels: usize,
    samples: usize,
) -> ProtocolResult<Array2<f64>> {
    let expected = frame_len(total_channels, samples);
    if bytes.len() != expected {
        return Err(ProtocolError::FrameSize {
            expected,
            actual: bytes.len(),
        });
    }

    let mut out = Array2::<f64>::zeros((total_channels, samples));
    for (i, chunk) in bytes.chunks_exact(BYTES_PER_VALUE).enumerate() {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        out[[i % total_channels, i / total_channels]] = f64::from(value);
    }
    Ok(out)
}

/// Pack a (channels × samples) matrix into the wire layout
pub fn encode_interleaved(samples: &Array2<f64>) -> Vec<u8> {
    let (channels, count) = samples.dim();
    let mut out = Vec::with_capacity(frame_len(channels, count));
    for sample in 0..count {
        for channel in 0..channels {
            out.extend_from_slice(&(samples[[channel, sample]] as f32).to_le_bytes());
        }
    }
    out
}
