// src/processing/conditioner.rs
//! Raw EMG to control-rate envelope
//!
//! Each channel goes through the same fixed chain: rectification,
//! block-average decimation, a constant gain, zero-phase Butterworth
//! filtering at the decimated rate, and DC removal. Channels are independent
//! and processed in parallel.

use crate::hal::ChannelBlock;
use crate::processing::filters::{FilterSpec, ZeroPhaseFilter};
use crate::processing::{ProcessingError, ProcessingResult};
use ndarray::Array2;
use rayon::prelude::*;

/// Elementwise absolute value
pub fn rectify(signal: &[f64]) -> Vec<f64> {
    signal.iter().map(|v| v.abs()).collect()
}

/// Integer decimation factor `floor(original / target)`
pub fn decimation_factor(original_hz: f64, target_hz: f64) -> ProcessingResult<usize> {
    let invalid = || ProcessingError::InvalidRate {
        original_hz,
        target_hz,
    };
    if !(original_hz.is_finite() && target_hz.is_finite() && original_hz > 0.0 && target_hz > 0.0)
    {
        return Err(invalid());
    }
    let factor = (original_hz / target_hz).floor();
    if factor < 1.0 {
        return Err(invalid());
    }
    Ok(factor as usize)
}

/// Average consecutive groups of `factor` samples; a partial tail group is dropped
pub fn decimate(signal: &[f64], factor: usize) -> Vec<f64> {
    if factor == 0 {
        return Vec::new();
    }
    signal
        .chunks_exact(factor)
        .map(|group| group.iter().sum::<f64>() / factor as f64)
        .collect()
}

/// Subtract the sample mean
pub fn remove_dc(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    signal.iter().map(|v| v - mean).collect()
}

/// Stateless per-channel conditioning chain
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    original_rate_hz: f64,
    target_rate_hz: f64,
    factor: usize,
    gain: f64,
    filter: ZeroPhaseFilter,
}

impl SignalConditioner {
    /// Validate the rates and design the filter at `target_rate_hz`
    pub fn new(
        original_rate_hz: f64,
        target_rate_hz: f64,
        gain: f64,
        filter: &FilterSpec,
    ) -> ProcessingResult<Self> {
        let factor = decimation_factor(original_rate_hz, target_rate_hz)?;
        let filter = ZeroPhaseFilter::design(filter, target_rate_hz)?;
        Ok(Self {
            original_rate_hz,
            target_rate_hz,
            factor,
            gain,
            filter,
        })
    }

    /// Decimation factor in use
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Rate of the input blocks
    pub fn original_rate_hz(&self) -> f64 {
        self.original_rate_hz
    }

    /// Rate of the conditioned output
    pub fn target_rate_hz(&self) -> f64 {
        self.target_rate_hz
    }

    /// Length of one conditioned channel for `input_len` raw samples
    pub fn output_len(&self, input_len: usize) -> usize {
        input_len / self.factor
    }

    /// Fewest raw samples that survive decimation with enough left to filter
    pub fn min_input_len(&self) -> usize {
        self.filter.min_len() * self.factor
    }

    /// Run the full chain over one channel
    pub fn condition_channel(&self, raw: &[f64]) -> ProcessingResult<Vec<f64>> {
        let rectified = rectify(raw);
        let mut decimated = decimate(&rectified, self.factor);
        decimated.iter_mut().for_each(|v| *v *= self.gain);
        let filtered = self.filter.apply(&decimated)?;
        Ok(remove_dc(&filtered))
    }

    /// Condition every channel of a block, preserving channel order
    pub fn condition(&self, block: &ChannelBlock) -> ProcessingResult<ChannelBlock> {
        let channels = block.channel_count();
        let rows: Vec<Vec<f64>> = (0..channels)
            .into_par_iter()
            .map(|c| {
                let row = block.samples.row(c);
                match row.as_slice() {
                    Some(slice) => self.condition_channel(slice),
                    None => self.condition_channel(&row.to_vec()),
                }
            })
            .collect::<ProcessingResult<_>>()?;

        let len = self.output_len(block.samples_per_channel());
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let samples = Array2::from_shape_vec((channels, len), flat)
            .map_err(|e| ProcessingError::Shape(e.to_string()))?;
        Ok(ChannelBlock::new(
            samples,
            self.target_rate_hz,
            block.timestamp_ns,
        ))
    }
}
