// src/config/processing_config.rs
//! Signal conditioning configuration

use crate::config::constants::signal;
use crate::processing::{decimation_factor, FilterSpec, ProcessingResult, SignalConditioner};
use serde::{Deserialize, Serialize};

/// Rectify, decimate, gain and filter settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Control rate the raw stream is decimated to
    #[serde(default = "default_target_rate_hz")]
    pub target_rate_hz: f64,

    /// Gain applied after decimation
    #[serde(default = "default_rectified_signal_gain")]
    pub rectified_signal_gain: f64,

    /// Zero-phase Butterworth filter, designed at `target_rate_hz`
    #[serde(default)]
    pub filter: FilterSpec,
}

fn default_target_rate_hz() -> f64 {
    signal::DEFAULT_TARGET_RATE_HZ
}

fn default_rectified_signal_gain() -> f64 {
    signal::DEFAULT_RECTIFIED_SIGNAL_GAIN
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_rate_hz: default_target_rate_hz(),
            rectified_signal_gain: default_rectified_signal_gain(),
            filter: FilterSpec::default(),
        }
    }
}

impl ProcessingConfig {
    /// Build the conditioner for raw data at `sample_rate_hz`
    pub fn conditioner(&self, sample_rate_hz: f64) -> ProcessingResult<SignalConditioner> {
        SignalConditioner::new(
            sample_rate_hz,
            self.target_rate_hz,
            self.rectified_signal_gain,
            &self.filter,
        )
    }
}

/// Processing section validation against the device rate and block length
pub fn validate_processing_config(
    config: &ProcessingConfig,
    sample_rate_hz: f64,
    samples_per_block: usize,
) -> Vec<String> {
    let mut errors = Vec::new();
    if let Err(e) = decimation_factor(sample_rate_hz, config.target_rate_hz) {
        errors.push(e.to_string());
    }
    if let Err(e) = config.filter.validate(config.target_rate_hz) {
        errors.push(e.to_string());
    }
    if !config.rectified_signal_gain.is_finite() {
        errors.push("Rectified signal gain must be finite".to_string());
    }
    if errors.is_empty() {
        match config.conditioner(sample_rate_hz) {
            Ok(conditioner) if conditioner.min_input_len() > samples_per_block => {
                errors.push(format!(
                    "Blocks of {} samples are too short: decimation by {} and zero-phase filtering need at least {}",
                    samples_per_block,
                    conditioner.factor(),
                    conditioner.min_input_len()
                ));
            }
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::BandType;

    #[test]
    fn test_production_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.target_rate_hz, 33.3);
        assert_eq!(config.rectified_signal_gain, 120.0);
        assert_eq!(config.filter.band, BandType::Lowpass);
        assert!(validate_processing_config(&config, 2000.0, 2000).is_empty());
    }

    #[test]
    fn test_short_blocks_rejected() {
        let errors = validate_processing_config(&ProcessingConfig::default(), 2000.0, 500);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("too short"));
    }

    #[test]
    fn test_rate_and_filter_errors_collected() {
        let config = ProcessingConfig {
            target_rate_hz: 4000.0,
            filter: FilterSpec::bandpass(4, 10.0, 5.0),
            ..ProcessingConfig::default()
        };
        assert_eq!(validate_processing_config(&config, 2000.0, 2000).len(), 2);
    }
}
