// src/config/device_config.rs
//! Base station connection and acquisition configuration

use crate::config::constants::{device, signal};
use crate::hal::{ChannelSelection, ProtocolResult, TrignoSettings, Units};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trigno base station connection settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DeviceConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::command_port")]
    pub command_port: u16,

    #[serde(default = "defaults::data_port")]
    pub data_port: u16,

    /// Channels in every frame on the data socket
    #[serde(default = "defaults::total_channels")]
    pub total_channels: usize,

    /// Connect timeout and per-`recv` timeout
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub units: Units,

    /// 1-based channel numbers
    #[serde(default = "defaults::active_channels")]
    pub active_channels: Vec<usize>,

    /// 1-based inclusive range; takes precedence over `active_channels`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_range: Option<[usize; 2]>,

    #[serde(default = "defaults::raw_signal_gain")]
    pub raw_signal_gain: f64,
}

/// Sampling parameters of the acquisition thread
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AcquisitionConfig {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: f64,

    /// Columns per raw block
    #[serde(default = "defaults::samples_per_block")]
    pub samples_per_block: usize,
}

mod defaults {
    use super::*;

    pub fn host() -> String { device::DEFAULT_HOST.to_string() }
    pub fn command_port() -> u16 { device::COMMAND_PORT }
    pub fn data_port() -> u16 { device::EMG_DATA_PORT }
    pub fn total_channels() -> usize { device::TOTAL_CHANNELS }
    pub fn timeout_ms() -> u64 { device::DEFAULT_TIMEOUT_MS }
    pub fn active_channels() -> Vec<usize> { device::DEFAULT_ACTIVE_CHANNELS.to_vec() }
    pub fn raw_signal_gain() -> f64 { device::DEFAULT_RAW_SIGNAL_GAIN }

    pub fn sample_rate_hz() -> f64 { signal::DEFAULT_SAMPLE_RATE_HZ }
    pub fn samples_per_block() -> usize { signal::DEFAULT_SAMPLES_PER_BLOCK }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            command_port: defaults::command_port(),
            data_port: defaults::data_port(),
            total_channels: defaults::total_channels(),
            timeout_ms: defaults::timeout_ms(),
            units: Units::default(),
            active_channels: defaults::active_channels(),
            channel_range: None,
            raw_signal_gain: defaults::raw_signal_gain(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            samples_per_block: defaults::samples_per_block(),
        }
    }
}

impl DeviceConfig {
    /// Rows kept from each device frame
    pub fn selection(&self) -> ProtocolResult<ChannelSelection> {
        match self.channel_range {
            Some([low, high]) => ChannelSelection::from_range(low, high, self.total_channels),
            None => ChannelSelection::from_active(&self.active_channels, self.total_channels),
        }
    }

    /// Protocol client settings for a device sampling at `sample_rate_hz`
    pub fn trigno_settings(&self, sample_rate_hz: f64) -> ProtocolResult<TrignoSettings> {
        Ok(TrignoSettings {
            host: self.host.clone(),
            command_port: self.command_port,
            data_port: self.data_port,
            total_channels: self.total_channels,
            timeout: Duration::from_millis(self.timeout_ms),
            selection: self.selection()?,
            units: self.units,
            raw_signal_gain: self.raw_signal_gain,
            sample_rate_hz,
        })
    }
}

/// Device section validation
pub fn validate_device_config(config: &DeviceConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.host.trim().is_empty() {
        errors.push("Device host cannot be empty".to_string());
    }
    if config.command_port == 0 || config.data_port == 0 {
        errors.push("Device ports must be greater than 0".to_string());
    }
    if config.command_port == config.data_port {
        errors.push(format!(
            "Command and data ports must differ, both are {}",
            config.command_port
        ));
    }
    if config.total_channels == 0 {
        errors.push("Device total channel count must be greater than 0".to_string());
    }
    if config.timeout_ms == 0 || config.timeout_ms > device::MAX_TIMEOUT_MS {
        errors.push(format!(
            "Device timeout must be within 1..={} ms, got {}",
            device::MAX_TIMEOUT_MS,
            config.timeout_ms
        ));
    }
    match config.selection() {
        Ok(selection) if selection.is_empty() => {
            errors.push("At least one active channel is required".to_string())
        }
        Ok(_) => {}
        Err(e) => errors.push(format!("Invalid channel selection: {}", e)),
    }
    if !config.raw_signal_gain.is_finite() {
        errors.push("Raw signal gain must be finite".to_string());
    }
    errors
}

/// Acquisition section validation
pub fn validate_acquisition_config(config: &AcquisitionConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if !(config.sample_rate_hz.is_finite() && config.sample_rate_hz > 0.0) {
        errors.push(format!(
            "Sample rate must be greater than 0, got {}",
            config.sample_rate_hz
        ));
    }
    if config.samples_per_block == 0 {
        errors.push("Samples per block must be greater than 0".to_string());
    }
    errors
}
