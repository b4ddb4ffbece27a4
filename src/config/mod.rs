// src/config/mod.rs
//! Configuration for the acquisition-and-control pipeline
//!
//! Every section deserializes with production defaults, so a configuration
//! file only needs to name what it changes. [`SystemConfig::validate`]
//! collects every problem before any thread starts.

pub mod constants;
pub mod control_config;
pub mod device_config;
pub mod loader;
pub mod processing_config;

pub use control_config::*;
pub use device_config::*;
pub use loader::{ConfigError, ConfigLoader};
pub use processing_config::*;

use crate::control::{ControlResult, SequentialController, SetpointConditioner};
use crate::hal::{ProtocolResult, TrignoSettings};
use crate::processing::{ProcessingResult, SignalConditioner};
use serde::{Deserialize, Serialize};

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub setpoint: SetpointConfig,
    #[serde(default)]
    pub buffers: BuffersConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Ring buffer window sizes, in blocks
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct BuffersConfig {
    #[serde(default = "defaults::raw_window")]
    pub raw_window: usize,
    #[serde(default = "defaults::processed_window")]
    pub processed_window: usize,
    #[serde(default = "defaults::setpoint_window")]
    pub setpoint_window: usize,
    #[serde(default = "defaults::status_window")]
    pub status_window: usize,
}

/// Thread orchestration settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Longest a processing thread waits for a raw block before rechecking the stop flag
    #[serde(default = "defaults::idle_wait_ms")]
    pub idle_wait_ms: u64,

    /// Consecutive transport errors tolerated before acquisition gives up
    #[serde(default = "defaults::max_consecutive_transport_errors")]
    pub max_consecutive_transport_errors: u32,

    /// Mode-switch events buffered for diagnostics consumers
    #[serde(default = "defaults::event_queue_capacity")]
    pub event_queue_capacity: usize,
}

mod defaults {
    use crate::config::constants::pipeline::*;

    pub fn raw_window() -> usize { DEFAULT_RAW_WINDOW }
    pub fn processed_window() -> usize { DEFAULT_PROCESSED_WINDOW }
    pub fn setpoint_window() -> usize { DEFAULT_SETPOINT_WINDOW }
    pub fn status_window() -> usize { DEFAULT_STATUS_WINDOW }

    pub fn idle_wait_ms() -> u64 { DEFAULT_IDLE_WAIT_MS }
    pub fn max_consecutive_transport_errors() -> u32 { DEFAULT_MAX_TRANSPORT_ERRORS }
    pub fn event_queue_capacity() -> usize { DEFAULT_EVENT_QUEUE_CAPACITY }
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self {
            raw_window: defaults::raw_window(),
            processed_window: defaults::processed_window(),
            setpoint_window: defaults::setpoint_window(),
            status_window: defaults::status_window(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            idle_wait_ms: defaults::idle_wait_ms(),
            max_consecutive_transport_errors: defaults::max_consecutive_transport_errors(),
            event_queue_capacity: defaults::event_queue_capacity(),
        }
    }
}

impl SystemConfig {
    /// Check every section and their cross-section constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = validate_device_config(&self.device);
        errors.extend(validate_acquisition_config(&self.acquisition));
        errors.extend(validate_processing_config(
            &self.processing,
            self.acquisition.sample_rate_hz,
            self.acquisition.samples_per_block,
        ));

        let active = self.device.selection().map(|s| s.len()).unwrap_or(0);
        errors.extend(validate_control_config(&self.control, &self.setpoint, active));

        for (name, size) in [
            ("raw_window", self.buffers.raw_window),
            ("processed_window", self.buffers.processed_window),
            ("setpoint_window", self.buffers.setpoint_window),
            ("status_window", self.buffers.status_window),
        ] {
            if size == 0 {
                errors.push(format!("Buffer {} must hold at least one block", name));
            }
        }
        if self.pipeline.idle_wait_ms == 0 {
            errors.push("Pipeline idle wait must be greater than 0".to_string());
        }
        if self.pipeline.event_queue_capacity == 0 {
            errors.push("Pipeline event queue capacity must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Protocol client settings
    pub fn trigno_settings(&self) -> ProtocolResult<TrignoSettings> {
        self.device.trigno_settings(self.acquisition.sample_rate_hz)
    }

    /// Conditioning chain for the configured rates
    pub fn conditioner(&self) -> ProcessingResult<SignalConditioner> {
        self.processing.conditioner(self.acquisition.sample_rate_hz)
    }

    /// Fresh sequential controller
    pub fn controller(&self) -> ControlResult<SequentialController> {
        self.control.controller()
    }

    /// Output shaper
    pub fn setpoint_conditioner(&self) -> ControlResult<SetpointConditioner> {
        self.setpoint.conditioner()
    }
}
