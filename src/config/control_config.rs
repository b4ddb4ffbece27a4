// src/config/control_config.rs
//! Sequential controller and setpoint configuration

use crate::config::constants::control;
use crate::control::{ControlResult, SequentialController, SetpointConditioner};
use serde::{Deserialize, Serialize};

/// Co-contraction detection settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ControlConfig {
    #[serde(default = "defaults::hysteresis_threshold")]
    pub hysteresis_threshold: f64,

    /// Half-width of the dead zone around the threshold
    #[serde(default = "defaults::hysteresis_width")]
    pub hysteresis_width: f64,

    /// Row of the conditioned block used as the first antagonist (0-based)
    #[serde(default)]
    pub primary_channel: usize,

    /// Row of the conditioned block used as the second antagonist (0-based)
    #[serde(default = "defaults::secondary_channel")]
    pub secondary_channel: usize,
}

/// Actuator output shaping
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SetpointConfig {
    #[serde(default = "defaults::hand_gain")]
    pub hand_gain: f64,

    #[serde(default = "defaults::wrist_gain")]
    pub wrist_gain: f64,

    #[serde(default = "defaults::hand_deadband")]
    pub hand_deadband: f64,

    #[serde(default = "defaults::wrist_deadband")]
    pub wrist_deadband: f64,

    #[serde(default = "defaults::min_volts")]
    pub min_volts: f64,

    #[serde(default = "defaults::max_volts")]
    pub max_volts: f64,
}

mod defaults {
    use super::control;

    pub fn hysteresis_threshold() -> f64 { control::DEFAULT_HYSTERESIS_THRESHOLD }
    pub fn hysteresis_width() -> f64 { control::DEFAULT_HYSTERESIS_WIDTH }
    pub fn secondary_channel() -> usize { 1 }

    pub fn hand_gain() -> f64 { control::DEFAULT_HAND_GAIN }
    pub fn wrist_gain() -> f64 { control::DEFAULT_WRIST_GAIN }
    pub fn hand_deadband() -> f64 { control::DEFAULT_HAND_DEADBAND }
    pub fn wrist_deadband() -> f64 { control::DEFAULT_WRIST_DEADBAND }
    pub fn min_volts() -> f64 { control::SATURATION_MIN_VOLTS }
    pub fn max_volts() -> f64 { control::SATURATION_MAX_VOLTS }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            hysteresis_threshold: defaults::hysteresis_threshold(),
            hysteresis_width: defaults::hysteresis_width(),
            primary_channel: 0,
            secondary_channel: defaults::secondary_channel(),
        }
    }
}

impl Default for SetpointConfig {
    fn default() -> Self {
        Self {
            hand_gain: defaults::hand_gain(),
            wrist_gain: defaults::wrist_gain(),
            hand_deadband: defaults::hand_deadband(),
            wrist_deadband: defaults::wrist_deadband(),
            min_volts: defaults::min_volts(),
            max_volts: defaults::max_volts(),
        }
    }
}

impl ControlConfig {
    /// Fresh controller in hand mode
    pub fn controller(&self) -> ControlResult<SequentialController> {
        SequentialController::new(self.hysteresis_threshold, self.hysteresis_width)
    }
}

impl SetpointConfig {
    /// Output shaper for these settings
    pub fn conditioner(&self) -> ControlResult<SetpointConditioner> {
        SetpointConditioner::new(self.clone())
    }
}

/// Control and setpoint validation; `active_channels` is the conditioned row count
pub fn validate_control_config(
    control: &ControlConfig,
    setpoint: &SetpointConfig,
    active_channels: usize,
) -> Vec<String> {
    let mut errors = Vec::new();
    if let Err(e) = control.controller() {
        errors.push(e.to_string());
    }
    if control.primary_channel == control.secondary_channel {
        errors.push("Primary and secondary control channels must differ".to_string());
    }
    for (name, index) in [
        ("primary", control.primary_channel),
        ("secondary", control.secondary_channel),
    ] {
        if index >= active_channels {
            errors.push(format!(
                "{} control channel {} is outside the {} active channels",
                name, index, active_channels
            ));
        }
    }
    if let Err(e) = setpoint.conditioner() {
        errors.push(e.to_string());
    }
    for (name, gain) in [("hand", setpoint.hand_gain), ("wrist", setpoint.wrist_gain)] {
        if !gain.is_finite() {
            errors.push(format!("{} gain must be finite", name));
        }
    }
    errors
}
