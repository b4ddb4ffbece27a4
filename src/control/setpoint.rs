// src/control/setpoint.rs
//! Gain, saturation and deadband applied to the differential drive signals

use super::{ControlError, ControlMode, ControlResult, DifferentialSignals};
use crate::config::SetpointConfig;
use serde::{Deserialize, Serialize};

/// Clamp `value` into `[min, max]`; a non-finite value commands 0 V
pub fn saturate(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// Zero out values whose magnitude is below `threshold`
pub fn deadband(value: f64, threshold: f64) -> f64 {
    if value.abs() < threshold {
        0.0
    } else {
        value
    }
}

/// Two-axis actuator command in volts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Setpoint {
    /// Hand actuator command
    pub hand_volts: f64,
    /// Wrist actuator command
    pub wrist_volts: f64,
}

/// Setpoints computed from one processed block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SetpointBlock {
    /// One setpoint per processed sample
    pub setpoints: Vec<Setpoint>,
    /// Controller mode after the last sample
    pub mode: ControlMode,
    /// Timestamp of the raw block these were derived from
    pub timestamp_ns: u64,
}

impl SetpointBlock {
    /// Setpoint for the most recent sample
    pub fn latest(&self) -> Option<Setpoint> {
        self.setpoints.last().copied()
    }
}

/// Per-axis gain, common saturation, per-axis deadband
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointConditioner {
    config: SetpointConfig,
}

impl SetpointConditioner {
    /// Fails when the saturation bounds are inverted or a deadband is negative
    pub fn new(config: SetpointConfig) -> ControlResult<Self> {
        if !(config.min_volts <= config.max_volts) {
            return Err(ControlError::InvalidSaturation {
                min: config.min_volts,
                max: config.max_volts,
            });
        }
        for (axis, value) in [("hand", config.hand_deadband), ("wrist", config.wrist_deadband)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ControlError::InvalidDeadband { axis, value });
            }
        }
        Ok(Self { config })
    }

    /// Shape one pair of differential samples
    pub fn condition_sample(&self, hand_diff: f64, wrist_diff: f64) -> Setpoint {
        let c = &self.config;
        let shape = |diff: f64, gain: f64, threshold: f64| {
            deadband(saturate(diff * gain, c.min_volts, c.max_volts), threshold)
        };
        Setpoint {
            hand_volts: shape(hand_diff, c.hand_gain, c.hand_deadband),
            wrist_volts: shape(wrist_diff, c.wrist_gain, c.wrist_deadband),
        }
    }

    /// Shape a whole block of differential signals
    pub fn condition(&self, signals: &DifferentialSignals) -> Vec<Setpoint> {
        signals
            .hand
            .iter()
            .zip(&signals.wrist)
            .map(|(&h, &w)| self.condition_sample(h, w))
            .collect()
    }

    /// Active configuration
    pub fn config(&self) -> &SetpointConfig {
        &self.config
    }
}
