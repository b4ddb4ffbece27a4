// src/hal/simulator.rs
//! Synthetic EMG block source
//!
//! Produces amplitude-modulated noise that resembles surface EMG from an
//! antagonist muscle pair. Patterns cover alternating flexor/extensor bursts
//! and periodic co-contractions so the whole control chain can be exercised
//! without a base station.

use crate::config::constants::signal;
use crate::hal::traits::BlockSource;
use crate::hal::types::{BlockFill, ChannelBlock, ProtocolResult, ReadOutcome};
use crate::utils::{StopSignal, SystemTimeProvider, TimeProvider};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Rejected simulator configurations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulatorError {
    /// No channels to generate
    #[error("simulator channel count must be greater than 0")]
    InvalidChannelCount,

    /// Sample rate zero, negative or not a number
    #[error("simulator sample rate must be greater than 0")]
    InvalidSampleRate,

    /// Burst or noise amplitude below zero
    #[error("simulator amplitudes must not be negative")]
    NegativeAmplitude,

    /// Pattern timings the generator cannot honour
    #[error("invalid activation pattern: {0}")]
    InvalidPattern(&'static str),
}

/// Muscle activation patterns
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationPattern {
    /// Baseline noise only
    Rest,
    /// Every channel active at a fixed amplitude
    Constant {
        /// Envelope amplitude in volts
        amplitude: f64,
    },
    /// First channel active for half the period, second for the other half
    Alternating {
        /// Full cycle length
        period_ms: u64,
    },
    /// Alternating bursts interrupted by co-contractions of both channels
    CoContraction {
        /// Time between co-contraction onsets
        interval_ms: u64,
        /// Length of each co-contraction
        duration_ms: u64,
        /// Alternation period between co-contractions
        period_ms: u64,
    },
}

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorConfig {
    /// Rows per block
    pub channel_count: usize,
    /// Rate of the generated columns
    pub sample_rate_hz: f64,
    /// Peak burst envelope in volts
    pub burst_amplitude: f64,
    /// Baseline noise amplitude in volts
    pub noise_level: f64,
    /// Which muscles are active over time
    pub pattern: ActivationPattern,
    /// Random generator seed; equal seeds give equal streams
    pub seed: u64,
    /// Sleep for the block duration on every read
    pub realtime: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            channel_count: 2,
            sample_rate_hz: signal::DEFAULT_SAMPLE_RATE_HZ,
            burst_amplitude: 0.5,
            noise_level: 0.002,
            pattern: ActivationPattern::CoContraction {
                interval_ms: 4000,
                duration_ms: 500,
                period_ms: 2000,
            },
            seed: 42,
            realtime: false,
        }
    }
}

impl SimulatorConfig {
    /// Reject configurations the generator cannot honour
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.channel_count == 0 {
            return Err(SimulatorError::InvalidChannelCount);
        }
        if !(self.sample_rate_hz > 0.0) {
            return Err(SimulatorError::InvalidSampleRate);
        }
        if self.noise_level < 0.0 || self.burst_amplitude < 0.0 {
            return Err(SimulatorError::NegativeAmplitude);
        }
        match self.pattern {
            ActivationPattern::Alternating { period_ms } if period_ms == 0 => Err(
                SimulatorError::InvalidPattern("alternation period must be greater than 0"),
            ),
            ActivationPattern::CoContraction {
                interval_ms,
                duration_ms,
                period_ms,
            } if interval_ms == 0 || period_ms == 0 || duration_ms > interval_ms => {
                Err(SimulatorError::InvalidPattern(
                    "co-contraction needs non-zero interval and period, and duration <= interval",
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Block source backed by a seeded random generator
pub struct SyntheticSource {
    config: SimulatorConfig,
    rng: StdRng,
    sample_index: u64,
    running: bool,
    stop: StopSignal,
    clock: Box<dyn TimeProvider>,
}

impl SyntheticSource {
    /// Build a source; fails if the configuration is invalid
    pub fn new(config: SimulatorConfig, stop: StopSignal) -> Result<Self, SimulatorError> {
        config.validate()?;
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            sample_index: 0,
            running: false,
            stop,
            clock: Box::new(SystemTimeProvider),
        })
    }

    /// Replace the clock used to timestamp blocks
    pub fn with_clock(mut self, clock: Box<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether `start` has been called without a matching `stop`
    pub fn is_running(&self) -> bool {
        self.running
    }

    fn envelope(&self, channel: usize, t_ms: u64) -> f64 {
        let amplitude = self.config.burst_amplitude;
        let alternating = |period_ms: u64| {
            let first_half = (t_ms % period_ms) < period_ms / 2;
            match (channel, first_half) {
                (0, true) | (1, false) => amplitude,
                _ => 0.0,
            }
        };
        match self.config.pattern {
            ActivationPattern::Rest => 0.0,
            ActivationPattern::Constant { amplitude } => amplitude,
            ActivationPattern::Alternating { period_ms } => alternating(period_ms),
            ActivationPattern::CoContraction {
                interval_ms,
                duration_ms,
                period_ms,
            } => {
                if t_ms % interval_ms >= interval_ms - duration_ms {
                    if channel < 2 {
                        amplitude
                    } else {
                        0.0
                    }
                } else {
                    alternating(period_ms)
                }
            }
        }
    }

    fn generate(&mut self, samples: usize) -> Array2<f64> {
        let mut out = Array2::zeros((self.config.channel_count, samples));
        let rate = self.config.sample_rate_hz;
        for s in 0..samples {
            let t_ms = ((self.sample_index + s as u64) as f64 * 1000.0 / rate) as u64;
            for c in 0..self.config.channel_count {
                let envelope = self.envelope(c, t_ms);
                let carrier: f64 = self.rng.gen_range(-1.0..=1.0);
                let noise: f64 = self.rng.gen_range(-1.0..=1.0);
                out[[c, s]] = envelope * carrier + self.config.noise_level * noise;
            }
        }
        self.sample_index += samples as u64;
        out
    }

    fn pace(&self, samples: usize) -> bool {
        let total = Duration::from_secs_f64(samples as f64 / self.config.sample_rate_hz);
        let step = Duration::from_millis(10);
        let mut slept = Duration::ZERO;
        while slept < total {
            if self.stop.is_stop_requested() {
                return false;
            }
            let chunk = step.min(total - slept);
            std::thread::sleep(chunk);
            slept += chunk;
        }
        true
    }
}

impl BlockSource for SyntheticSource {
    fn start(&mut self) -> ProtocolResult<()> {
        self.running = true;
        Ok(())
    }

    fn read_block(&mut self, samples_per_block: usize) -> ProtocolResult<ReadOutcome> {
        if self.stop.is_stop_requested() {
            return Ok(ReadOutcome::Cancelled);
        }
        if self.config.realtime && !self.pace(samples_per_block) {
            return Ok(ReadOutcome::Cancelled);
        }

        let samples = self.generate(samples_per_block);
        let block = ChannelBlock::new(samples, self.config.sample_rate_hz, self.clock.now_nanos());
        Ok(ReadOutcome::Block {
            block,
            fill: BlockFill::Complete,
        })
    }

    fn stop(&mut self) -> ProtocolResult<()> {
        self.running = false;
        Ok(())
    }

    fn channel_count(&self) -> usize {
        self.config.channel_count
    }

    fn sample_rate_hz(&self) -> f64 {
        self.config.sample_rate_hz
    }
}
