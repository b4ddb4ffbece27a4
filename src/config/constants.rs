// src/config/constants.rs
//! System-wide configuration constants

/// Trigno base station protocol constants
pub mod device {
    pub const DEFAULT_HOST: &str = "localhost";
    pub const COMMAND_PORT: u16 = 50040;
    pub const EMG_DATA_PORT: u16 = 50041;
    /// The data socket always carries this many channels
    pub const TOTAL_CHANNELS: usize = 16;
    pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
    pub const MAX_TIMEOUT_MS: u64 = 10_000;

    pub const COMMAND_TERMINATOR: &str = "\r\n\r\n";
    pub const ACK_TOKEN: &str = "OK";
    pub const RESPONSE_MAX_BYTES: usize = 128;
    pub const HANDSHAKE_MAX_BYTES: usize = 1024;

    pub const DEFAULT_ACTIVE_CHANNELS: [usize; 2] = [1, 2];
    pub const DEFAULT_RAW_SIGNAL_GAIN: f64 = 1.0;
}

/// Sampling constants
pub mod signal {
    pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 2000.0;
    pub const DEFAULT_SAMPLES_PER_BLOCK: usize = 2000;
    pub const DEFAULT_TARGET_RATE_HZ: f64 = 33.3;
    pub const DEFAULT_RECTIFIED_SIGNAL_GAIN: f64 = 120.0;
}

/// Butterworth filter constants
pub mod filters {
    pub const DEFAULT_FILTER_ORDER: usize = 4;
    pub const MIN_FILTER_ORDER: usize = 1;
    pub const MAX_FILTER_ORDER: usize = 8;
    pub const DEFAULT_HIGH_CUTOFF_HZ: f64 = 10.0;
    /// Padding applied by the zero-phase filter, in multiples of the tap count
    pub const PAD_TAPS_FACTOR: usize = 3;
}

/// Sequential controller and actuator output constants
pub mod control {
    pub const DEFAULT_HYSTERESIS_THRESHOLD: f64 = 3.0;
    pub const DEFAULT_HYSTERESIS_WIDTH: f64 = 1.0;
    pub const DEFAULT_HAND_GAIN: f64 = 1.3;
    pub const DEFAULT_WRIST_GAIN: f64 = 1.3;
    pub const DEFAULT_HAND_DEADBAND: f64 = 0.7;
    pub const DEFAULT_WRIST_DEADBAND: f64 = 0.7;
    pub const SATURATION_MIN_VOLTS: f64 = -5.0;
    pub const SATURATION_MAX_VOLTS: f64 = 5.0;
}

/// Ring buffer and thread orchestration constants
pub mod pipeline {
    pub const DEFAULT_RAW_WINDOW: usize = 4;
    pub const DEFAULT_PROCESSED_WINDOW: usize = 16;
    pub const DEFAULT_SETPOINT_WINDOW: usize = 16;
    pub const DEFAULT_STATUS_WINDOW: usize = 16;
    pub const DEFAULT_IDLE_WAIT_MS: u64 = 100;
    pub const DEFAULT_MAX_TRANSPORT_ERRORS: u32 = 5;
    pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 64;
}

/// Configuration file locations, lowest precedence first
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/emg-myocontrol/config.toml";
    pub const USER_CONFIG_DIR: &str = ".config/emg-myocontrol";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "emg-myocontrol.toml";
    pub const ENV_PREFIX: &str = "EMG_";
    /// Separates section from key in environment overrides
    pub const ENV_SEPARATOR: &str = "__";
}
