//! EMG-Myocontrol: real-time EMG acquisition and sequential prosthesis control
//!
//! This library turns a multi-channel EMG stream into hand and wrist
//! actuator setpoints. It features:
//!
//! - A client for the Delsys Trigno command/data TCP protocol
//! - Versioned ring buffers decoupling acquisition from processing
//! - Rectification, decimation and zero-phase Butterworth conditioning
//! - A co-contraction driven hand/wrist state machine with hysteresis
//! - Layered TOML configuration with environment overrides and hot reload
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_myocontrol::config::ConfigLoader;
//! use emg_myocontrol::pipeline::Pipeline;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load_system_config()?;
//!     let handle = Pipeline::start_trigno(&config)?;
//!
//!     while let Ok(event) = handle.events().recv() {
//!         println!("{:?}", event);
//!         if let Some(block) = handle.context().latest_setpoints() {
//!             println!("setpoint: {:?}", block.latest());
//!         }
//!     }
//!
//!     handle.shutdown();
//!     let report = handle.join()?;
//!     println!("{:?}", report);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod control;
pub mod error;
pub mod hal;
pub mod pipeline;
pub mod processing;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{VersionedBlock, VersionedRingBuffer};
pub use config::{ConfigLoader, SystemConfig};
pub use control::{ControlMode, SequentialController, Setpoint, SetpointConditioner};
pub use error::{EmgError, EmgResult, Severity};
pub use hal::{BlockSource, ChannelBlock, ProtocolError, TrignoClient, TrignoSettings};
pub use pipeline::{ControlEvent, Pipeline, PipelineContext, PipelineHandle};
pub use processing::{FilterSpec, SignalConditioner};
pub use utils::{current_timestamp_nanos, StopSignal, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Real-time EMG acquisition and sequential prosthesis control".to_string(),
        features: vec![
            "Trigno protocol client".to_string(),
            "Versioned ring buffers".to_string(),
            "Zero-phase signal conditioning".to_string(),
            "Sequential hand/wrist control".to_string(),
            "Layered configuration with hot reload".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
