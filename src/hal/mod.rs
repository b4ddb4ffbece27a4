// src/hal/mod.rs
//! Hardware Abstraction Layer for EMG block sources

pub mod frame;
pub mod traits;
pub mod trigno;
pub mod types;

#[cfg(feature = "simulation")]
pub mod simulator;

pub use traits::*;
pub use trigno::{ClientStats, CommandReply, RawFrame, TrignoClient, TrignoSettings};
pub use types::*;
