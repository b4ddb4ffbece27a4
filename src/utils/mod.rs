//! Common utility functions shared by the acquisition and control stages
//!
//! - Wall-clock timestamps for published blocks
//! - A cooperative stop flag shared between pipeline threads

pub mod cancel;
pub mod time;

pub use cancel::StopSignal;
pub use time::{current_timestamp_nanos, MockTimeProvider, SystemTimeProvider, TimeProvider};
