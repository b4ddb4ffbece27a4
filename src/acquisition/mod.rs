// src/acquisition/mod.rs
//! Buffering between the acquisition thread and its consumers

pub mod ring_buffer;

pub use ring_buffer::*;
