// src/pipeline/context.rs
//! Buffers and the cancellation flag shared by every pipeline stage

use crate::acquisition::{BufferError, VersionedRingBuffer};
use crate::config::BuffersConfig;
use crate::control::{ControlStatus, SetpointBlock};
use crate::hal::ChannelBlock;
use crate::utils::StopSignal;
use std::sync::Arc;

/// Everything the stages exchange, owned by whoever starts the pipeline
///
/// Cloning is cheap and shares the same buffers.
#[derive(Clone)]
pub struct PipelineContext {
    /// Blocks exactly as the acquisition thread read them
    pub raw: Arc<VersionedRingBuffer<ChannelBlock>>,
    /// Conditioned blocks at the control rate
    pub processed: Arc<VersionedRingBuffer<ChannelBlock>>,
    /// Actuator commands
    pub setpoints: Arc<VersionedRingBuffer<SetpointBlock>>,
    /// Controller state after each processed block
    pub status: Arc<VersionedRingBuffer<ControlStatus>>,
    /// Cooperative shutdown flag
    pub stop: StopSignal,
}

impl PipelineContext {
    /// Allocate every buffer with the configured window sizes
    pub fn new(buffers: &BuffersConfig) -> Result<Self, BufferError> {
        Ok(Self {
            raw: Arc::new(VersionedRingBuffer::new(buffers.raw_window)?),
            processed: Arc::new(VersionedRingBuffer::new(buffers.processed_window)?),
            setpoints: Arc::new(VersionedRingBuffer::new(buffers.setpoint_window)?),
            status: Arc::new(VersionedRingBuffer::new(buffers.status_window)?),
            stop: StopSignal::new(),
        })
    }

    /// Most recent setpoint block, if any
    pub fn latest_setpoints(&self) -> Option<SetpointBlock> {
        self.setpoints.try_latest().map(|v| v.payload)
    }

    /// Most recent controller status, if any
    pub fn latest_status(&self) -> Option<ControlStatus> {
        self.status.try_latest().map(|v| v.payload)
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("raw_sequence", &self.raw.sequence())
            .field("processed_sequence", &self.processed.sequence())
            .field("setpoint_sequence", &self.setpoints.sequence())
            .field("stop_requested", &self.stop.is_stop_requested())
            .finish()
    }
}
