// src/pipeline/stages.rs
//! The two thread bodies of the pipeline
//!
//! [`AcquisitionLoop`] owns the block source and is the only writer of the
//! raw buffer. [`ProcessingLoop`] always works on the newest raw block,
//! skipping any it fell behind on, and publishes conditioned blocks,
//! setpoints and controller status.

use crate::acquisition::VersionedRingBuffer;
use crate::config::SystemConfig;
use crate::control::{
    ControlMode, ControlStatus, SequentialController, SetpointBlock, SetpointConditioner,
};
use crate::error::EmgResult;
use crate::hal::{BlockFill, BlockSource, ChannelBlock, ReadOutcome};
use crate::pipeline::PipelineContext;
use crate::processing::SignalConditioner;
use crate::utils::StopSignal;
use crossbeam::channel::{Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Notifications for diagnostics consumers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ControlEvent {
    /// The controller toggled between hand and wrist
    ModeSwitched {
        /// Mode before the toggle
        from: ControlMode,
        /// Mode after the toggle
        to: ControlMode,
        /// Raw buffer sequence of the block that caused the switch
        block_sequence: u64,
        /// Sample within the conditioned block
        sample_index: usize,
        /// Timestamp of the raw block
        timestamp_ns: u64,
    },
}

/// Counters from a finished acquisition thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Blocks written to the raw buffer
    pub blocks_published: u64,
    /// Published blocks that were completed with zeros after a timeout
    pub zero_padded_blocks: u64,
    /// Recoverable read failures, whether or not a retry succeeded
    pub transport_errors: u64,
}

/// Reads blocks from a source into the raw buffer until cancelled or failed
pub struct AcquisitionLoop<S: BlockSource> {
    source: S,
    raw: Arc<VersionedRingBuffer<ChannelBlock>>,
    stop: StopSignal,
    samples_per_block: usize,
    max_consecutive_errors: u32,
}

impl<S: BlockSource> AcquisitionLoop<S> {
    /// Bind a source to the context's raw buffer and stop signal
    pub fn new(
        source: S,
        context: &PipelineContext,
        samples_per_block: usize,
        max_consecutive_errors: u32,
    ) -> Self {
        Self {
            source,
            raw: Arc::clone(&context.raw),
            stop: context.stop.clone(),
            samples_per_block,
            max_consecutive_errors,
        }
    }

    /// Stream until the stop flag is raised or the source fails
    ///
    /// Timeouts publish zero-filled blocks. Transient transport errors are
    /// retried up to the configured number of consecutive failures. On exit
    /// the stop flag is raised so the other stages wind down too, and the
    /// source is told to stop streaming.
    pub fn run(mut self) -> EmgResult<AcquisitionReport> {
        info!(
            channels = self.source.channel_count(),
            sample_rate_hz = self.source.sample_rate_hz(),
            samples_per_block = self.samples_per_block,
            "acquisition started"
        );

        let mut report = AcquisitionReport::default();
        let result = self.stream(&mut report);

        self.stop.request_stop();
        if let Err(e) = self.source.stop() {
            debug!(error = %e, "stop command failed during shutdown");
        }

        match &result {
            Ok(()) => info!(
                blocks = report.blocks_published,
                zero_padded = report.zero_padded_blocks,
                "acquisition cancelled"
            ),
            Err(e) => error!(error = %e, blocks = report.blocks_published, "acquisition aborted"),
        }
        result.map(|()| report)
    }

    fn stream(&mut self, report: &mut AcquisitionReport) -> EmgResult<()> {
        self.source.start()?;

        let mut consecutive_errors = 0u32;
        loop {
            if self.stop.is_stop_requested() {
                return Ok(());
            }

            match self.source.read_block(self.samples_per_block) {
                Ok(ReadOutcome::Block { block, fill }) => {
                    consecutive_errors = 0;
                    if let BlockFill::ZeroPadded { received_bytes } = fill {
                        warn!(received_bytes, "data read timed out, publishing zero-filled block");
                        report.zero_padded_blocks += 1;
                    }
                    self.raw.push(block);
                    report.blocks_published += 1;
                }
                Ok(ReadOutcome::Cancelled) => return Ok(()),
                Err(e) if e.is_recoverable() => {
                    consecutive_errors += 1;
                    report.transport_errors += 1;
                    if consecutive_errors > self.max_consecutive_errors {
                        return Err(e.into());
                    }
                    warn!(error = %e, attempt = consecutive_errors, "transport error, retrying read");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Counters from a finished processing thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    /// Raw blocks conditioned and published downstream
    pub blocks_processed: u64,
    /// Raw blocks overwritten or superseded before they could be processed
    pub blocks_skipped: u64,
    /// Events not delivered because the queue was full
    pub events_dropped: u64,
}

/// Everything derived from one raw block
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutput {
    /// Conditioned channels at the target rate
    pub processed: ChannelBlock,
    /// Saturated actuator commands, one per conditioned sample
    pub setpoints: SetpointBlock,
    /// Controller state after the block
    pub status: ControlStatus,
}

/// Conditioning, control and setpoint shaping for the newest raw block
pub struct ProcessingLoop {
    conditioner: SignalConditioner,
    controller: SequentialController,
    setpoint: SetpointConditioner,
    primary_channel: usize,
    secondary_channel: usize,
    idle_wait: Duration,
    events: Option<Sender<ControlEvent>>,
    last_seen: u64,
    report: ProcessingReport,
}

impl ProcessingLoop {
    /// `channels` selects the primary and secondary inputs of the controller
    pub fn new(
        conditioner: SignalConditioner,
        controller: SequentialController,
        setpoint: SetpointConditioner,
        channels: (usize, usize),
        idle_wait: Duration,
    ) -> Self {
        Self {
            conditioner,
            controller,
            setpoint,
            primary_channel: channels.0,
            secondary_channel: channels.1,
            idle_wait,
            events: None,
            last_seen: 0,
            report: ProcessingReport::default(),
        }
    }

    /// Build every stage from a configuration
    pub fn from_config(config: &SystemConfig) -> EmgResult<Self> {
        Ok(Self::new(
            config.conditioner()?,
            config.controller()?,
            config.setpoint_conditioner()?,
            (config.control.primary_channel, config.control.secondary_channel),
            Duration::from_millis(config.pipeline.idle_wait_ms),
        ))
    }

    /// Publish mode switches on `events`
    pub fn with_events(mut self, events: Sender<ControlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one raw block through the whole chain
    ///
    /// `sequence` is the raw buffer sequence the block was published under;
    /// it only tags emitted events.
    pub fn process_block(&mut self, sequence: u64, raw: &ChannelBlock) -> EmgResult<BlockOutput> {
        let processed = self.conditioner.condition(raw)?;
        let signals =
            self.controller
                .process_block(&processed, self.primary_channel, self.secondary_channel)?;

        for switch in &signals.switches {
            self.emit(ControlEvent::ModeSwitched {
                from: switch.from,
                to: switch.to,
                block_sequence: sequence,
                sample_index: switch.sample_index,
                timestamp_ns: raw.timestamp_ns,
            });
        }

        let setpoints = SetpointBlock {
            setpoints: self.setpoint.condition(&signals),
            mode: self.controller.mode(),
            timestamp_ns: raw.timestamp_ns,
        };
        Ok(BlockOutput {
            processed,
            setpoints,
            status: self.controller.status(),
        })
    }

    /// Consume raw blocks until the stop flag is raised
    ///
    /// A processing failure raises the stop flag before returning so the
    /// acquisition thread does not keep streaming into nothing.
    pub fn run(mut self, context: &PipelineContext) -> EmgResult<ProcessingReport> {
        info!(
            factor = self.conditioner.factor(),
            target_rate_hz = self.conditioner.target_rate_hz(),
            "processing started"
        );

        while !context.stop.is_stop_requested() {
            let Some(latest) = context.raw.latest_or_wait_timeout(self.last_seen, self.idle_wait)
            else {
                continue;
            };

            let skipped = latest.sequence - self.last_seen - 1;
            if skipped > 0 {
                debug!(skipped, sequence = latest.sequence, "skipping stale raw blocks");
                self.report.blocks_skipped += skipped;
            }
            self.last_seen = latest.sequence;

            match self.process_block(latest.sequence, &latest.payload) {
                Ok(output) => {
                    context.processed.push(output.processed);
                    context.setpoints.push(output.setpoints);
                    context.status.push(output.status);
                    self.report.blocks_processed += 1;
                }
                Err(e) => {
                    error!(error = %e, sequence = latest.sequence, "processing failed");
                    context.stop.request_stop();
                    return Err(e);
                }
            }
        }

        info!(
            processed = self.report.blocks_processed,
            skipped = self.report.blocks_skipped,
            "processing stopped"
        );
        Ok(self.report)
    }

    /// Controller state
    pub fn status(&self) -> ControlStatus {
        self.controller.status()
    }

    fn emit(&mut self, event: ControlEvent) {
        let Some(sender) = &self.events else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                debug!("event queue full, dropping mode switch event");
                self.report.events_dropped += 1;
            }
            Err(TrySendError::Disconnected(_)) => {
                self.events = None;
            }
        }
    }
}
