// src/pipeline/mod.rs
//! Thread orchestration for acquisition and processing
//!
//! [`Pipeline::start`] validates the configuration, builds every stage and
//! spawns one acquisition thread and one processing thread around a shared
//! [`PipelineContext`]. The returned [`PipelineHandle`] is the only way to
//! stop them.

pub mod context;
pub mod stages;

pub use context::PipelineContext;
pub use stages::*;

use crate::config::SystemConfig;
use crate::control::ControlError;
use crate::error::{EmgError, EmgResult};
use crate::hal::{BlockSource, TrignoClient};
use crossbeam::channel::{bounded, Receiver};
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Outcome of both threads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Counters of the acquisition thread
    pub acquisition: AcquisitionReport,
    /// Counters of the processing thread
    pub processing: ProcessingReport,
}

/// Entry point for running the pipeline
pub struct Pipeline;

impl Pipeline {
    /// Spawn both stages over `source`
    ///
    /// Configuration problems are reported before any thread starts.
    pub fn start<S>(config: &SystemConfig, source: S, context: PipelineContext) -> EmgResult<PipelineHandle>
    where
        S: BlockSource + 'static,
    {
        config.validate()?;

        let available = source.channel_count();
        for index in [config.control.primary_channel, config.control.secondary_channel] {
            if index >= available {
                return Err(ControlError::ChannelOutOfRange { index, available }.into());
            }
        }
        if source.sample_rate_hz() != config.acquisition.sample_rate_hz {
            warn!(
                source_hz = source.sample_rate_hz(),
                configured_hz = config.acquisition.sample_rate_hz,
                "source rate differs from configured rate, conditioning uses the configured rate"
            );
        }

        let (events_tx, events_rx) = bounded(config.pipeline.event_queue_capacity);
        let processing = ProcessingLoop::from_config(config)?.with_events(events_tx);
        let acquisition = AcquisitionLoop::new(
            source,
            &context,
            config.acquisition.samples_per_block,
            config.pipeline.max_consecutive_transport_errors,
        );

        let processing_thread = {
            let context = context.clone();
            spawn("processing", move || processing.run(&context))?
        };
        let acquisition_thread = match spawn("acquisition", move || acquisition.run()) {
            Ok(handle) => handle,
            Err(e) => {
                context.stop.request_stop();
                let _ = processing_thread.join();
                return Err(e);
            }
        };

        info!("pipeline started");
        Ok(PipelineHandle {
            context,
            acquisition: acquisition_thread,
            processing: processing_thread,
            events: events_rx,
        })
    }

    /// Connect to the base station named in `config` and start streaming from it
    pub fn start_trigno(config: &SystemConfig) -> EmgResult<PipelineHandle> {
        config.validate()?;
        let context = PipelineContext::new(&config.buffers)?;
        let client = TrignoClient::connect(config.trigno_settings()?, context.stop.clone())?;
        Self::start(config, client, context)
    }
}

fn spawn<T, F>(name: &'static str, body: F) -> EmgResult<JoinHandle<EmgResult<T>>>
where
    T: Send + 'static,
    F: FnOnce() -> EmgResult<T> + Send + 'static,
{
    thread::Builder::new()
        .name(format!("emg-{}", name))
        .spawn(body)
        .map_err(|source| EmgError::ThreadSpawn { name, source })
}

/// Running pipeline
pub struct PipelineHandle {
    context: PipelineContext,
    acquisition: JoinHandle<EmgResult<AcquisitionReport>>,
    processing: JoinHandle<EmgResult<ProcessingReport>>,
    events: Receiver<ControlEvent>,
}

impl PipelineHandle {
    /// Ask both threads to finish
    ///
    /// The acquisition thread notices within one read timeout.
    pub fn shutdown(&self) {
        info!("pipeline shutdown requested");
        self.context.stop.request_stop();
    }

    /// True while either thread is still running
    pub fn is_running(&self) -> bool {
        !self.acquisition.is_finished() || !self.processing.is_finished()
    }

    /// Wait for both threads
    ///
    /// An acquisition failure is reported in preference to a processing one.
    pub fn join(self) -> EmgResult<PipelineReport> {
        let acquisition = self
            .acquisition
            .join()
            .map_err(|_| EmgError::ThreadPanicked("acquisition"));
        // Processing only exits on the stop flag, which acquisition raises on exit
        self.context.stop.request_stop();
        let processing = self
            .processing
            .join()
            .map_err(|_| EmgError::ThreadPanicked("processing"));

        let acquisition = acquisition??;
        let processing = processing??;
        Ok(PipelineReport {
            acquisition,
            processing,
        })
    }

    /// Mode-switch notifications
    pub fn events(&self) -> &Receiver<ControlEvent> {
        &self.events
    }

    /// Buffers shared with the running threads
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }
}
