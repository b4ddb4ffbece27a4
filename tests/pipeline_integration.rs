// tests/pipeline_integration.rs
//! End-to-end runs of the acquisition and control chain

use emg_myocontrol::config::{SetpointConfig, SystemConfig};
use emg_myocontrol::control::{ControlMode, SequentialController, SetpointConditioner};
use emg_myocontrol::pipeline::{ControlEvent, Pipeline, PipelineContext};
use std::time::Duration;

#[test]
fn test_single_channel_activation_drives_hand() {
    let mut controller = SequentialController::new(3.0, 1.0).unwrap();
    let shaper = SetpointConditioner::new(SetpointConfig::default()).unwrap();

    let signals = controller.process(&[5.0; 10], &[0.0; 10]).unwrap();
    assert_eq!(signals.hand, vec![5.0; 10]);
    assert_eq!(signals.wrist, vec![0.0; 10]);
    assert_eq!(controller.mode(), ControlMode::Hand);

    for setpoint in shaper.condition(&signals) {
        assert_eq!(setpoint.hand_volts, 5.0);
        assert_eq!(setpoint.wrist_volts, 0.0);
    }
}

#[test]
fn test_cocontraction_moves_drive_to_wrist() {
    let mut controller = SequentialController::new(3.0, 1.0).unwrap();
    let shaper = SetpointConditioner::new(SetpointConfig::default()).unwrap();

    controller.process(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
    controller.process(&[0.0, 0.0], &[0.0, 0.0]).unwrap();
    let signals = controller.process(&[0.0; 4], &[2.0; 4]).unwrap();

    assert_eq!(controller.mode(), ControlMode::Wrist);
    let setpoints = shaper.condition(&signals);
    assert!(setpoints.iter().all(|s| s.hand_volts == 0.0));
    assert!(setpoints.iter().all(|s| (s.wrist_volts + 2.6).abs() < 1e-12));
}

#[cfg(feature = "simulation")]
#[test]
fn test_simulated_session_produces_bounded_exclusive_setpoints() {
    use emg_myocontrol::hal::simulator::{ActivationPattern, SimulatorConfig, SyntheticSource};

    let config = SystemConfig::default();
    let context = PipelineContext::new(&config.buffers).unwrap();
    let simulator = SimulatorConfig {
        pattern: ActivationPattern::CoContraction {
            interval_ms: 2000,
            duration_ms: 400,
            period_ms: 1000,
        },
        realtime: false,
        ..SimulatorConfig::default()
    };
    let source = SyntheticSource::new(simulator, context.stop.clone()).unwrap();

    let handle = Pipeline::start(&config, source, context).unwrap();

    let mut last_seen = 0;
    for _ in 0..3 {
        let block = handle
            .context()
            .setpoints
            .latest_or_wait_timeout(last_seen, Duration::from_secs(10))
            .expect("Failed to receive setpoints");
        last_seen = block.sequence;

        for setpoint in &block.payload.setpoints {
            assert!(setpoint.hand_volts.abs() <= 5.0);
            assert!(setpoint.wrist_volts.abs() <= 5.0);
            assert!(setpoint.hand_volts == 0.0 || setpoint.wrist_volts == 0.0);
        }
    }

    let context = handle.context().clone();
    let events_rx = handle.events().clone();

    handle.shutdown();
    let report = handle.join().unwrap();
    assert!(report.acquisition.blocks_published >= 3);
    assert!(report.processing.blocks_processed >= 3);

    let status = context.latest_status().expect("Failed to read status");
    let events: Vec<ControlEvent> = events_rx.try_iter().collect();
    assert_eq!(
        events.len() as u64 + report.processing.events_dropped,
        status.switch_count
    );
}

#[test]
fn test_shutdown_before_first_block() {
    use emg_myocontrol::hal::{BlockSource, ProtocolResult, ReadOutcome};

    struct Silent;

    impl BlockSource for Silent {
        fn start(&mut self) -> ProtocolResult<()> {
            Ok(())
        }
        fn read_block(&mut self, _samples: usize) -> ProtocolResult<ReadOutcome> {
            std::thread::sleep(Duration::from_millis(10));
            Ok(ReadOutcome::Cancelled)
        }
        fn stop(&mut self) -> ProtocolResult<()> {
            Ok(())
        }
        fn channel_count(&self) -> usize {
            2
        }
        fn sample_rate_hz(&self) -> f64 {
            2000.0
        }
    }

    let config = SystemConfig::default();
    let context = PipelineContext::new(&config.buffers).unwrap();
    let handle = Pipeline::start(&config, Silent, context).unwrap();
    let report = handle.join().unwrap();
    assert_eq!(report.acquisition.blocks_published, 0);
    assert_eq!(report.processing.blocks_processed, 0);
}
