// src/control/sequential.rs
//! Co-contraction detection and the hand/wrist mode toggle

use super::{ControlError, ControlResult};
use crate::hal::ChannelBlock;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Threshold with a dead zone of `±width` around it
///
/// Below the zone the result is `false`, above it `true`, inside it the
/// previous state is returned unchanged.
pub fn hysteresis(signal: f64, previous: bool, threshold: f64, width: f64) -> bool {
    if signal < threshold - width {
        false
    } else if signal > threshold + width {
        true
    } else {
        previous
    }
}

/// Co-contraction flag with one step of memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoContractionState {
    /// Both channels are currently above threshold
    pub active: bool,
    /// Value of `active` before the most recent update
    pub previous_active: bool,
}

impl CoContractionState {
    /// Shift `active` into `previous_active` and store the new value
    pub fn update(&mut self, active: bool) {
        self.previous_active = self.active;
        self.active = active;
    }

    /// Co-contraction started on the most recent update
    pub fn rising_edge(&self) -> bool {
        !self.previous_active && self.active
    }
}

/// Which degree of freedom the differential signal drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    #[default]
    Hand,
    Wrist,
}

impl ControlMode {
    /// The other mode
    pub fn toggled(self) -> Self {
        match self {
            ControlMode::Hand => ControlMode::Wrist,
            ControlMode::Wrist => ControlMode::Hand,
        }
    }
}

/// A mode toggle and the sample that caused it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSwitch {
    /// Index within the processed block
    pub sample_index: usize,
    /// Mode before the toggle
    pub from: ControlMode,
    /// Mode after the toggle
    pub to: ControlMode,
}

/// Per-sample output of the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialSample {
    /// Hand drive, zero unless the mode is hand
    pub hand: f64,
    /// Wrist drive, zero unless the mode is wrist
    pub wrist: f64,
    /// Mode after this sample
    pub mode: ControlMode,
    /// Mode before this sample, if the sample toggled it
    pub switched_from: Option<ControlMode>,
}

/// Differential drive signals for one block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DifferentialSignals {
    /// Hand drive per sample
    pub hand: Vec<f64>,
    /// Wrist drive per sample
    pub wrist: Vec<f64>,
    /// Toggles that happened within the block, in order
    pub switches: Vec<ModeSwitch>,
}

impl DifferentialSignals {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.hand.len()
    }

    /// True for an empty block
    pub fn is_empty(&self) -> bool {
        self.hand.is_empty()
    }
}

/// Controller state snapshot for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlStatus {
    /// Current mode
    pub mode: ControlMode,
    /// Mode before the last sample was processed
    pub previous_mode: ControlMode,
    /// Co-contraction flag after the last sample
    pub cocontraction: CoContractionState,
    /// Samples fed through the controller since reset
    pub samples_processed: u64,
    /// Mode toggles since reset
    pub switch_count: u64,
}

/// Two-state hand/wrist machine driven by co-contraction
///
/// State carries across blocks: a co-contraction that spans a block
/// boundary toggles the mode once.
#[derive(Debug, Clone)]
pub struct SequentialController {
    threshold: f64,
    width: f64,
    cocontraction: CoContractionState,
    mode: ControlMode,
    previous_mode: ControlMode,
    samples_processed: u64,
    switch_count: u64,
}

impl SequentialController {
    /// Start in hand mode with no co-contraction
    pub fn new(threshold: f64, width: f64) -> ControlResult<Self> {
        if !(threshold.is_finite() && width.is_finite() && width >= 0.0) {
            return Err(ControlError::InvalidHysteresis { threshold, width });
        }
        Ok(Self {
            threshold,
            width,
            cocontraction: CoContractionState::default(),
            mode: ControlMode::default(),
            previous_mode: ControlMode::default(),
            samples_processed: 0,
            switch_count: 0,
        })
    }

    /// Advance by one sample of the antagonist pair
    pub fn step(&mut self, primary: f64, secondary: f64) -> DifferentialSample {
        // Both channels are judged against the shared co-contraction state
        let previous = self.cocontraction.active;
        let primary_high = hysteresis(primary, previous, self.threshold, self.width);
        let secondary_high = hysteresis(secondary, previous, self.threshold, self.width);
        self.cocontraction.update(primary_high && secondary_high);

        self.previous_mode = self.mode;
        let mut switched_from = None;
        if self.cocontraction.rising_edge() {
            switched_from = Some(self.mode);
            self.mode = self.mode.toggled();
            self.switch_count += 1;
        }
        self.samples_processed += 1;

        let diff = primary - secondary;
        let (hand, wrist) = match self.mode {
            ControlMode::Hand => (diff, 0.0),
            ControlMode::Wrist => (0.0, diff),
        };
        DifferentialSample {
            hand,
            wrist,
            mode: self.mode,
            switched_from,
        }
    }

    /// Run every sample of two equally long channels
    pub fn process(&mut self, primary: &[f64], secondary: &[f64]) -> ControlResult<DifferentialSignals> {
        if primary.len() != secondary.len() {
            return Err(ControlError::LengthMismatch {
                primary: primary.len(),
                secondary: secondary.len(),
            });
        }

        let mut out = DifferentialSignals {
            hand: Vec::with_capacity(primary.len()),
            wrist: Vec::with_capacity(primary.len()),
            switches: Vec::new(),
        };
        for (i, (&p, &s)) in primary.iter().zip(secondary).enumerate() {
            let sample = self.step(p, s);
            out.hand.push(sample.hand);
            out.wrist.push(sample.wrist);
            if let Some(from) = sample.switched_from {
                info!(from = ?from, to = ?sample.mode, sample = i, "control mode switched");
                out.switches.push(ModeSwitch {
                    sample_index: i,
                    from,
                    to: sample.mode,
                });
            }
        }
        Ok(out)
    }

    /// Run the rows `primary` and `secondary` of a conditioned block
    pub fn process_block(
        &mut self,
        block: &ChannelBlock,
        primary: usize,
        secondary: usize,
    ) -> ControlResult<DifferentialSignals> {
        let available = block.channel_count();
        let row = |index: usize| {
            block
                .channel(index)
                .map(|view| view.to_vec())
                .ok_or(ControlError::ChannelOutOfRange { index, available })
        };
        let (p, s) = (row(primary)?, row(secondary)?);
        self.process(&p, &s)
    }

    /// Current mode
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Diagnostics snapshot
    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            mode: self.mode,
            previous_mode: self.previous_mode,
            cocontraction: self.cocontraction,
            samples_processed: self.samples_processed,
            switch_count: self.switch_count,
        }
    }

    /// Back to hand mode with no co-contraction
    pub fn reset(&mut self) {
        self.cocontraction = CoContractionState::default();
        self.mode = ControlMode::default();
        self.previous_mode = ControlMode::default();
        self.samples_processed = 0;
        self.switch_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    fn controller() -> SequentialController {
        SequentialController::new(3.0, 1.0).unwrap()
    }

    #[test]
    fn test_hysteresis_boundaries() {
        let eps = 1e-9;
        assert!(!hysteresis(2.0 - eps, true, 3.0, 1.0));
        assert!(hysteresis(4.0 + eps, false, 3.0, 1.0));
        assert!(hysteresis(3.0, true, 3.0, 1.0));
        assert!(!hysteresis(3.0, false, 3.0, 1.0));
        // Edges of the zone are inside it
        assert!(hysteresis(2.0, true, 3.0, 1.0));
        assert!(!hysteresis(4.0, false, 3.0, 1.0));
    }

    #[test]
    fn test_invalid_hysteresis_rejected() {
        assert!(SequentialController::new(3.0, -1.0).is_err());
        assert!(SequentialController::new(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_single_channel_high_keeps_hand_mode() {
        let mut controller = controller();
        let out = controller.process(&[5.0; 10], &[0.0; 10]).unwrap();
        assert_eq!(out.hand, vec![5.0; 10]);
        assert_eq!(out.wrist, vec![0.0; 10]);
        assert!(out.switches.is_empty());
        assert_eq!(controller.mode(), ControlMode::Hand);
    }

    #[test]
    fn test_sustained_cocontraction_toggles_once() {
        let mut controller = controller();
        let primary = [0.0, 5.0, 5.0, 5.0, 5.0, 6.0];
        let secondary = [0.0, 5.0, 5.0, 5.0, 5.0, 5.0];
        let out = controller.process(&primary, &secondary).unwrap();

        assert_eq!(
            out.switches,
            vec![ModeSwitch {
                sample_index: 1,
                from: ControlMode::Hand,
                to: ControlMode::Wrist
            }]
        );
        assert_eq!(out.hand[0], 0.0);
        assert_eq!(out.wrist[5], 1.0);
        assert_eq!(out.hand[5], 0.0);
    }

    #[test]
    fn test_release_and_second_cocontraction_toggles_back() {
        let mut controller = controller();
        let burst = [5.0, 5.0, 0.0, 0.0, 5.0, 5.0];
        let out = controller.process(&burst, &burst).unwrap();
        assert_eq!(out.switches.len(), 2);
        assert_eq!(controller.mode(), ControlMode::Hand);
        assert_eq!(controller.status().switch_count, 2);
    }

    #[test]
    fn test_dead_zone_holds_cocontraction() {
        let mut controller = controller();
        // Enter co-contraction, then hover inside the zone: no new edge
        let primary = [5.0, 3.0, 2.5, 5.0];
        let out = controller.process(&primary, &primary).unwrap();
        assert_eq!(out.switches.len(), 1);
        assert!(controller.status().cocontraction.active);
    }

    #[test]
    fn test_state_carries_across_blocks() {
        let mut controller = controller();
        controller.process(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
        let out = controller.process(&[5.0, 5.0], &[5.0, 5.0]).unwrap();
        assert!(out.switches.is_empty());
        assert_eq!(controller.mode(), ControlMode::Wrist);
        assert_eq!(controller.status().samples_processed, 4);
    }

    #[test]
    fn test_block_rows_are_selected() {
        let mut controller = controller();
        let block = ChannelBlock::new(array![[9.0, 9.0], [1.0, 2.0], [0.5, 0.5]], 33.3, 0);
        let out = controller.process_block(&block, 1, 2).unwrap();
        assert_eq!(out.hand, vec![0.5, 1.5]);
        assert!(matches!(
            controller.process_block(&block, 0, 3),
            Err(ControlError::ChannelOutOfRange { index: 3, available: 3 })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(controller().process(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_reset() {
        let mut controller = controller();
        controller.process(&[5.0], &[5.0]).unwrap();
        controller.reset();
        assert_eq!(controller.mode(), ControlMode::Hand);
        assert_eq!(controller.status().cocontraction, CoContractionState::default());
    }

    proptest! {
        #[test]
        fn prop_hysteresis_dead_zone_returns_previous(
            threshold in -10.0f64..10.0,
            width in 0.01f64..5.0,
            frac in 0.001f64..0.999,
            previous in any::<bool>(),
        ) {
            let signal = threshold - width + 2.0 * width * frac;
            prop_assert_eq!(hysteresis(signal, previous, threshold, width), previous);
        }

        #[test]
        fn prop_outputs_are_mutually_exclusive(
            samples in prop::collection::vec((0.0f64..8.0, 0.0f64..8.0), 1..200)
        ) {
            let mut controller = controller();
            let (primary, secondary): (Vec<f64>, Vec<f64>) = samples.into_iter().unzip();
            let out = controller.process(&primary, &secondary).unwrap();
            for (h, w) in out.hand.iter().zip(&out.wrist) {
                prop_assert!(*h == 0.0 || *w == 0.0);
            }
        }

        #[test]
        fn prop_sustained_high_toggles_exactly_once(n in 2usize..100) {
            let mut controller = controller();
            let high = vec![6.0; n];
            let out = controller.process(&high, &high).unwrap();
            prop_assert_eq!(out.switches.len(), 1);
        }
    }
}
