// tests/conditioning_properties.rs
//! Property tests for the conditioning primitives

use emg_myocontrol::processing::filters::{filtfilt, FilterSpec, ZeroPhaseFilter};
use emg_myocontrol::processing::{decimate, decimation_factor, rectify, remove_dc};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_decimation_length_and_means(
        signal in prop::collection::vec(-10.0f64..10.0, 0..500),
        factor in 1usize..40,
    ) {
        let out = decimate(&signal, factor);
        prop_assert_eq!(out.len(), signal.len() / factor);
        for (i, value) in out.iter().enumerate() {
            let group = &signal[i * factor..(i + 1) * factor];
            let mean = group.iter().sum::<f64>() / factor as f64;
            prop_assert!((value - mean).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_rectified_signal_is_non_negative(
        signal in prop::collection::vec(-1e3f64..1e3, 0..300)
    ) {
        let out = rectify(&signal);
        prop_assert_eq!(out.len(), signal.len());
        prop_assert!(out.iter().all(|v| *v >= 0.0));
        prop_assert_eq!(rectify(&out), out);
    }

    #[test]
    fn prop_dc_removed_signal_has_zero_mean(
        signal in prop::collection::vec(-100.0f64..100.0, 1..300)
    ) {
        let out = remove_dc(&signal);
        let mean = out.iter().sum::<f64>() / out.len() as f64;
        prop_assert!(mean.abs() < 1e-9);
    }

    #[test]
    fn prop_factor_never_exceeds_ratio(original in 1.0f64..10_000.0, divisor in 1.0f64..100.0) {
        let target = original / divisor;
        let factor = decimation_factor(original, target).unwrap();
        prop_assert!(factor >= 1);
        prop_assert!(factor as f64 <= original / target + 1e-9);
    }
}

#[test]
fn test_filter_rejects_signal_at_padlen() {
    let filter = ZeroPhaseFilter::design(&FilterSpec::lowpass(4, 10.0), 33.3).unwrap();
    assert_eq!(filter.padlen(), 15);
    assert!(filter.apply(&vec![1.0; 15]).is_err());
    assert!(filter.apply(&vec![1.0; 16]).is_ok());
}

#[test]
fn test_filtfilt_matches_filter_object() {
    let filter = ZeroPhaseFilter::design(&FilterSpec::bandpass(2, 1.0, 8.0), 33.3).unwrap();
    let signal: Vec<f64> = (0..64).map(|i| ((i as f64) * 0.7).sin() + 0.2).collect();

    let a = filter.apply(&signal).unwrap();
    let b = filtfilt(filter.coefficients(), &signal).unwrap();
    assert_eq!(a, b);
}
