// src/processing/filters/mod.rs
//! Butterworth IIR design and zero-phase filtering

pub mod butterworth;
pub mod zero_phase;

pub use butterworth::butterworth;
pub use zero_phase::{filtfilt, lfilter, lfilter_zi, ZeroPhaseFilter};

use crate::config::constants::filters::{
    DEFAULT_FILTER_ORDER, DEFAULT_HIGH_CUTOFF_HZ, MAX_FILTER_ORDER, MIN_FILTER_ORDER,
};
use crate::processing::{ProcessingError, ProcessingResult};
use serde::{Deserialize, Serialize};

/// Which part of the spectrum the filter passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandType {
    #[default]
    #[serde(alias = "low")]
    Lowpass,
    #[serde(alias = "high")]
    Highpass,
    #[serde(alias = "band")]
    Bandpass,
    #[serde(alias = "stop")]
    Bandstop,
}

/// Butterworth filter request in physical units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default = "default_order")]
    pub order: usize,

    /// Lower band edge; used by highpass, bandpass and bandstop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_cutoff_hz: Option<f64>,

    /// Upper band edge; used by lowpass, bandpass and bandstop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_cutoff_hz: Option<f64>,

    #[serde(default)]
    pub band: BandType,
}

fn default_order() -> usize {
    DEFAULT_FILTER_ORDER
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self::lowpass(DEFAULT_FILTER_ORDER, DEFAULT_HIGH_CUTOFF_HZ)
    }
}

impl FilterSpec {
    /// Low-pass with the given upper edge
    pub fn lowpass(order: usize, cutoff_hz: f64) -> Self {
        Self {
            order,
            low_cutoff_hz: None,
            high_cutoff_hz: Some(cutoff_hz),
            band: BandType::Lowpass,
        }
    }

    /// High-pass with the given lower edge
    pub fn highpass(order: usize, cutoff_hz: f64) -> Self {
        Self {
            order,
            low_cutoff_hz: Some(cutoff_hz),
            high_cutoff_hz: None,
            band: BandType::Highpass,
        }
    }

    /// Band-pass between `low_hz` and `high_hz`
    pub fn bandpass(order: usize, low_hz: f64, high_hz: f64) -> Self {
        Self {
            order,
            low_cutoff_hz: Some(low_hz),
            high_cutoff_hz: Some(high_hz),
            band: BandType::Bandpass,
        }
    }

    /// Band-stop between `low_hz` and `high_hz`
    pub fn bandstop(order: usize, low_hz: f64, high_hz: f64) -> Self {
        Self {
            band: BandType::Bandstop,
            ..Self::bandpass(order, low_hz, high_hz)
        }
    }

    /// Check order, band edges and their position relative to Nyquist
    pub fn validate(&self, sample_rate_hz: f64) -> ProcessingResult<()> {
        if !(MIN_FILTER_ORDER..=MAX_FILTER_ORDER).contains(&self.order) {
            return Err(ProcessingError::FilterConfig(format!(
                "order {} outside {}..={}",
                self.order, MIN_FILTER_ORDER, MAX_FILTER_ORDER
            )));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(ProcessingError::FilterConfig(format!(
                "sample rate {} Hz must be positive",
                sample_rate_hz
            )));
        }

        let (low, high) = (self.low_cutoff_hz, self.high_cutoff_hz);
        match (self.band, low, high) {
            (BandType::Lowpass, None, Some(_)) | (BandType::Highpass, Some(_), None) => {}
            (BandType::Bandpass | BandType::Bandstop, Some(l), Some(h)) => {
                if l >= h {
                    return Err(ProcessingError::FilterConfig(format!(
                        "low cutoff {} Hz must be below high cutoff {} Hz",
                        l, h
                    )));
                }
            }
            (BandType::Lowpass, ..) => {
                return Err(ProcessingError::FilterConfig(
                    "lowpass takes a high cutoff only".to_string(),
                ))
            }
            (BandType::Highpass, ..) => {
                return Err(ProcessingError::FilterConfig(
                    "highpass takes a low cutoff only".to_string(),
                ))
            }
            (BandType::Bandpass | BandType::Bandstop, ..) => {
                return Err(ProcessingError::FilterConfig(format!(
                    "{:?} needs both low and high cutoffs",
                    self.band
                )))
            }
        }

        let nyquist = sample_rate_hz / 2.0;
        for cutoff in low.into_iter().chain(high) {
            if !(cutoff.is_finite() && cutoff > 0.0 && cutoff < nyquist) {
                return Err(ProcessingError::FilterConfig(format!(
                    "cutoff {} Hz must lie strictly between 0 and Nyquist ({} Hz)",
                    cutoff, nyquist
                )));
            }
        }
        Ok(())
    }

    /// Band edges as fractions of Nyquist, low edge first
    pub fn normalized_edges(&self, sample_rate_hz: f64) -> Vec<f64> {
        let nyquist = sample_rate_hz / 2.0;
        self.low_cutoff_hz
            .into_iter()
            .chain(self.high_cutoff_hz)
            .map(|hz| hz / nyquist)
            .collect()
    }
}

/// Transfer function coefficients, `a[0]` normalised to 1
#[derive(Debug, Clone, PartialEq)]
pub struct IirCoefficients {
    /// Numerator
    pub b: Vec<f64>,
    /// Denominator
    pub a: Vec<f64>,
}

impl IirCoefficients {
    /// `max(len(a), len(b))`
    pub fn taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Gain at `z = e^{jω}` for ω = 0 (`nyquist == false`) or π
    pub fn gain_at_edge(&self, nyquist: bool) -> f64 {
        let eval = |coeffs: &[f64]| -> f64 {
            coeffs
                .iter()
                .enumerate()
                .map(|(i, c)| if nyquist && i % 2 == 1 { -c } else { *c })
                .sum()
        };
        eval(&self.b) / eval(&self.a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_aliases() {
        #[derive(Deserialize)]
        struct Wrapper {
            band: BandType,
        }
        for (text, band) in [
            ("low", BandType::Lowpass),
            ("high", BandType::Highpass),
            ("band", BandType::Bandpass),
            ("stop", BandType::Bandstop),
            ("bandstop", BandType::Bandstop),
        ] {
            let parsed: Wrapper = toml::from_str(&format!("band = \"{}\"", text)).unwrap();
            assert_eq!(parsed.band, band);
        }
    }

    #[test]
    fn test_default_is_production_lowpass() {
        let spec = FilterSpec::default();
        assert_eq!(spec.order, 4);
        assert_eq!(spec.high_cutoff_hz, Some(10.0));
        assert!(spec.low_cutoff_hz.is_none());
        assert!(spec.validate(33.3).is_ok());
    }

    #[test]
    fn test_cutoff_presence_rules() {
        let fs = 100.0;
        assert!(FilterSpec::highpass(2, 5.0).validate(fs).is_ok());
        assert!(FilterSpec::bandpass(2, 5.0, 20.0).validate(fs).is_ok());
        assert!(FilterSpec::bandstop(2, 5.0, 20.0).validate(fs).is_ok());

        let mut lowpass_with_low = FilterSpec::lowpass(2, 10.0);
        lowpass_with_low.low_cutoff_hz = Some(1.0);
        assert!(lowpass_with_low.validate(fs).is_err());

        let mut highpass_with_high = FilterSpec::highpass(2, 10.0);
        highpass_with_high.high_cutoff_hz = Some(20.0);
        assert!(highpass_with_high.validate(fs).is_err());

        let mut band_missing_high = FilterSpec::bandpass(2, 5.0, 20.0);
        band_missing_high.high_cutoff_hz = None;
        assert!(matches!(
            band_missing_high.validate(fs),
            Err(ProcessingError::FilterConfig(_))
        ));

        assert!(FilterSpec::bandstop(2, 20.0, 5.0).validate(fs).is_err());
    }

    #[test]
    fn test_cutoff_range_and_order() {
        assert!(FilterSpec::lowpass(4, 50.0).validate(100.0).is_err());
        assert!(FilterSpec::lowpass(4, 0.0).validate(100.0).is_err());
        assert!(FilterSpec::lowpass(0, 10.0).validate(100.0).is_err());
        assert!(FilterSpec::lowpass(9, 10.0).validate(100.0).is_err());
        assert!(FilterSpec::lowpass(8, 10.0).validate(100.0).is_ok());
    }

    #[test]
    fn test_optional_cutoffs_round_trip_through_toml() {
        let spec = FilterSpec::default();
        let text = toml::to_string(&spec).unwrap();
        assert!(!text.contains("low_cutoff_hz"));
        let back: FilterSpec = toml::from_str(&text).unwrap();
        assert_eq!(back, spec);
    }
}
