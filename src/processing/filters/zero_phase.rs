// src/processing/filters/zero_phase.rs
//! Direct-form II transposed filtering and forward-backward application

use super::{butterworth, FilterSpec, IirCoefficients};
use crate::config::constants::filters::PAD_TAPS_FACTOR;
use crate::processing::{ProcessingError, ProcessingResult};

/// Pad `b` and `a` to equal length and normalise by `a[0]`
fn normalized(coeffs: &IirCoefficients) -> ProcessingResult<(Vec<f64>, Vec<f64>)> {
    let a0 = coeffs.a.first().copied().unwrap_or(0.0);
    if a0 == 0.0 || coeffs.b.is_empty() {
        return Err(ProcessingError::FilterConfig(
            "denominator must start with a non-zero coefficient".to_string(),
        ));
    }
    let n = coeffs.taps();
    let mut b: Vec<f64> = coeffs.b.iter().map(|v| v / a0).collect();
    let mut a: Vec<f64> = coeffs.a.iter().map(|v| v / a0).collect();
    b.resize(n, 0.0);
    a.resize(n, 0.0);
    Ok((b, a))
}

/// Filter `x`, starting from delay state `zi` (zeros when `None`)
///
/// Returns the output and the final delay state.
pub fn lfilter(
    coeffs: &IirCoefficients,
    x: &[f64],
    zi: Option<&[f64]>,
) -> ProcessingResult<(Vec<f64>, Vec<f64>)> {
    let (b, a) = normalized(coeffs)?;
    let n = b.len();
    let mut z = match zi {
        Some(zi) if zi.len() == n - 1 => zi.to_vec(),
        Some(zi) => {
            return Err(ProcessingError::FilterConfig(format!(
                "initial state has {} values, filter needs {}",
                zi.len(),
                n - 1
            )))
        }
        None => vec![0.0; n - 1],
    };

    let mut y = Vec::with_capacity(x.len());
    for &xi in x {
        let yi = b[0] * xi + z.first().copied().unwrap_or(0.0);
        for j in 0..n.saturating_sub(2) {
            z[j] = b[j + 1] * xi + z[j + 1] - a[j + 1] * yi;
        }
        if n > 1 {
            z[n - 2] = b[n - 1] * xi - a[n - 1] * yi;
        }
        y.push(yi);
    }
    Ok((y, z))
}

/// Delay state for which a unit step input produces a unit step output
///
/// Solves `(I - Aᵀ) zi = b[1:] - a[1:] b[0]` where `A` is the companion
/// matrix of `a`.
pub fn lfilter_zi(coeffs: &IirCoefficients) -> ProcessingResult<Vec<f64>> {
    let (b, a) = normalized(coeffs)?;
    let m = b.len() - 1;
    if m == 0 {
        return Ok(Vec::new());
    }

    let mut matrix = vec![vec![0.0; m]; m];
    for i in 0..m {
        matrix[i][i] = 1.0;
        matrix[i][0] += a[i + 1];
        if i + 1 < m {
            matrix[i][i + 1] -= 1.0;
        }
    }
    let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();
    solve(matrix, rhs)
}

/// Gaussian elimination with partial pivoting
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> ProcessingResult<Vec<f64>> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| matrix[i][col].abs().total_cmp(&matrix[j][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < f64::EPSILON {
            return Err(ProcessingError::FilterConfig(
                "filter has a pole at z = 1, no steady state exists".to_string(),
            ));
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..m {
            let factor = matrix[row][col] / matrix[col][col];
            if factor != 0.0 {
                for k in col..m {
                    matrix[row][k] -= factor * matrix[col][k];
                }
                rhs[row] -= factor * rhs[col];
            }
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let tail: f64 = (row + 1..m).map(|k| matrix[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Ok(x)
}

/// Precomputed forward-backward filter
///
/// Edges are handled by odd reflection of `3 × taps` samples on each side,
/// and each pass starts from the steady-state delay line scaled to its first
/// input so a constant signal passes through without transients.
#[derive(Debug, Clone)]
pub struct ZeroPhaseFilter {
    coeffs: IirCoefficients,
    zi: Vec<f64>,
    padlen: usize,
}

impl ZeroPhaseFilter {
    /// Wrap existing coefficients
    pub fn from_coefficients(coeffs: IirCoefficients) -> ProcessingResult<Self> {
        let zi = lfilter_zi(&coeffs)?;
        let padlen = PAD_TAPS_FACTOR * coeffs.taps();
        Ok(Self { coeffs, zi, padlen })
    }

    /// Design a Butterworth filter for data at `sample_rate_hz`
    pub fn design(spec: &FilterSpec, sample_rate_hz: f64) -> ProcessingResult<Self> {
        Self::from_coefficients(butterworth(spec, sample_rate_hz)?)
    }

    /// Samples reflected onto each edge
    pub fn padlen(&self) -> usize {
        self.padlen
    }

    /// Shortest signal this filter accepts
    pub fn min_len(&self) -> usize {
        self.padlen + 1
    }

    /// The designed coefficients
    pub fn coefficients(&self) -> &IirCoefficients {
        &self.coeffs
    }

    /// Filter forward then backward; output has no phase delay
    pub fn apply(&self, x: &[f64]) -> ProcessingResult<Vec<f64>> {
        let edge = self.padlen;
        if x.len() <= edge {
            return Err(ProcessingError::SignalTooShort {
                len: x.len(),
                padlen: edge,
            });
        }

        let len = x.len();
        let (first, last) = (x[0], x[len - 1]);
        let mut ext = Vec::with_capacity(len + 2 * edge);
        ext.extend((1..=edge).rev().map(|i| 2.0 * first - x[i]));
        ext.extend_from_slice(x);
        ext.extend((1..=edge).map(|i| 2.0 * last - x[len - 1 - i]));

        let scaled = |start: f64| -> Vec<f64> { self.zi.iter().map(|z| z * start).collect() };

        let (forward, _) = lfilter(&self.coeffs, &ext, Some(&scaled(ext[0])))?;
        let mut reversed: Vec<f64> = forward.into_iter().rev().collect();
        let start = reversed[0];
        let (backward, _) = lfilter(&self.coeffs, &reversed, Some(&scaled(start)))?;
        reversed = backward;
        reversed.reverse();

        Ok(reversed[edge..edge + len].to_vec())
    }
}

/// One-shot forward-backward filtering
pub fn filtfilt(coeffs: &IirCoefficients, x: &[f64]) -> ProcessingResult<Vec<f64>> {
    ZeroPhaseFilter::from_coefficients(coeffs.clone())?.apply(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn half_band_first_order() -> IirCoefficients {
        IirCoefficients {
            b: vec![0.5, 0.5],
            a: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_lfilter_impulse_response() {
        let (y, zf) = lfilter(&half_band_first_order(), &[1.0, 0.0, 0.0, 0.0], None).unwrap();
        assert_eq!(y, vec![0.5, 0.5, 0.0, 0.0]);
        assert_eq!(zf, vec![0.0]);
    }

    #[test]
    fn test_lfilter_normalises_by_a0() {
        let coeffs = IirCoefficients {
            b: vec![2.0],
            a: vec![2.0, -1.0],
        };
        let (y, _) = lfilter(&coeffs, &[1.0, 0.0, 0.0], None).unwrap();
        assert_eq!(y, vec![1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_lfilter_rejects_wrong_state_length() {
        assert!(lfilter(&half_band_first_order(), &[1.0], Some(&[0.0, 0.0])).is_err());
    }

    #[test]
    fn test_zi_gives_step_steady_state() {
        let coeffs = butterworth(&FilterSpec::lowpass(4, 10.0), 100.0).unwrap();
        let zi = lfilter_zi(&coeffs).unwrap();
        let (y, _) = lfilter(&coeffs, &[1.0; 50], Some(&zi)).unwrap();
        assert!(y.iter().all(|v| (v - 1.0).abs() < 1e-9), "{:?}", y);
    }

    #[test]
    fn test_filtfilt_passes_constant() {
        let coeffs = butterworth(&FilterSpec::lowpass(4, 10.0), 33.3).unwrap();
        let y = filtfilt(&coeffs, &[3.0; 60]).unwrap();
        assert_eq!(y.len(), 60);
        assert!(y.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_highpass_removes_constant() {
        let coeffs = butterworth(&FilterSpec::highpass(2, 5.0), 100.0).unwrap();
        let y = filtfilt(&coeffs, &[2.0; 40]).unwrap();
        assert!(y.iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn test_filtfilt_has_no_phase_delay() {
        let fs = 100.0;
        let x: Vec<f64> = (0..400).map(|i| (2.0 * PI * 1.0 * i as f64 / fs).sin()).collect();
        let coeffs = butterworth(&FilterSpec::lowpass(4, 10.0), fs).unwrap();
        let y = filtfilt(&coeffs, &x).unwrap();
        for i in 100..300 {
            assert!((x[i] - y[i]).abs() < 1e-3, "sample {}: {} vs {}", i, x[i], y[i]);
        }
    }

    #[test]
    fn test_filtfilt_attenuates_stopband() {
        let fs = 100.0;
        let x: Vec<f64> = (0..400).map(|i| (2.0 * PI * 40.0 * i as f64 / fs).sin()).collect();
        let coeffs = butterworth(&FilterSpec::lowpass(4, 5.0), fs).unwrap();
        let y = filtfilt(&coeffs, &x).unwrap();
        assert!(y[100..300].iter().all(|v| v.abs() < 1e-3));
    }

    #[test]
    fn test_short_signal_rejected() {
        let filter = ZeroPhaseFilter::design(&FilterSpec::lowpass(4, 10.0), 33.3).unwrap();
        assert_eq!(filter.padlen(), 15);
        assert_eq!(
            filter.apply(&[1.0; 15]),
            Err(ProcessingError::SignalTooShort { len: 15, padlen: 15 })
        );
        assert!(filter.apply(&[1.0; 16]).is_ok());
    }
}
