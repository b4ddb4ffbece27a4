// src/processing/filters/butterworth.rs
//! Digital Butterworth design via the analog prototype and bilinear transform
//!
//! Steps: normalised analog low-pass prototype in zero-pole-gain form,
//! frequency transform to the requested band with pre-warped edges,
//! bilinear map to the z-plane, then expansion to transfer function
//! polynomials.

use super::{BandType, FilterSpec, IirCoefficients};
use crate::processing::{ProcessingError, ProcessingResult};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Bilinear transform constant for a normalised sample rate of 2
const FS2: f64 = 4.0;

struct Zpk {
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    gain: f64,
}

/// Design a Butterworth filter for data sampled at `sample_rate_hz`
pub fn butterworth(spec: &FilterSpec, sample_rate_hz: f64) -> ProcessingResult<IirCoefficients> {
    spec.validate(sample_rate_hz)?;

    let warped: Vec<f64> = spec
        .normalized_edges(sample_rate_hz)
        .into_iter()
        .map(|wn| FS2 * (PI * wn / 2.0).tan())
        .collect();

    let prototype = analog_prototype(spec.order);
    let analog = match (spec.band, warped.as_slice()) {
        (BandType::Lowpass, &[wo]) => lp_to_lp(prototype, wo),
        (BandType::Highpass, &[wo]) => lp_to_hp(prototype, wo),
        (BandType::Bandpass, &[w0, w1]) => lp_to_bp(prototype, (w0 * w1).sqrt(), w1 - w0),
        (BandType::Bandstop, &[w0, w1]) => lp_to_bs(prototype, (w0 * w1).sqrt(), w1 - w0),
        (band, edges) => {
            return Err(ProcessingError::FilterConfig(format!(
                "{:?} cannot be built from {} band edges",
                band,
                edges.len()
            )))
        }
    };

    Ok(to_transfer_function(bilinear(analog)))
}

fn analog_prototype(order: usize) -> Zpk {
    let n = order as i64;
    let poles = (0..n)
        .map(|i| {
            let m = -n + 1 + 2 * i;
            -Complex64::from_polar(1.0, PI * m as f64 / (2 * n) as f64)
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn degree(zpk: &Zpk) -> usize {
    zpk.poles.len() - zpk.zeros.len()
}

fn real_gain_ratio(zpk: &Zpk) -> f64 {
    let num: Complex64 = zpk.zeros.iter().map(|z| -z).product();
    let den: Complex64 = zpk.poles.iter().map(|p| -p).product();
    (num / den).re
}

fn lp_to_lp(zpk: Zpk, wo: f64) -> Zpk {
    let d = degree(&zpk) as i32;
    Zpk {
        zeros: zpk.zeros.iter().map(|z| z * wo).collect(),
        poles: zpk.poles.iter().map(|p| p * wo).collect(),
        gain: zpk.gain * wo.powi(d),
    }
}

fn lp_to_hp(zpk: Zpk, wo: f64) -> Zpk {
    let d = degree(&zpk);
    let gain = zpk.gain * real_gain_ratio(&zpk);
    let wo = Complex64::new(wo, 0.0);
    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| wo / z).collect();
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(d));
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| wo / p).collect(),
        gain,
    }
}

/// Split each low-pass root into the pair `r ± sqrt(r² - wo²)`
fn split_roots(roots: &[Complex64], wo: f64) -> Vec<Complex64> {
    let wo2 = Complex64::new(wo * wo, 0.0);
    let plus = roots.iter().map(|r| r + (r * r - wo2).sqrt());
    let minus = roots.iter().map(|r| r - (r * r - wo2).sqrt());
    plus.chain(minus).collect()
}

fn lp_to_bp(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let d = degree(&zpk);
    let half = bw / 2.0;
    let zeros_lp: Vec<Complex64> = zpk.zeros.iter().map(|z| z * half).collect();
    let poles_lp: Vec<Complex64> = zpk.poles.iter().map(|p| p * half).collect();

    let mut zeros = split_roots(&zeros_lp, wo);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(d));
    Zpk {
        zeros,
        poles: split_roots(&poles_lp, wo),
        gain: zpk.gain * bw.powi(d as i32),
    }
}

fn lp_to_bs(zpk: Zpk, wo: f64, bw: f64) -> Zpk {
    let d = degree(&zpk);
    let half = Complex64::new(bw / 2.0, 0.0);
    let gain = zpk.gain * real_gain_ratio(&zpk);
    let zeros_hp: Vec<Complex64> = zpk.zeros.iter().map(|z| half / z).collect();
    let poles_hp: Vec<Complex64> = zpk.poles.iter().map(|p| half / p).collect();

    let mut zeros = split_roots(&zeros_hp, wo);
    zeros.extend(std::iter::repeat(Complex64::new(0.0, wo)).take(d));
    zeros.extend(std::iter::repeat(Complex64::new(0.0, -wo)).take(d));
    Zpk {
        zeros,
        poles: split_roots(&poles_hp, wo),
        gain,
    }
}

fn bilinear(zpk: Zpk) -> Zpk {
    let d = degree(&zpk);
    let fs2 = Complex64::new(FS2, 0.0);

    let num: Complex64 = zpk.zeros.iter().map(|z| fs2 - z).product();
    let den: Complex64 = zpk.poles.iter().map(|p| fs2 - p).product();

    let mut zeros: Vec<Complex64> = zpk.zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    zeros.extend(std::iter::repeat(Complex64::new(-1.0, 0.0)).take(d));
    Zpk {
        zeros,
        poles: zpk.poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect(),
        gain: zpk.gain * (num / den).re,
    }
}

/// Monic polynomial with the given roots, highest power first
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for root in roots {
        let mut next = coeffs.clone();
        next.push(Complex64::new(0.0, 0.0));
        for i in 1..next.len() {
            next[i] -= root * coeffs[i - 1];
        }
        coeffs = next;
    }
    coeffs
}

fn to_transfer_function(zpk: Zpk) -> IirCoefficients {
    // Roots come in conjugate pairs, so imaginary parts are round-off
    let b = poly(&zpk.zeros).iter().map(|c| c.re * zpk.gain).collect();
    let a = poly(&zpk.poles).iter().map(|c| c.re).collect();
    IirCoefficients { b, a }
}
