//! FIR design by windowed frequency sampling
//!
//! Every filter shape (low/high/band-pass, band-stop with any number of stop
//! bands, notches) is described by piecewise-linear gain control points and
//! realized through [`firwin2`].

use super::windows::{generate_window, WindowType};
use crate::error::{FilterError, Result};
use num_complex::Complex64;
use realfft::RealFftPlanner;
use std::f64::consts::PI;

/// Piecewise-linear gain specification over normalized frequency
///
/// Frequencies are in units of the Nyquist frequency (0 = DC, 1 = Nyquist),
/// non-decreasing, starting at 0 and ending at 1.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyResponseSpec {
    freqs: Vec<f64>,
    gains: Vec<f64>,
}

impl FrequencyResponseSpec {
    /// Build from normalized control points
    pub fn new(freqs: Vec<f64>, gains: Vec<f64>) -> Result<Self> {
        if freqs.len() != gains.len() {
            return Err(FilterError::LengthMismatch {
                left: "freq",
                right: "gain",
                left_len: freqs.len(),
                right_len: gains.len(),
            });
        }
        if freqs.len() < 2 {
            return Err(FilterError::InvalidSpecification(
                "at least two control points are required".into(),
            ));
        }
        if freqs.iter().chain(gains.iter()).any(|v| !v.is_finite()) {
            return Err(FilterError::InvalidSpecification(
                "control points must be finite".into(),
            ));
        }
        if freqs[0] != 0.0 || freqs[freqs.len() - 1] != 1.0 {
            return Err(FilterError::InvalidSpecification(format!(
                "frequencies must start at 0 and end at Nyquist, got {:.4}..{:.4} (normalized)",
                freqs[0],
                freqs[freqs.len() - 1]
            )));
        }
        if freqs.windows(2).any(|w| w[1] < w[0]) {
            return Err(FilterError::InvalidSpecification(
                "frequencies must be non-decreasing and within [0, Nyquist]".into(),
            ));
        }
        Ok(Self { freqs, gains })
    }

    /// Build from control points in Hz
    pub fn from_hz(freqs_hz: &[f64], gains: &[f64], sfreq: f64) -> Result<Self> {
        check_sfreq(sfreq)?;
        let nyquist = sfreq / 2.0;
        Self::new(
            freqs_hz.iter().map(|f| f / nyquist).collect(),
            gains.to_vec(),
        )
    }

    /// Low-pass: passband up to `fp`, stopband from `fp + trans_bandwidth`
    pub fn low_pass(sfreq: f64, fp: f64, trans_bandwidth: f64) -> Result<Self> {
        let f_stop = fp + trans_bandwidth;
        Self::from_hz(&[0.0, fp, f_stop, sfreq / 2.0], &[1.0, 1.0, 0.0, 0.0], sfreq)
    }

    /// High-pass: stopband up to `fp - trans_bandwidth`, passband from `fp`
    pub fn high_pass(sfreq: f64, fp: f64, trans_bandwidth: f64) -> Result<Self> {
        let f_stop = fp - trans_bandwidth;
        if f_stop <= 0.0 {
            return Err(FilterError::InvalidSpecification(format!(
                "Stop frequency too low ({:.1}Hz). Increase Fp or reduce transition bandwidth",
                f_stop
            )));
        }
        Self::from_hz(&[0.0, f_stop, fp, sfreq / 2.0], &[0.0, 0.0, 1.0, 1.0], sfreq)
    }

    /// Band-pass between `fp1` and `fp2`
    pub fn band_pass(
        sfreq: f64,
        fp1: f64,
        fp2: f64,
        l_trans_bandwidth: f64,
        h_trans_bandwidth: f64,
    ) -> Result<Self> {
        let fs1 = fp1 - l_trans_bandwidth;
        let fs2 = fp2 + h_trans_bandwidth;
        if fs1 <= 0.0 {
            return Err(FilterError::InvalidSpecification(format!(
                "Lower stop frequency too low ({:.1}Hz). Increase Fp1 or reduce transition bandwidth",
                fs1
            )));
        }
        Self::from_hz(
            &[0.0, fs1, fp1, fp2, fs2, sfreq / 2.0],
            &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
            sfreq,
        )
    }

    /// Band-stop with one stop band per (`fp1[i]`, `fp2[i]`) pair
    ///
    /// Each band has passband edges `fp1[i]`/`fp2[i]` and stopband edges
    /// `fp1[i] + l_trans_bandwidth`/`fp2[i] - h_trans_bandwidth`. Bands whose
    /// control points interleave after sorting are rejected.
    pub fn band_stop(
        sfreq: f64,
        fp1: &[f64],
        fp2: &[f64],
        l_trans_bandwidth: f64,
        h_trans_bandwidth: f64,
    ) -> Result<Self> {
        if fp1.len() != fp2.len() {
            return Err(FilterError::LengthMismatch {
                left: "Fp1",
                right: "Fp2",
                left_len: fp1.len(),
                right_len: fp2.len(),
            });
        }
        let fs1: Vec<f64> = fp1.iter().map(|f| f + l_trans_bandwidth).collect();
        let fs2: Vec<f64> = fp2.iter().map(|f| f - h_trans_bandwidth).collect();
        if let Some(bad) = fs1.iter().find(|&&f| f <= 0.0) {
            return Err(FilterError::InvalidSpecification(format!(
                "Lower stop frequency too low ({:.1}Hz). Increase Fp1 or reduce transition bandwidth",
                bad
            )));
        }

        let mut points: Vec<(f64, f64)> = Vec::with_capacity(2 + 4 * fp1.len());
        points.push((0.0, 1.0));
        points.extend(fp1.iter().map(|&f| (f, 1.0)));
        points.extend(fs1.iter().map(|&f| (f, 0.0)));
        points.extend(fs2.iter().map(|&f| (f, 0.0)));
        points.extend(fp2.iter().map(|&f| (f, 1.0)));
        points.push((sfreq / 2.0, 1.0));
        // stable sort keeps the insertion order of coincident points
        points.sort_by(|a, b| a.0.total_cmp(&b.0));

        let gains: Vec<f64> = points.iter().map(|p| p.1).collect();
        if gains
            .windows(3)
            .any(|w| (w[2] - 2.0 * w[1] + w[0]).abs() > 1.0)
        {
            return Err(FilterError::BandsNotSeparated);
        }

        let freqs: Vec<f64> = points.iter().map(|p| p.0).collect();
        Self::from_hz(&freqs, &gains, sfreq)
    }

    /// Normalized control frequencies
    pub fn frequencies(&self) -> &[f64] {
        &self.freqs
    }

    /// Gains at the control frequencies
    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    /// Desired gain at the Nyquist frequency
    pub fn nyquist_gain(&self) -> f64 {
        self.gains[self.gains.len() - 1]
    }
}

pub(crate) fn check_sfreq(sfreq: f64) -> Result<()> {
    if !(sfreq.is_finite() && sfreq > 0.0) {
        return Err(FilterError::InvalidSampleRate(sfreq));
    }
    Ok(())
}

/// Whether `length` is compatible with the desired gain at Nyquist
///
/// A symmetric FIR of even length has a forced zero at Nyquist, so a zero
/// Nyquist gain pairs with an even length and any other gain with an odd one.
pub fn nyquist_parity_ok(length: usize, nyquist_gain: f64) -> bool {
    if nyquist_gain == 0.0 {
        length % 2 == 0
    } else {
        length % 2 == 1
    }
}

/// Smallest length >= `length` satisfying [`nyquist_parity_ok`]
pub fn adjust_length_for_nyquist(length: usize, nyquist_gain: f64) -> usize {
    if nyquist_parity_ok(length, nyquist_gain) {
        length
    } else {
        length + 1
    }
}

/// Design a linear-phase FIR filter of `numtaps` coefficients from a
/// piecewise-linear gain specification
///
/// # Algorithm
/// 1. Interpolate the gain onto a uniform grid of `1 + 2^ceil(log2 numtaps)` points
/// 2. Apply the linear phase delay `(numtaps - 1) / 2`
/// 3. Inverse real FFT and keep the first `numtaps` samples
/// 4. Multiply by the window
pub fn firwin2(
    numtaps: usize,
    spec: &FrequencyResponseSpec,
    window: WindowType,
) -> Result<Vec<f64>> {
    if numtaps == 0 {
        return Err(FilterError::InvalidSpecification(
            "filter length must be positive".into(),
        ));
    }
    if !nyquist_parity_ok(numtaps, spec.nyquist_gain()) {
        return Err(FilterError::NyquistParity {
            length: numtaps,
            gain: spec.nyquist_gain(),
        });
    }

    let nfreqs = 1 + numtaps.next_power_of_two();
    let n_fft = 2 * (nfreqs - 1);

    // Nudge repeated frequencies apart so the interpolation has a step there
    let mut freq = spec.frequencies().to_vec();
    for k in 0..freq.len() - 1 {
        if freq[k] == freq[k + 1] {
            freq[k] -= f64::EPSILON;
            freq[k + 1] += f64::EPSILON;
        }
    }

    let delay = (numtaps - 1) as f64 / 2.0;
    let mut planner = RealFftPlanner::<f64>::new();
    let c2r = planner.plan_fft_inverse(n_fft);
    let mut spectrum = c2r.make_input_vec();
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let x = k as f64 / (nfreqs - 1) as f64;
        let gain = interp(x, &freq, spec.gains());
        *bin = Complex64::from_polar(gain, -delay * PI * x);
    }
    // A real inverse transform ignores these; zero them so the planner accepts the input
    spectrum[0].im = 0.0;
    spectrum[nfreqs - 1].im = 0.0;

    let mut impulse = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut impulse)
        .map_err(|e| FilterError::Config(e.to_string()))?;

    let window = generate_window(window, numtaps);
    let scale = 1.0 / n_fft as f64;
    Ok(impulse[..numtaps]
        .iter()
        .zip(window.iter())
        .map(|(&h, &w)| h * scale * w)
        .collect())
}

/// Linear interpolation with constant extrapolation (`xp` non-decreasing)
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let i = xp.partition_point(|&v| v <= x);
    if i == 0 {
        return fp[0];
    }
    if i == xp.len() {
        return fp[fp.len() - 1];
    }
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    if x1 == x0 {
        return y1;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Calculate frequency response at given frequencies
///
/// # Arguments
/// * `h` - Filter coefficients
/// * `frequencies` - Normalized frequencies (units of π rad/sample)
///
/// # Returns
/// Complex frequency response H(e^jω)
pub fn frequency_response(h: &[f64], frequencies: &[f64]) -> Vec<Complex64> {
    frequencies
        .iter()
        .map(|&omega| {
            let omega_rad = omega * PI;
            h.iter()
                .enumerate()
                .map(|(n, &h_n)| h_n * Complex64::from_polar(1.0, -(omega_rad * n as f64)))
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magnitude_at(h: &[f64], freq: f64) -> f64 {
        frequency_response(h, &[freq])[0].norm()
    }

    #[test]
    fn test_low_pass_design() {
        // 1000 Hz sampling, 40 Hz passband, 10 Hz transition
        let spec = FrequencyResponseSpec::low_pass(1000.0, 40.0, 10.0).unwrap();
        assert_eq!(spec.frequencies(), &[0.0, 0.08, 0.1, 1.0]);

        let n = adjust_length_for_nyquist(400, spec.nyquist_gain());
        assert_eq!(n, 400);
        let h = firwin2(n, &spec, WindowType::Hamming).unwrap();
        assert_eq!(h.len(), 400);

        // Linear phase: symmetric taps
        for i in 0..h.len() / 2 {
            assert!((h[i] - h[h.len() - 1 - i]).abs() < 1e-12);
        }

        // DC gain ~1, deep stopband
        let dc: f64 = h.iter().sum();
        assert!((dc - 1.0).abs() < 0.01, "DC gain {}", dc);
        assert!(magnitude_at(&h, 0.04) > 0.98);
        assert!(magnitude_at(&h, 0.3) < 0.01);
    }

    #[test]
    fn test_high_pass_needs_odd_length() {
        let spec = FrequencyResponseSpec::high_pass(1000.0, 20.0, 5.0).unwrap();
        assert_eq!(spec.nyquist_gain(), 1.0);

        assert!(matches!(
            firwin2(500, &spec, WindowType::Hamming),
            Err(FilterError::NyquistParity { length: 500, .. })
        ));

        let n = adjust_length_for_nyquist(500, spec.nyquist_gain());
        assert_eq!(n, 501);
        let h = firwin2(n, &spec, WindowType::Hamming).unwrap();
        assert!(h.iter().sum::<f64>().abs() < 0.01);
        assert!((magnitude_at(&h, 0.5) - 1.0).abs() < 0.01);
        assert!((magnitude_at(&h, 1.0) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_high_pass_stop_frequency_check() {
        assert!(matches!(
            FrequencyResponseSpec::high_pass(1000.0, 0.3, 0.5),
            Err(FilterError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_band_pass_shape() {
        let spec = FrequencyResponseSpec::band_pass(1000.0, 8.0, 30.0, 2.0, 5.0).unwrap();
        assert_eq!(spec.gains(), &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        let h = firwin2(1000, &spec, WindowType::Hamming).unwrap();
        assert!(magnitude_at(&h, 20.0 / 500.0) > 0.98);
        assert!(magnitude_at(&h, 100.0 / 500.0) < 0.01);
        assert!(magnitude_at(&h, 0.0) < 0.01);
    }

    #[test]
    fn test_band_stop_sorting_and_separation() {
        // Two well separated stop bands
        let spec =
            FrequencyResponseSpec::band_stop(1000.0, &[49.0, 99.0], &[51.0, 101.0], 0.5, 0.5)
                .unwrap();
        assert_eq!(
            spec.gains(),
            &[1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]
        );
        let f = spec.frequencies();
        assert!(f.windows(2).all(|w| w[1] >= w[0]));

        // Overlapping stop bands interleave their control points
        let overlapping =
            FrequencyResponseSpec::band_stop(1000.0, &[49.0, 50.0], &[52.0, 53.0], 0.5, 0.5);
        assert_eq!(overlapping, Err(FilterError::BandsNotSeparated));

        let mismatched = FrequencyResponseSpec::band_stop(1000.0, &[49.0], &[51.0, 52.0], 0.5, 0.5);
        assert!(matches!(mismatched, Err(FilterError::LengthMismatch { .. })));
    }

    #[test]
    fn test_spec_validation() {
        assert!(FrequencyResponseSpec::new(vec![0.0, 0.5], vec![1.0, 0.0]).is_err());
        assert!(FrequencyResponseSpec::new(vec![0.0, 0.6, 0.5, 1.0], vec![1.0; 4]).is_err());
        assert!(FrequencyResponseSpec::new(vec![0.0, 1.0], vec![1.0]).is_err());
        // Cut-off above Nyquist
        assert!(FrequencyResponseSpec::low_pass(100.0, 49.0, 5.0).is_err());
        assert!(matches!(
            FrequencyResponseSpec::low_pass(0.0, 10.0, 1.0),
            Err(FilterError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_parity_rule_over_many_configurations() {
        // Sweep cut-offs, Nyquist gains and requested lengths
        let mut checked = 0;
        for (i, cutoff) in [0.05, 0.1, 0.2, 0.35, 0.5, 0.7, 0.85].iter().enumerate() {
            for nyq_gain in [0.0, 1.0] {
                let gains = if nyq_gain == 0.0 {
                    vec![1.0, 1.0, 0.0, 0.0]
                } else {
                    vec![0.0, 0.0, 1.0, 1.0]
                };
                let spec =
                    FrequencyResponseSpec::new(vec![0.0, cutoff - 0.02, *cutoff, 1.0], gains)
                        .unwrap();
                for requested in [16 + i, 33 + i, 64 + 2 * i, 101 + i] {
                    let n = adjust_length_for_nyquist(requested, nyq_gain);
                    assert!(n == requested || n == requested + 1);
                    if nyq_gain == 0.0 {
                        assert_eq!(n % 2, 0);
                    } else {
                        assert_eq!(n % 2, 1);
                    }
                    let h = firwin2(n, &spec, WindowType::Hamming).unwrap();
                    assert_eq!(h.len(), n);
                    checked += 1;
                }
            }
        }
        assert!(checked >= 50);
    }

    #[test]
    fn test_interp() {
        let xp = [0.0, 0.5, 0.5, 1.0];
        let fp = [0.0, 1.0, 0.0, 0.0];
        assert!((interp(0.25, &xp, &fp) - 0.5).abs() < 1e-12);
        assert_eq!(interp(0.75, &xp, &fp), 0.0);
        assert_eq!(interp(-1.0, &xp, &fp), 0.0);
        assert_eq!(interp(2.0, &xp, &fp), 0.0);
    }
}
