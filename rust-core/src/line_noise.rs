//! Multitaper estimation and removal of sinusoidal line components
//!
//! For every non-negative FFT frequency the complex amplitude of a sinusoid is
//! estimated by regressing the symmetric-taper spectra on the taper sums. Bins
//! are selected either explicitly (requested frequencies and notch widths) or
//! by an F-test of the sinusoid against the residual spectrum, and the fitted
//! sinusoids are subtracted in the time domain.

use crate::error::{FilterError, Result};
use crate::exec::Executor;
use crate::spectrum::multitaper::{mt_spectra, TaperSet};
use log::{info, warn};
use ndarray::Array2;
use num_complex::Complex64;
use serde::Serialize;
use std::f64::consts::PI;

/// Time-half-bandwidth product used when no bandwidth is given
pub const DEFAULT_HALF_BANDWIDTH: f64 = 4.0;

/// A sinusoid that was fitted (and removed) at one frequency bin
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedLine {
    /// Bin frequency (Hz)
    pub frequency: f64,
    /// Complex amplitude `c`; the fitted component is `|c| cos(2π f t + arg c)`
    pub amplitude: Complex64,
    /// `arg c` (radians)
    pub phase: f64,
}

/// How bins are chosen for removal
#[derive(Debug, Clone, PartialEq)]
pub enum LineSelection {
    /// Nearest bin to each frequency plus every bin strictly within half the
    /// matching notch width
    Explicit {
        freqs: Vec<f64>,
        notch_widths: Vec<f64>,
    },
    /// Bins whose F statistic exceeds the Bonferroni-corrected threshold
    FTest { p_value: f64 },
}

/// Sinusoid fitting for channels of one fixed length
pub struct LineNoiseDetector {
    sfreq: f64,
    tapers: TaperSet,
    selection: LineSelection,
    /// Sums of the symmetric (amplitude) tapers
    h0: Vec<f64>,
    h0_sq: f64,
}

impl LineNoiseDetector {
    /// # Arguments
    /// * `n_samples` - Channel length
    /// * `sfreq` - Sampling rate (Hz)
    /// * `bandwidth` - Multitaper bandwidth (Hz); NW = 4 when `None`
    /// * `selection` - Explicit frequencies or F-test
    pub fn new(
        n_samples: usize,
        sfreq: f64,
        bandwidth: Option<f64>,
        selection: LineSelection,
    ) -> Result<Self> {
        if !(sfreq.is_finite() && sfreq > 0.0) {
            return Err(FilterError::InvalidSampleRate(sfreq));
        }
        match &selection {
            LineSelection::Explicit {
                freqs,
                notch_widths,
            } => {
                if freqs.len() != notch_widths.len() {
                    return Err(FilterError::LengthMismatch {
                        left: "freqs",
                        right: "notch_widths",
                        left_len: freqs.len(),
                        right_len: notch_widths.len(),
                    });
                }
            }
            LineSelection::FTest { p_value } => {
                if !(*p_value > 0.0 && *p_value < 1.0) {
                    return Err(FilterError::InvalidSpecification(format!(
                        "p_value must be in (0, 1), got {}",
                        p_value
                    )));
                }
            }
        }

        let half_bandwidth = match bandwidth {
            Some(bw) => bw * n_samples as f64 / (2.0 * sfreq),
            None => DEFAULT_HALF_BANDWIDTH,
        };
        let n_tapers = ((2.0 * half_bandwidth) as usize).max(1);
        let tapers = TaperSet::dpss(n_samples, half_bandwidth, n_tapers)?;

        let h0: Vec<f64> = tapers
            .tapers()
            .rows()
            .into_iter()
            .step_by(2)
            .map(|t| t.sum())
            .collect();
        let h0_sq = h0.iter().map(|h| h * h).sum();

        Ok(Self {
            sfreq,
            tapers,
            selection,
            h0,
            h0_sq,
        })
    }

    pub fn tapers(&self) -> &TaperSet {
        &self.tapers
    }

    /// Fit the selected sinusoids and return the channel with them removed
    pub fn remove(&self, x: &[f64]) -> Result<(Vec<f64>, Vec<DetectedLine>)> {
        let n = x.len();
        let spec = mt_spectra(x, &self.tapers, self.sfreq)?;
        let y = &spec.spectra;
        let n_freqs = spec.freqs.len();

        let amplitudes: Vec<Complex64> = (0..n_freqs)
            .map(|f| {
                let s: Complex64 = self
                    .h0
                    .iter()
                    .enumerate()
                    .map(|(j, &h)| y[[2 * j, f]] * h)
                    .sum();
                s / self.h0_sq
            })
            .collect();

        let indices = match &self.selection {
            LineSelection::Explicit {
                freqs,
                notch_widths,
            } => explicit_bins(&spec.freqs, freqs, notch_widths),
            LineSelection::FTest { p_value } => self.significant_bins(y, &amplitudes, *p_value, n),
        };

        let mut cleaned = x.to_vec();
        let mut lines = Vec::with_capacity(indices.len());
        for &idx in &indices {
            let c = 2.0 * amplitudes[idx];
            let (mag, phase) = c.to_polar();
            let omega = 2.0 * PI * spec.freqs[idx] / self.sfreq;
            for (t, v) in cleaned.iter_mut().enumerate() {
                *v -= mag * (omega * t as f64 + phase).cos();
            }
            lines.push(DetectedLine {
                frequency: spec.freqs[idx],
                amplitude: c,
                phase,
            });
        }
        Ok((cleaned, lines))
    }

    fn significant_bins(
        &self,
        y: &Array2<Complex64>,
        amplitudes: &[Complex64],
        p_value: f64,
        n_times: usize,
    ) -> Vec<usize> {
        let k = self.tapers.n_tapers();
        if k < 2 {
            warn!("At least two tapers are needed for the F-test; no lines detected");
            return Vec::new();
        }
        let threshold = f_threshold(p_value / n_times as f64, 2 * k - 2);

        (0..amplitudes.len())
            .filter(|&f| {
                let a = amplitudes[f];
                let num = (k - 1) as f64 * a.norm_sqr() * self.h0_sq;
                let fit_residual: f64 = self
                    .h0
                    .iter()
                    .enumerate()
                    .map(|(j, &h)| (y[[2 * j, f]] - a * h).norm_sqr())
                    .sum();
                let noise: f64 = (1..k).step_by(2).map(|j| y[[j, f]].norm_sqr()).sum();
                let den = fit_residual + noise;
                den > 0.0 && num / den > threshold
            })
            .collect()
    }
}

/// Upper `q` quantile of the F(2, d2) distribution
///
/// The survival function of F(2, d2) is `(1 + 2x/d2)^(-d2/2)`, which inverts
/// in closed form.
pub fn f_threshold(q: f64, d2: usize) -> f64 {
    let d2 = d2 as f64;
    d2 / 2.0 * (q.powf(-2.0 / d2) - 1.0)
}

fn explicit_bins(bin_freqs: &[f64], freqs: &[f64], notch_widths: &[f64]) -> Vec<usize> {
    let mut selected = vec![false; bin_freqs.len()];
    for (&lf, &nw) in freqs.iter().zip(notch_widths.iter()) {
        let nearest = bin_freqs
            .iter()
            .enumerate()
            .min_by(|a, b| (a.1 - lf).abs().total_cmp(&(b.1 - lf).abs()))
            .map(|(i, _)| i);
        if let Some(i) = nearest {
            selected[i] = true;
        }
        let half = nw / 2.0;
        for (sel, &f) in selected.iter_mut().zip(bin_freqs.iter()) {
            if f > lf - half && f < lf + half {
                *sel = true;
            }
        }
    }
    selected
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect()
}

/// Remove line components from the picked rows of `rows` in place
///
/// Returns the fitted lines of every picked channel, in pick order. In F-test
/// mode the detected frequencies are logged per channel.
pub fn remove_line_noise(
    rows: &mut Array2<f64>,
    picks: &[usize],
    sfreq: f64,
    bandwidth: Option<f64>,
    selection: LineSelection,
    executor: &Executor,
) -> Result<Vec<Vec<DetectedLine>>> {
    let detecting = matches!(selection, LineSelection::FTest { .. });
    let detector = LineNoiseDetector::new(rows.ncols(), sfreq, bandwidth, selection)?;

    let inputs: Vec<Vec<f64>> = picks.iter().map(|&p| rows.row(p).to_vec()).collect();
    let results = executor
        .map(inputs, |row| detector.remove(&row))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let mut all_lines = Vec::with_capacity(results.len());
    for (&p, (cleaned, lines)) in picks.iter().zip(results) {
        for (dst, src) in rows.row_mut(p).iter_mut().zip(cleaned) {
            *dst = src;
        }
        if detecting {
            if lines.is_empty() {
                info!("Detected notch frequencies: None");
            } else {
                let found: Vec<String> = lines.iter().map(|l| format!("{}", l.frequency)).collect();
                info!("Detected notch frequencies: {}", found.join(", "));
            }
        }
        all_lines.push(lines);
    }
    Ok(all_lines)
}
