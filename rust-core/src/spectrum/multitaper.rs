//! Discrete prolate spheroidal sequences (Slepian tapers) and taper spectra
//!
//! The tapers are the leading eigenvectors of the symmetric tridiagonal matrix
//! that commutes with the time-bandwidth concentration operator:
//!
//! ```text
//! diag[i]   = ((N - 1 - 2i) / 2)^2 cos(2πW)
//! off[i]    = i (N - i) / 2            (between rows i-1 and i)
//! ```
//!
//! with `W = NW / N`. Eigenvalues are isolated by Sturm-sequence bisection and
//! the vectors recovered by inverse iteration.

use super::fft::FftEngine;
use crate::error::{FilterError, Result};
use log::debug;
use ndarray::{Array2, ArrayView1};
use num_complex::Complex64;
use realfft::RealFftPlanner;
use std::f64::consts::PI;

const INVERSE_ITERATIONS: usize = 3;
const MAX_BISECTIONS: usize = 200;

/// Orthonormal DPSS tapers for one channel length and half-bandwidth
#[derive(Debug, Clone)]
pub struct TaperSet {
    /// n_tapers × n_samples
    tapers: Array2<f64>,
    /// Fraction of each taper's energy inside [-W, W]
    eigenvalues: Vec<f64>,
    half_bandwidth: f64,
}

impl TaperSet {
    /// Compute the first `n_tapers` DPSS of length `n_samples`
    ///
    /// `half_bandwidth` is the time-half-bandwidth product NW.
    pub fn dpss(n_samples: usize, half_bandwidth: f64, n_tapers: usize) -> Result<Self> {
        if n_samples == 0 {
            return Err(FilterError::InvalidSpecification(
                "tapers need at least one sample".into(),
            ));
        }
        if !(half_bandwidth > 0.0 && half_bandwidth < n_samples as f64 / 2.0) {
            return Err(FilterError::InvalidSpecification(format!(
                "half-bandwidth {} must be in (0, {})",
                half_bandwidth,
                n_samples as f64 / 2.0
            )));
        }
        if n_tapers == 0 || n_tapers > n_samples {
            return Err(FilterError::InvalidSpecification(format!(
                "cannot build {} tapers of length {}",
                n_tapers, n_samples
            )));
        }

        let w = half_bandwidth / n_samples as f64;
        let (diag, off) = concentration_tridiagonal(n_samples, w);
        let eigvals = largest_eigenvalues(&diag, &off, n_tapers);

        let mut vectors: Vec<Vec<f64>> = Vec::with_capacity(n_tapers);
        for (k, &lambda) in eigvals.iter().enumerate() {
            let mut v = inverse_iteration(&diag, &off, lambda, &vectors);
            fix_sign(&mut v, k);
            vectors.push(v);
        }

        let eigenvalues = vectors
            .iter()
            .map(|v| concentration(v, w))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            "DPSS N={} NW={} K={}: concentrations {:?}",
            n_samples, half_bandwidth, n_tapers, eigenvalues
        );

        let flat: Vec<f64> = vectors.into_iter().flatten().collect();
        let tapers = Array2::from_shape_vec((n_tapers, n_samples), flat)
            .map_err(|e| FilterError::Config(e.to_string()))?;

        Ok(Self {
            tapers,
            eigenvalues,
            half_bandwidth,
        })
    }

    pub fn n_tapers(&self) -> usize {
        self.tapers.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.tapers.ncols()
    }

    pub fn half_bandwidth(&self) -> f64 {
        self.half_bandwidth
    }

    pub fn tapers(&self) -> &Array2<f64> {
        &self.tapers
    }

    pub fn taper(&self, k: usize) -> ArrayView1<'_, f64> {
        self.tapers.row(k)
    }

    /// Spectral concentration of each taper, decreasing
    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }
}

/// Tapered spectra of one channel
#[derive(Debug, Clone)]
pub struct TaperedSpectra {
    /// n_tapers × n_freqs
    pub spectra: Array2<Complex64>,
    /// Non-negative FFT frequencies (Hz)
    pub freqs: Vec<f64>,
}

/// FFT of the mean-removed channel under every taper, keeping the
/// `(n + 1) / 2` non-negative frequencies
pub fn mt_spectra(x: &[f64], tapers: &TaperSet, sfreq: f64) -> Result<TaperedSpectra> {
    let n = x.len();
    if n != tapers.n_samples() {
        return Err(FilterError::LengthMismatch {
            left: "signal",
            right: "tapers",
            left_len: n,
            right_len: tapers.n_samples(),
        });
    }
    let mean = x.iter().sum::<f64>() / n as f64;

    let mut engine = FftEngine::new(n);
    let n_freqs = engine.num_positive_bins();
    let mut spectra = Array2::zeros((tapers.n_tapers(), n_freqs));
    let mut tapered = vec![0.0; n];

    for (k, mut row) in spectra.rows_mut().into_iter().enumerate() {
        for ((dst, &xi), &wi) in tapered.iter_mut().zip(x.iter()).zip(tapers.taper(k).iter()) {
            *dst = (xi - mean) * wi;
        }
        let spectrum = engine.compute_spectrum(&tapered)?;
        for (dst, &src) in row.iter_mut().zip(spectrum.iter()) {
            *dst = src;
        }
    }

    Ok(TaperedSpectra {
        spectra,
        freqs: engine.positive_frequencies(sfreq),
    })
}

fn concentration_tridiagonal(n: usize, w: f64) -> (Vec<f64>, Vec<f64>) {
    let cos_w = (2.0 * PI * w).cos();
    let diag = (0..n)
        .map(|i| {
            let c = (n as f64 - 1.0 - 2.0 * i as f64) / 2.0;
            c * c * cos_w
        })
        .collect();
    // off[0] is unused
    let off = (0..n)
        .map(|i| i as f64 * (n - i) as f64 / 2.0)
        .collect();
    (diag, off)
}

/// Number of eigenvalues strictly below `x`
fn sturm_count(diag: &[f64], off: &[f64], x: f64) -> usize {
    let mut count = 0;
    let mut q = diag[0] - x;
    if q < 0.0 {
        count += 1;
    }
    for i in 1..diag.len() {
        if q == 0.0 {
            q = f64::MIN_POSITIVE;
        }
        q = diag[i] - x - off[i] * off[i] / q;
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// The `k` largest eigenvalues in decreasing order
fn largest_eigenvalues(diag: &[f64], off: &[f64], k: usize) -> Vec<f64> {
    let n = diag.len();
    let radius = |i: usize| {
        let left = if i > 0 { off[i].abs() } else { 0.0 };
        left + off.get(i + 1).map_or(0.0, |e| e.abs())
    };
    // Gershgorin bounds
    let lo = (0..n).map(|i| diag[i] - radius(i)).fold(f64::INFINITY, f64::min);
    let hi = (0..n).map(|i| diag[i] + radius(i)).fold(f64::NEG_INFINITY, f64::max);

    (0..k)
        .map(|rank| {
            let index = n - 1 - rank;
            let (mut a, mut b) = (lo, hi);
            for _ in 0..MAX_BISECTIONS {
                let mid = 0.5 * (a + b);
                if mid <= a || mid >= b {
                    break;
                }
                if sturm_count(diag, off, mid) > index {
                    b = mid;
                } else {
                    a = mid;
                }
            }
            0.5 * (a + b)
        })
        .collect()
}

/// Eigenvector for `lambda`, orthogonal to `previous`, unit norm
fn inverse_iteration(diag: &[f64], off: &[f64], lambda: f64, previous: &[Vec<f64>]) -> Vec<f64> {
    let n = diag.len();
    // Deterministic start with both symmetric and antisymmetric content
    let mut v: Vec<f64> = (0..n).map(|i| 1.0 + 0.5 * (1.7 * i as f64 + 0.3).sin()).collect();
    for _ in 0..INVERSE_ITERATIONS {
        orthonormalize(&mut v, previous);
        v = solve_shifted(diag, off, lambda, &v);
    }
    orthonormalize(&mut v, previous);
    v
}

fn orthonormalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for u in basis {
        let dot: f64 = v.iter().zip(u.iter()).map(|(a, b)| a * b).sum();
        for (a, b) in v.iter_mut().zip(u.iter()) {
            *a -= dot * b;
        }
    }
    let norm = v.iter().map(|a| a * a).sum::<f64>().sqrt();
    if norm > 0.0 {
        for a in v.iter_mut() {
            *a /= norm;
        }
    }
}

/// Solve `(T - lambda I) x = b` by Gaussian elimination with partial pivoting
fn solve_shifted(diag: &[f64], off: &[f64], lambda: f64, b: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let scale = diag.iter().chain(off.iter()).fold(0.0_f64, |m, v| m.max(v.abs()));
    let tiny = f64::EPSILON * scale.max(1.0);

    let mut d: Vec<f64> = diag.iter().map(|v| v - lambda).collect();
    let mut du: Vec<f64> = off[1..].to_vec();
    let dl: Vec<f64> = off[1..].to_vec();
    let mut du2 = vec![0.0; n.saturating_sub(2)];
    let mut rhs = b.to_vec();

    for i in 0..n.saturating_sub(1) {
        if d[i].abs() >= dl[i].abs() {
            if d[i] == 0.0 {
                d[i] = tiny;
            }
            let fact = dl[i] / d[i];
            d[i + 1] -= fact * du[i];
            rhs[i + 1] -= fact * rhs[i];
        } else {
            // swap rows i and i+1
            let fact = d[i] / dl[i];
            d[i] = dl[i];
            let temp = d[i + 1];
            d[i + 1] = du[i] - fact * temp;
            if i + 2 < n {
                du2[i] = du[i + 1];
                du[i + 1] = -fact * du2[i];
            }
            du[i] = temp;
            let temp = rhs[i];
            rhs[i] = rhs[i + 1];
            rhs[i + 1] = temp - fact * rhs[i + 1];
        }
    }
    if d[n - 1] == 0.0 {
        d[n - 1] = tiny;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = rhs[n - 1] / d[n - 1];
    if n > 1 {
        x[n - 2] = (rhs[n - 2] - du[n - 2] * x[n - 1]) / d[n - 2];
    }
    for i in (0..n.saturating_sub(2)).rev() {
        x[i] = (rhs[i] - du[i] * x[i + 1] - du2[i] * x[i + 2]) / d[i];
    }
    x
}

/// Symmetric tapers get a positive sum, antisymmetric ones a positive first lobe
fn fix_sign(v: &mut [f64], k: usize) {
    let flip = if k % 2 == 0 {
        v.iter().sum::<f64>() < 0.0
    } else {
        let threshold = (1.0 / v.len() as f64).max(1e-7);
        v.iter()
            .find(|&&a| a * a > threshold)
            .is_some_and(|&a| a < 0.0)
    };
    if flip {
        for a in v.iter_mut() {
            *a = -*a;
        }
    }
}

/// Energy fraction of `v` inside [-W, W], from its autocorrelation
fn concentration(v: &[f64], w: f64) -> Result<f64> {
    let n = v.len();
    let n_fft = (2 * n).next_power_of_two();
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n_fft);
    let c2r = planner.plan_fft_inverse(n_fft);

    let mut input = r2c.make_input_vec();
    input[..n].copy_from_slice(v);
    let mut spectrum = r2c.make_output_vec();
    r2c.process(&mut input, &mut spectrum)
        .map_err(|e| FilterError::Config(e.to_string()))?;
    for c in spectrum.iter_mut() {
        *c = Complex64::new(c.norm_sqr(), 0.0);
    }
    let mut acf = c2r.make_output_vec();
    c2r.process(&mut spectrum, &mut acf)
        .map_err(|e| FilterError::Config(e.to_string()))?;

    let scale = 1.0 / n_fft as f64;
    let lagged: f64 = (1..n)
        .map(|m| acf[m] * scale * (2.0 * PI * w * m as f64).sin() / (PI * m as f64))
        .sum();
    Ok(2.0 * w * acf[0] * scale + 2.0 * lagged)
}
