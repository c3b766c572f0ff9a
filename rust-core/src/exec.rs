//! Per-channel execution and the per-segment spectral multiply
//!
//! Channels are independent, so every engine maps a pure per-channel function
//! over the rows through [`Executor`]. The only operation with interchangeable
//! implementations is the spectral multiply of one block against a resident
//! kernel spectrum ([`SpectralMultiply`]).

use crate::error::{FilterError, Result};
use ndarray::{Array2, ArrayView1};
use num_complex::Complex64;
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Order-preserving parallel map over channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Executor {
    /// Process channels one after another on the calling thread
    #[default]
    Serial,
    /// Process channels on a dedicated pool of `n` worker threads
    Threads(usize),
}

impl Executor {
    /// `n_jobs <= 1` runs serially
    pub fn from_n_jobs(n_jobs: usize) -> Self {
        if n_jobs <= 1 {
            Executor::Serial
        } else {
            Executor::Threads(n_jobs)
        }
    }

    /// Apply `f` to every item, returning results in input order
    pub fn map<I, R, F>(&self, items: Vec<I>, f: F) -> Result<Vec<R>>
    where
        I: Send,
        R: Send,
        F: Fn(I) -> R + Send + Sync,
    {
        match *self {
            Executor::Serial | Executor::Threads(0) | Executor::Threads(1) => {
                Ok(items.into_iter().map(f).collect())
            }
            Executor::Threads(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| FilterError::WorkerPool(e.to_string()))?;
                Ok(pool.install(|| items.into_par_iter().map(&f).collect()))
            }
        }
    }

    /// Replace each picked row of `rows` with `f(row)`
    ///
    /// Every row is computed before any is written, so a failing channel
    /// leaves `rows` untouched.
    pub fn apply_rows<F>(&self, rows: &mut Array2<f64>, picks: &[usize], f: F) -> Result<()>
    where
        F: Fn(&[f64]) -> Result<Vec<f64>> + Send + Sync,
    {
        let inputs: Vec<Vec<f64>> = picks.iter().map(|&p| rows.row(p).to_vec()).collect();
        let outputs = self
            .map(inputs, |row| f(&row))?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        for (&p, out) in picks.iter().zip(outputs.iter()) {
            rows.row_mut(p).assign(&ArrayView1::from(out.as_slice()));
        }
        Ok(())
    }
}

/// FFT implementation used for the per-segment spectral multiply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FftBackend {
    /// Full complex transforms (rustfft); always available
    #[default]
    Portable,
    /// Half-spectrum real transforms (realfft), roughly half the work
    Accelerated,
}

impl FftBackend {
    /// Build a multiplier holding `spectrum` (full length, Hermitian) resident
    pub fn multiplier(self, spectrum: Vec<Complex64>) -> Box<dyn SpectralMultiply> {
        match self {
            FftBackend::Portable => Box::new(ComplexFftMultiplier::new(spectrum)),
            FftBackend::Accelerated => Box::new(RealFftMultiplier::new(&spectrum)),
        }
    }
}

/// Circular convolution of a real block with a resident kernel spectrum
pub trait SpectralMultiply: Send + Sync {
    /// Block (transform) size
    fn fft_size(&self) -> usize;

    /// `real(ifft(fft(block) * H))`, with `block` zero-padded to `fft_size`
    fn multiply(&self, block: &[f64]) -> Result<Vec<f64>>;
}

/// Full-length FFT of a real sequence zero-padded to `n_fft`
pub fn real_spectrum(x: &[f64], n_fft: usize) -> Vec<Complex64> {
    let mut buffer = vec![Complex64::new(0.0, 0.0); n_fft];
    for (dst, &src) in buffer.iter_mut().zip(x.iter()) {
        *dst = Complex64::new(src, 0.0);
    }
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(n_fft).process(&mut buffer);
    buffer
}

/// Portable multiplier on full complex spectra
pub struct ComplexFftMultiplier {
    spectrum: Vec<Complex64>,
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
}

impl ComplexFftMultiplier {
    pub fn new(spectrum: Vec<Complex64>) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(spectrum.len());
        let ifft = planner.plan_fft_inverse(spectrum.len());
        Self {
            spectrum,
            fft,
            ifft,
        }
    }
}

impl SpectralMultiply for ComplexFftMultiplier {
    fn fft_size(&self) -> usize {
        self.spectrum.len()
    }

    fn multiply(&self, block: &[f64]) -> Result<Vec<f64>> {
        let n = self.spectrum.len();
        let mut buffer = vec![Complex64::new(0.0, 0.0); n];
        for (dst, &src) in buffer.iter_mut().zip(block.iter()) {
            *dst = Complex64::new(src, 0.0);
        }

        self.fft.process(&mut buffer);
        for (b, h) in buffer.iter_mut().zip(self.spectrum.iter()) {
            *b *= h;
        }
        self.ifft.process(&mut buffer);

        // IFFT normalization
        let scale = 1.0 / n as f64;
        Ok(buffer.iter().map(|c| c.re * scale).collect())
    }
}

/// Accelerated multiplier on half spectra
pub struct RealFftMultiplier {
    n_fft: usize,
    half_spectrum: Vec<Complex64>,
    r2c: Arc<dyn RealToComplex<f64>>,
    c2r: Arc<dyn ComplexToReal<f64>>,
}

impl RealFftMultiplier {
    /// Keep the non-negative frequency half of a Hermitian `spectrum`
    pub fn new(spectrum: &[Complex64]) -> Self {
        let n_fft = spectrum.len();
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(n_fft);
        let c2r = planner.plan_fft_inverse(n_fft);
        Self {
            n_fft,
            half_spectrum: spectrum[..n_fft / 2 + 1].to_vec(),
            r2c,
            c2r,
        }
    }
}

impl SpectralMultiply for RealFftMultiplier {
    fn fft_size(&self) -> usize {
        self.n_fft
    }

    fn multiply(&self, block: &[f64]) -> Result<Vec<f64>> {
        let mut input = self.r2c.make_input_vec();
        let len = block.len().min(self.n_fft);
        input[..len].copy_from_slice(&block[..len]);

        let mut spectrum = self.r2c.make_output_vec();
        self.r2c
            .process(&mut input, &mut spectrum)
            .map_err(|e| FilterError::Config(e.to_string()))?;
        for (b, h) in spectrum.iter_mut().zip(self.half_spectrum.iter()) {
            *b *= h;
        }
        // DC (and Nyquist for even sizes) are real for a real result
        spectrum[0].im = 0.0;
        if self.n_fft % 2 == 0 {
            let last = spectrum.len() - 1;
            spectrum[last].im = 0.0;
        }

        let mut output = self.c2r.make_output_vec();
        self.c2r
            .process(&mut spectrum, &mut output)
            .map_err(|e| FilterError::Config(e.to_string()))?;

        let scale = 1.0 / self.n_fft as f64;
        for v in output.iter_mut() {
            *v *= scale;
        }
        Ok(output)
    }
}
