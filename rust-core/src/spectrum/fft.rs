//! FFT engine using realfft for real-valued signals

use crate::error::{FilterError, Result};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex64>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();

        Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
        }
    }

    /// Compute the non-negative frequency half of the spectrum
    ///
    /// # Arguments
    /// * `signal` - Input signal (zero-padded or truncated to `fft_size`)
    ///
    /// # Returns
    /// X[k] for k = 0..=fft_size/2
    pub fn compute_spectrum(&mut self, signal: &[f64]) -> Result<Vec<Complex64>> {
        let copy_len = signal.len().min(self.fft_size);
        self.input_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        if copy_len < self.fft_size {
            self.input_buffer[copy_len..].fill(0.0);
        }

        self.r2c
            .process(&mut self.input_buffer, &mut self.output_buffer)
            .map_err(|e| FilterError::Config(format!("FFT processing failed: {}", e)))?;

        Ok(self.output_buffer.clone())
    }

    /// Compute power spectrum (magnitude squared)
    pub fn compute_power(&mut self, signal: &[f64]) -> Result<Vec<f64>> {
        Ok(self
            .compute_spectrum(signal)?
            .iter()
            .map(|c| c.norm_sqr())
            .collect())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of strictly non-negative frequencies, excluding Nyquist for
    /// even sizes: (fft_size + 1) / 2
    pub fn num_positive_bins(&self) -> usize {
        self.fft_size.div_ceil(2)
    }

    /// Convert bin index to Hz
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }

    /// Frequencies (Hz) of the first [`num_positive_bins`](Self::num_positive_bins) bins
    pub fn positive_frequencies(&self, sample_rate: f64) -> Vec<f64> {
        (0..self.num_positive_bins())
            .map(|bin| self.bin_to_hz(bin, sample_rate))
            .collect()
    }
}
