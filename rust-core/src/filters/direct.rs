//! Single-block frequency-domain filtering
//!
//! The kernel is as long as the channel and applied as its magnitude response,
//! which makes the filter zero-phase without a second pass.

use super::attenuation::{verify_attenuation, AttenuationWarning};
use super::design::{firwin2, nyquist_parity_ok, FrequencyResponseSpec};
use super::windows::WindowType;
use crate::error::Result;
use crate::exec::{real_spectrum, Executor, FftBackend, SpectralMultiply};
use ndarray::Array2;
use num_complex::Complex64;

/// Zero-phase filter for channels of one fixed length
pub struct DirectFFTFilterEngine {
    n_samples: usize,
    extend: bool,
    multiplier: Box<dyn SpectralMultiply>,
    attenuation: Option<AttenuationWarning>,
}

impl DirectFFTFilterEngine {
    /// Design a kernel matching `n_samples` and keep its magnitude spectrum
    ///
    /// When the channel length has the wrong parity for the gain at Nyquist,
    /// the kernel is one sample longer and each channel is extended by
    /// repeating its last sample.
    pub fn new(
        spec: &FrequencyResponseSpec,
        n_samples: usize,
        sfreq: f64,
        window: WindowType,
        backend: FftBackend,
    ) -> Result<Self> {
        let extend = !nyquist_parity_ok(n_samples, spec.nyquist_gain());
        let n = n_samples + usize::from(extend);

        let h = firwin2(n, spec, window)?;
        let attenuation = verify_attenuation(&h, spec, sfreq, false);

        let magnitude: Vec<Complex64> = real_spectrum(&h, n)
            .iter()
            .map(|c| Complex64::new(c.norm(), 0.0))
            .collect();

        Ok(Self {
            n_samples,
            extend,
            multiplier: backend.multiplier(magnitude),
            attenuation,
        })
    }

    /// Whether channels are extended by one sample before filtering
    pub fn extends_signal(&self) -> bool {
        self.extend
    }

    /// Attenuation shortfall of the designed kernel, if any
    pub fn attenuation_warning(&self) -> Option<AttenuationWarning> {
        self.attenuation
    }

    pub fn filter_channel(&self, x: &[f64]) -> Result<Vec<f64>> {
        if self.extend {
            let mut ext = Vec::with_capacity(x.len() + 1);
            ext.extend_from_slice(x);
            ext.extend(x.last().copied());
            let mut y = self.multiplier.multiply(&ext)?;
            y.truncate(self.n_samples);
            Ok(y)
        } else {
            self.multiplier.multiply(x)
        }
    }
}

/// Filter the picked rows of `rows` in place with a kernel as long as the rows
pub fn direct_filter(
    rows: &mut Array2<f64>,
    picks: &[usize],
    spec: &FrequencyResponseSpec,
    sfreq: f64,
    window: WindowType,
    backend: FftBackend,
    executor: &Executor,
) -> Result<Option<AttenuationWarning>> {
    let engine = DirectFFTFilterEngine::new(spec, rows.ncols(), sfreq, window, backend)?;
    executor.apply_rows(rows, picks, |row| engine.filter_channel(row))?;
    Ok(engine.attenuation_warning())
}
