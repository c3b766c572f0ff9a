//! FFT-based overlap-add filtering for long FIR kernels
//!
//! Each channel is mirror-extended, cut into `segment_length` blocks,
//! multiplied block-wise in the frequency domain and summed back at strided
//! offsets. Zero-phase filtering runs the same pass a second time on the
//! time-reversed output, with the kernel magnitude pre-scaled by `1/sqrt|H|` so
//! the combined amplitude response equals `|H|`.

use super::plan::ExecutionPlan;
use crate::error::{FilterError, Result};
use crate::exec::{real_spectrum, Executor, FftBackend, SpectralMultiply};
use crate::signal::odd_extend;
use ndarray::Array2;

/// Bins with a smaller magnitude are left unscaled for zero-phase filtering
const MIN_SCALED_MAGNITUDE: f64 = 1e-6;

/// Overlap-add filter for channels of one fixed length
///
/// The kernel spectrum and plan are built once and shared by every channel.
pub struct OverlapAddEngine {
    filter_length: usize,
    plan: ExecutionPlan,
    multiplier: Box<dyn SpectralMultiply>,
}

impl OverlapAddEngine {
    /// Prepare filtering of `n_samples`-long channels with kernel `h`
    ///
    /// # Arguments
    /// * `h` - Filter coefficients
    /// * `n_samples` - Channel length
    /// * `zero_phase` - Forward-backward application
    /// * `fft_size` - Block size; chosen by cost minimization when `None`
    /// * `backend` - Spectral multiply implementation
    pub fn new(
        h: &[f64],
        n_samples: usize,
        zero_phase: bool,
        fft_size: Option<usize>,
        backend: FftBackend,
    ) -> Result<Self> {
        let plan = ExecutionPlan::new(h.len(), n_samples, zero_phase, fft_size)?;

        let mut h_fft = real_spectrum(h, plan.fft_size);
        if zero_phase {
            for bin in h_fft.iter_mut() {
                let mag = bin.norm();
                if mag > MIN_SCALED_MAGNITUDE {
                    *bin /= mag.sqrt();
                }
            }
        }

        Ok(Self {
            filter_length: h.len(),
            plan,
            multiplier: backend.multiplier(h_fft),
        })
    }

    /// Segmentation used for every channel
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Kernel length
    pub fn filter_length(&self) -> usize {
        self.filter_length
    }

    /// Filter one channel, returning a vector of the same length
    pub fn filter_channel(&self, x: &[f64]) -> Result<Vec<f64>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let edge = self.plan.edge_width.min(x.len());
        let ext = odd_extend(x, edge);
        let n_x = ext.len();
        if n_x != self.plan.extended_length(x.len()) {
            return Err(FilterError::LengthMismatch {
                left: "channel",
                right: "plan",
                left_len: n_x,
                right_len: self.plan.extended_length(x.len()),
            });
        }

        let mut filtered = self.pass(&ext)?;
        if self.plan.zero_phase {
            filtered.reverse();
            filtered = self.pass(&filtered)?;
        }

        // Remove mirrored edges
        let pad = edge - 1;
        let mut out = filtered[pad..n_x - pad].to_vec();
        if self.plan.zero_phase {
            out.reverse();
        }
        Ok(out)
    }

    /// One causal overlap-add pass over an extended channel
    fn pass(&self, input: &[f64]) -> Result<Vec<f64>> {
        let n_x = input.len();
        let n_seg = self.plan.segment_length;
        let mut output = vec![0.0; n_x];

        for seg_idx in 0..self.plan.segment_count {
            let start = seg_idx * n_seg;
            if start >= n_x {
                break;
            }
            let stop = (start + n_seg).min(n_x);
            let block = self.multiplier.multiply(&input[start..stop])?;

            // Overlap-add, truncated at the extended length
            let len = block.len().min(n_x - start);
            for (dst, &src) in output[start..start + len].iter_mut().zip(block.iter()) {
                *dst += src;
            }
        }
        Ok(output)
    }
}

/// Filter the picked rows of `rows` in place with kernel `h`
pub fn overlap_add_filter(
    rows: &mut Array2<f64>,
    picks: &[usize],
    h: &[f64],
    zero_phase: bool,
    fft_size: Option<usize>,
    backend: FftBackend,
    executor: &Executor,
) -> Result<()> {
    let engine = OverlapAddEngine::new(h, rows.ncols(), zero_phase, fft_size, backend)?;
    executor.apply_rows(rows, picks, |row| engine.filter_channel(row))
}
