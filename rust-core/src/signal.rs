//! Channel layout and sample precision handling
//!
//! Every entry point accepts an array of shape (..., n_samples). Leading axes are
//! flattened into independent channel rows, processed in `f64`, and written back
//! in the caller's precision.

use ndarray::{Array2, ArrayD};

use crate::error::{FilterError, Result};

/// Floating-point sample types accepted by the filters
pub trait Sample: Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for f64 {
    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Sample for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Number of samples along the operating (last) axis
pub fn n_samples<T>(x: &ArrayD<T>) -> usize {
    x.shape().last().copied().unwrap_or(1)
}

/// Flatten (..., n) into an (n_channels, n) matrix of `f64`
///
/// A 0-d array is treated as a single channel holding one sample.
pub fn to_rows<T: Sample>(x: &ArrayD<T>) -> Result<Array2<f64>> {
    let n = n_samples(x);
    let n_rows = match x.ndim() {
        0 => 1,
        d => x.shape()[..d - 1].iter().product(),
    };
    // `iter` walks in logical (row-major) order whatever the memory layout
    let flat: Vec<f64> = x.iter().map(|v| v.to_f64()).collect();
    Array2::from_shape_vec((n_rows, n), flat).map_err(|e| FilterError::Config(e.to_string()))
}

/// Write a processed channel matrix back into the original array
pub fn write_rows<T: Sample>(x: &mut ArrayD<T>, rows: &Array2<f64>) {
    for (dst, &src) in x.iter_mut().zip(rows.iter()) {
        *dst = T::from_f64(src);
    }
}

/// Validate channel picks, defaulting to every row
pub fn resolve_picks(picks: Option<&[usize]>, n_channels: usize) -> Result<Vec<usize>> {
    match picks {
        None => Ok((0..n_channels).collect()),
        Some(p) => {
            if let Some(&bad) = p.iter().find(|&&idx| idx >= n_channels) {
                return Err(FilterError::PickOutOfRange {
                    pick: bad,
                    n_channels,
                });
            }
            Ok(p.to_vec())
        }
    }
}

/// Odd (point-symmetric) mirror extension by `edge - 1` samples on each side
///
/// `ext[i] = 2*x[0] - x[edge-1-i]` at the head and the mirror image at the tail,
/// so a locally affine signal continues with the same slope across the splice.
pub fn odd_extend(x: &[f64], edge: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let pad = edge.min(n).saturating_sub(1);
    let first = x[0];
    let last = x[n - 1];

    let mut ext = Vec::with_capacity(n + 2 * pad);
    ext.extend((1..=pad).rev().map(|i| 2.0 * first - x[i]));
    ext.extend_from_slice(x);
    ext.extend((1..=pad).map(|i| 2.0 * last - x[n - 1 - i]));
    ext
}
