//! Band-limited resampling along the last axis
//!
//! Channels are padded with their edge values, passed through a windowed-sinc
//! resampler and trimmed back so the output holds `round(n * up / down)`
//! samples aligned with the input.

use crate::error::{FilterError, Result};
use crate::exec::Executor;
use crate::signal::{n_samples, to_rows, Sample};
use log::{debug, warn};
use ndarray::{Array2, ArrayD, IxDyn};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Default number of edge samples added at each end
pub const DEFAULT_NPAD: usize = 100;

const CHUNK_SIZE: usize = 1024;

const SINC_LEN: usize = 256;

/// Head paddings tried when snapping the output grid onto an input sample
const ALIGN_SEARCH: usize = 64;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

fn new_resampler(ratio: f64, channels: usize) -> Result<SincFixedIn<f64>> {
    SincFixedIn::<f64>::new(ratio, 1.0, sinc_parameters(), CHUNK_SIZE, channels)
        .map_err(|e| FilterError::Resample(e.to_string()))
}

/// Input time (in samples) of output `k` of a fresh resampler is
/// `k / ratio + offset`; returns `offset`
///
/// Measured by resampling a ramp next to a constant: their ratio is the
/// interpolation position of each output, independent of the kernel gain.
fn output_offset(ratio: f64) -> Result<f64> {
    let mut resampler = new_resampler(ratio, 2)?;
    let settle = 2 * SINC_LEN + (2.0 / ratio).ceil() as usize;
    let mut fed = 0;
    let mut produced = 0;
    loop {
        let frames = resampler.input_frames_next();
        let ramp: Vec<f64> = (fed..fed + frames).map(|j| j as f64).collect();
        let ones = vec![1.0; frames];
        let out = resampler
            .process(&[ramp, ones][..], None)
            .map_err(|e| FilterError::Resample(e.to_string()))?;
        fed += frames;
        produced += out[0].len();
        if fed < settle {
            continue;
        }
        if let (Some(&t), Some(&w)) = (out[0].last(), out[1].last()) {
            return Ok(t / w - (produced - 1) as f64 / ratio);
        }
    }
}

/// Padding and trimming for one resampling ratio, shared by every channel
#[derive(Debug, Clone, Copy)]
struct ResamplePlan {
    ratio: f64,
    head: usize,
    tail: usize,
    skip: usize,
}

impl ResamplePlan {
    /// Pads are at least `npad` plus one sinc length so the resampler's
    /// zero history and flush never reach the kept samples. The head length is
    /// chosen so the first kept output falls on the first input sample.
    fn new(ratio: f64, npad: usize) -> Result<Self> {
        let offset = output_offset(ratio)?;
        let guard = npad + SINC_LEN;
        let head_min = guard.max(offset.ceil().max(0.0) as usize);
        let misalignment = |head: usize| {
            let skip = ratio * (head as f64 - offset);
            (skip - skip.round()).abs()
        };
        let head = (head_min..head_min + ALIGN_SEARCH)
            .min_by(|&a, &b| misalignment(a).total_cmp(&misalignment(b)))
            .unwrap_or(head_min);
        let skip = (ratio * (head as f64 - offset)).round() as usize;
        debug!(
            "Resampling by {}: head {}, skip {}, misalignment {:.4} samples",
            ratio,
            head,
            skip,
            misalignment(head)
        );
        Ok(Self {
            ratio,
            head,
            tail: guard,
            skip,
        })
    }

    fn apply(&self, x: &[f64]) -> Result<Vec<f64>> {
        let n = x.len();
        let target = (n as f64 * self.ratio).round() as usize;
        let (Some(&first), Some(&last)) = (x.first(), x.last()) else {
            return Ok(Vec::new());
        };

        let mut padded = Vec::with_capacity(n + self.head + self.tail);
        padded.extend(std::iter::repeat(first).take(self.head));
        padded.extend_from_slice(x);
        padded.extend(std::iter::repeat(last).take(self.tail));

        let mut resampler = new_resampler(self.ratio, 1)?;
        let needed = self.skip + target;

        let mut output: Vec<f64> = Vec::with_capacity(needed + CHUNK_SIZE);
        let mut pos = 0;
        while padded.len() - pos >= resampler.input_frames_next() {
            let frames = resampler.input_frames_next();
            let chunk = [&padded[pos..pos + frames]];
            let out = resampler
                .process(&chunk[..], None)
                .map_err(|e| FilterError::Resample(e.to_string()))?;
            output.extend_from_slice(&out[0]);
            pos += frames;
        }
        if pos < padded.len() {
            let chunk = [&padded[pos..]];
            let out = resampler
                .process_partial(Some(&chunk[..]), None)
                .map_err(|e| FilterError::Resample(e.to_string()))?;
            output.extend_from_slice(&out[0]);
        }
        // Flush the delay line
        while output.len() < needed {
            let out = resampler
                .process_partial::<Vec<f64>>(None, None)
                .map_err(|e| FilterError::Resample(e.to_string()))?;
            if out[0].is_empty() {
                break;
            }
            output.extend_from_slice(&out[0]);
        }

        let mut y: Vec<f64> = output.into_iter().skip(self.skip).take(target).collect();
        // Never short in practice; pad with the edge value if the resampler was
        y.resize(target, last);
        Ok(y)
    }
}

/// Resample one channel by `ratio`, returning `round(len * ratio)` samples
pub fn resample_channel(x: &[f64], ratio: f64, npad: usize) -> Result<Vec<f64>> {
    if x.is_empty() {
        return Ok(Vec::new());
    }
    ResamplePlan::new(ratio, npad)?.apply(x)
}

/// Resample `x` along its last axis by `up / down`
///
/// The output has the same leading shape and precision as `x`. A zero-length
/// last axis is returned unchanged with a warning.
pub fn resample<T: Sample>(
    x: &ArrayD<T>,
    up: f64,
    down: f64,
    npad: usize,
    executor: &Executor,
) -> Result<ArrayD<T>> {
    let ratio = up / down;
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(FilterError::InvalidSpecification(format!(
            "resampling ratio must be positive, got {}/{}",
            up, down
        )));
    }
    let n = n_samples(x);
    if n == 0 || x.ndim() == 0 {
        warn!("x has zero length along the last axis, returning a copy of x");
        return Ok(x.clone());
    }

    let rows = to_rows(x)?;
    let target = (n as f64 * ratio).round() as usize;
    let plan = ResamplePlan::new(ratio, npad)?;
    let channels: Vec<Vec<f64>> = rows.rows().into_iter().map(|r| r.to_vec()).collect();
    let n_rows = channels.len();
    let resampled = executor
        .map(channels, |ch| plan.apply(&ch))?
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    let flat: Vec<f64> = resampled.into_iter().flatten().collect();
    let out_rows = Array2::from_shape_vec((n_rows, target), flat)
        .map_err(|e| FilterError::Config(e.to_string()))?;

    let mut shape = x.shape().to_vec();
    if let Some(last) = shape.last_mut() {
        *last = target;
    }
    let values: Vec<T> = out_rows.iter().map(|&v| T::from_f64(v)).collect();
    ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| FilterError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq: f64, sfreq: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / sfreq).sin())
            .collect()
    }

    #[test]
    fn test_downsample_keeps_alignment() {
        let x = sine(10.0, 1000.0, 3000);
        let y = resample_channel(&x, 0.5, DEFAULT_NPAD).unwrap();
        assert_eq!(y.len(), 1500);
        let expected = sine(10.0, 500.0, 1500);
        for i in 200..1300 {
            assert!((y[i] - expected[i]).abs() < 1e-2, "sample {}: {} vs {}", i, y[i], expected[i]);
        }
    }

    #[test]
    fn test_upsample_length_and_constant() {
        let y = resample_channel(&vec![1.5; 777], 3.0, 50).unwrap();
        assert_eq!(y.len(), 2331);
        // Edges included: the padding keeps the resampler's zero state away
        for (i, v) in y.iter().enumerate() {
            assert!((v - 1.5).abs() < 1e-3, "sample {}: {}", i, v);
        }
    }

    #[test]
    fn test_fractional_ratio_keeps_alignment() {
        let x = sine(10.0, 1000.0, 3000);
        let y = resample_channel(&x, 0.75, DEFAULT_NPAD).unwrap();
        assert_eq!(y.len(), 2250);
        let expected = sine(10.0, 750.0, 2250);
        for i in 200..2050 {
            assert!((y[i] - expected[i]).abs() < 1e-2, "sample {}: {} vs {}", i, y[i], expected[i]);
        }
    }

    #[test]
    fn test_output_offset_is_sub_sample_for_unit_ratio() {
        let offset = output_offset(1.0).unwrap();
        assert!(offset.abs() < 0.1, "offset {}", offset);
        let plan = ResamplePlan::new(1.0, 10).unwrap();
        assert_eq!(plan.skip, plan.head);
        let x = sine(7.0, 100.0, 500);
        let y = plan.apply(&x).unwrap();
        for i in 10..490 {
            assert!((y[i] - x[i]).abs() < 1e-2, "sample {}: {} vs {}", i, y[i], x[i]);
        }
    }

    #[test]
    fn test_resample_array_shape_and_precision() {
        let x = ArrayD::<f32>::from_shape_fn(IxDyn(&[2, 3, 400]), |idx| {
            (idx[2] as f32 * 0.05).sin() + idx[0] as f32
        });
        let y = resample(&x, 1.0, 4.0, 20, &Executor::Threads(2)).unwrap();
        assert_eq!(y.shape(), &[2, 3, 100]);

        let empty = ArrayD::<f64>::zeros(IxDyn(&[3, 0]));
        assert_eq!(resample(&empty, 2.0, 1.0, 10, &Executor::Serial).unwrap().shape(), &[3, 0]);

        assert!(matches!(
            resample(&x, 1.0, 0.0, 10, &Executor::Serial),
            Err(FilterError::InvalidSpecification(_))
        ));
    }
}
