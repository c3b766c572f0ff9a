//! Block-size selection for overlap-add filtering

use crate::error::{FilterError, Result};
use log::{debug, warn};

/// Segmentation shared by every channel of one overlap-add call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// FFT block size
    pub fft_size: usize,
    /// Valid (non-overlapping) input samples per block: `fft_size - n_h + 1`
    pub segment_length: usize,
    /// Number of blocks covering the extended signal
    pub segment_count: usize,
    /// Mirror edge width: each end is extended by `edge_width - 1` samples
    pub edge_width: usize,
    /// Two passes (forward + time-reversed) instead of one
    pub zero_phase: bool,
}

impl ExecutionPlan {
    /// Plan overlap-add filtering of `n_samples`-long channels with a kernel of
    /// `filter_length` taps
    ///
    /// `fft_size` overrides the cost search. It must be at least
    /// `filter_length`; a non-power-of-two size only triggers a warning.
    pub fn new(
        filter_length: usize,
        n_samples: usize,
        zero_phase: bool,
        fft_size: Option<usize>,
    ) -> Result<Self> {
        if filter_length == 0 {
            return Err(FilterError::InvalidSpecification(
                "filter length must be positive".into(),
            ));
        }
        let edge_width = filter_length.min(n_samples).max(1);
        let n_x = extended_length(n_samples, edge_width);

        let fft_size = match fft_size {
            Some(n) => n,
            None => optimal_fft_size(filter_length, n_x, zero_phase),
        };
        if fft_size < filter_length {
            return Err(FilterError::FftTooShort {
                n_fft: fft_size,
                filter_length,
            });
        }
        if !fft_size.is_power_of_two() {
            warn!("FFT length {} is not a power of 2. Can be slower.", fft_size);
        }

        let segment_length = fft_size - filter_length + 1;
        let segment_count = n_x.div_ceil(segment_length);
        debug!(
            "overlap-add plan: n_h={} n_x={} n_fft={} n_seg={} segments={}",
            filter_length, n_x, fft_size, segment_length, segment_count
        );

        Ok(Self {
            fft_size,
            segment_length,
            segment_count,
            edge_width,
            zero_phase,
        })
    }

    /// Length of a channel after mirror extension
    pub fn extended_length(&self, n_samples: usize) -> usize {
        extended_length(n_samples, self.edge_width)
    }
}

fn extended_length(n_samples: usize, edge_width: usize) -> usize {
    n_samples + 2 * edge_width.min(n_samples).saturating_sub(1)
}

/// Power-of-two FFT size minimizing the approximate total work
///
/// Each candidate `N` processes `ceil(n_tot / (N - n_h + 1))` blocks at a cost
/// of `N (log2 N + 1)` each; `n_tot` doubles for zero-phase filtering. When the
/// signal is no longer than the kernel a single block large enough for the
/// full linear convolution is used.
pub fn optimal_fft_size(n_h: usize, n_x: usize, zero_phase: bool) -> usize {
    let n_tot = if zero_phase { 2 * n_x } else { n_x };
    let single_block = (n_x + n_h).saturating_sub(1).max(1).next_power_of_two();
    if n_x <= n_h {
        return single_block;
    }

    let lo = n_h.next_power_of_two().trailing_zeros();
    let hi = usize::BITS - 1 - n_tot.leading_zeros();

    (lo..=hi)
        .map(|k| {
            let n = 1usize << k;
            let blocks = n_tot.div_ceil(n - n_h + 1) as f64;
            (n, blocks * n as f64 * (k as f64 + 1.0))
        })
        .fold(None, |best: Option<(usize, f64)>, (n, cost)| match best {
            Some((_, best_cost)) if best_cost <= cost => best,
            _ => Some((n, cost)),
        })
        .map(|(n, _)| n)
        .unwrap_or(single_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(n_h: usize, n_x: usize, zero_phase: bool) -> usize {
        let n_tot = if zero_phase { 2 * n_x } else { n_x };
        let mut best = (0, f64::INFINITY);
        let mut n = n_h.next_power_of_two();
        while n <= n_tot {
            let cost = ((n_tot as f64) / ((n - n_h + 1) as f64)).ceil()
                * n as f64
                * ((n as f64).log2() + 1.0);
            if cost < best.1 {
                best = (n, cost);
            }
            n *= 2;
        }
        best.0
    }

    #[test]
    fn test_cost_minimum_matches_search() {
        for &(n_h, n_x) in &[(101, 10_000), (1001, 50_000), (513, 1500), (64, 1 << 16), (4097, 1 << 20)] {
            for zero_phase in [false, true] {
                let n = optimal_fft_size(n_h, n_x, zero_phase);
                assert!(n.is_power_of_two());
                assert!(n >= n_h);
                assert_eq!(n, brute_force(n_h, n_x, zero_phase), "n_h={} n_x={}", n_h, n_x);
            }
        }
    }

    #[test]
    fn test_long_signal_prefers_moderate_blocks() {
        // Blocks far larger than the kernel, far smaller than the signal
        let n = optimal_fft_size(1001, 1_000_000, true);
        assert!(n > 2048 && n < 1_000_000);
    }

    #[test]
    fn test_single_block_fallback() {
        assert_eq!(optimal_fft_size(1000, 800, true), 2048);
        assert_eq!(optimal_fft_size(1000, 1000, false), 2048);
    }

    #[test]
    fn test_plan_segmentation() {
        let plan = ExecutionPlan::new(101, 10_000, true, None).unwrap();
        assert_eq!(plan.edge_width, 101);
        let n_x = plan.extended_length(10_000);
        assert_eq!(n_x, 10_200);
        assert_eq!(plan.segment_length, plan.fft_size - 100);
        assert_eq!(plan.segment_count, n_x.div_ceil(plan.segment_length));
        assert!(plan.segment_count * plan.segment_length >= n_x);
    }

    #[test]
    fn test_explicit_fft_size() {
        let plan = ExecutionPlan::new(101, 1000, false, Some(300)).unwrap();
        assert_eq!(plan.fft_size, 300);
        assert_eq!(plan.segment_length, 200);

        assert_eq!(
            ExecutionPlan::new(101, 1000, true, Some(64)),
            Err(FilterError::FftTooShort {
                n_fft: 64,
                filter_length: 101
            })
        );
    }

    #[test]
    fn test_short_channel_edge_width() {
        let plan = ExecutionPlan::new(101, 40, true, None).unwrap();
        assert_eq!(plan.edge_width, 40);
        assert_eq!(plan.extended_length(40), 40 + 78);
    }
}
