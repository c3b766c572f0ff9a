//! Integration tests for multitaper line-noise removal through `notch_filter`.

use ndarray::{ArrayD, IxDyn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use timeseries_filter::spectrum::FftEngine;
use timeseries_filter::{notch_filter, Method, NotchOptions};

const SFREQ: f64 = 1000.0;
const N: usize = 2000;
const LINES: [f64; 3] = [50.0, 100.0, 150.0];

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Three unit lines plus white Gaussian noise (sigma 0.5)
fn contaminated(seed: u64) -> ArrayD<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f64> = (0..N)
        .map(|i| {
            let t = i as f64 / SFREQ;
            let lines: f64 = LINES
                .iter()
                .enumerate()
                .map(|(k, f)| (2.0 * PI * f * t + 0.3 * k as f64).sin())
                .sum();
            // Box-Muller
            let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
            let u2: f64 = rng.gen();
            let noise = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            lines + 0.5 * noise
        })
        .collect();
    ArrayD::from_shape_vec(IxDyn(&[1, N]), data).unwrap()
}

fn power_spectrum(x: &ArrayD<f64>) -> Vec<f64> {
    let samples: Vec<f64> = x.iter().copied().collect();
    FftEngine::new(N).compute_power(&samples).unwrap()
}

fn band_power(power: &[f64], lo: f64, hi: f64) -> f64 {
    power
        .iter()
        .enumerate()
        .filter(|(k, _)| {
            let f = *k as f64 * SFREQ / N as f64;
            f >= lo && f <= hi
        })
        .map(|(_, p)| p)
        .sum()
}

#[test]
fn test_explicit_lines_are_removed() {
    init_logging();
    let x = contaminated(1);
    let opts = NotchOptions::default().with_method(Method::SpectrumFit);
    let (y, lines) = notch_filter(&x, SFREQ, Some(&LINES[..]), &opts).unwrap();

    assert_eq!(lines.len(), 1);
    for f in LINES {
        assert!(lines[0].iter().any(|l| (l.frequency - f).abs() < 1e-9));
    }

    let before = power_spectrum(&x);
    let after = power_spectrum(&y);
    for f in LINES {
        let k = (f * N as f64 / SFREQ) as usize;
        assert!(
            after[k] <= 0.05 * before[k],
            "{} Hz keeps {:.3} of its power",
            f,
            after[k] / before[k]
        );
    }

    // Power between the lines is untouched
    for f in [75.0, 125.0] {
        let change_db =
            10.0 * (band_power(&after, f - 5.0, f + 5.0) / band_power(&before, f - 5.0, f + 5.0)).log10();
        assert!(change_db.abs() < 1.0, "{} Hz band changed by {:.2} dB", f, change_db);
    }
}

#[test]
fn test_lines_are_detected_by_f_test() {
    init_logging();
    let opts = NotchOptions::default().with_method(Method::SpectrumFit);

    let mut spurious = 0;
    for seed in 0..20 {
        let x = contaminated(seed);
        let (_, lines) = notch_filter(&x, SFREQ, None, &opts).unwrap();
        let found: Vec<f64> = lines[0].iter().map(|l| l.frequency).collect();

        for f in LINES {
            assert!(
                found.iter().any(|d| (d - f).abs() <= 0.5),
                "seed {}: {} Hz not detected in {:?}",
                seed,
                f,
                found
            );
        }
        spurious += found
            .iter()
            .filter(|d| LINES.iter().all(|f| (*d - f).abs() > 6.0))
            .count();
    }
    assert!(spurious <= 1, "{} spurious detections", spurious);
}
