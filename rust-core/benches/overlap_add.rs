//! Performance benchmarks for the FFT filtering engines
//!
//! Run with: cargo bench -p timeseries-filter-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::{ArrayD, IxDyn};
use timeseries_filter::filters::{firwin2, FrequencyResponseSpec, OverlapAddEngine, WindowType};
use timeseries_filter::{low_pass_filter, Executor, FftBackend, FilterOptions};

const SFREQ: f64 = 1000.0;

fn signal(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (i as f64 * 0.013).sin() + 0.3 * (i as f64 * 0.71).cos())
        .collect()
}

fn benchmark_overlap_add_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("overlap_add_channel");
    let spec = FrequencyResponseSpec::low_pass(SFREQ, 40.0, 5.0).unwrap();
    let h = firwin2(1002, &spec, WindowType::Hamming).unwrap();

    for n in [10_000, 100_000] {
        let x = signal(n);
        group.throughput(Throughput::Elements(n as u64));
        for backend in [FftBackend::Portable, FftBackend::Accelerated] {
            let engine = OverlapAddEngine::new(&h, n, true, None, backend).unwrap();
            group.bench_with_input(BenchmarkId::new(format!("{:?}", backend), n), &x, |b, x| {
                b.iter(|| engine.filter_channel(black_box(x)).unwrap());
            });
        }
    }
    group.finish();
}

fn benchmark_multichannel(c: &mut Criterion) {
    let mut group = c.benchmark_group("low_pass_64_channels");
    let n = 20_000;
    let x = ArrayD::from_shape_fn(IxDyn(&[64, n]), |idx| {
        ((idx[1] as f64) * 0.01 * (1.0 + idx[0] as f64 * 0.1)).sin()
    });

    for executor in [Executor::Serial, Executor::Threads(4)] {
        let opts = FilterOptions {
            filter_length: Some(1001),
            executor,
            ..Default::default()
        };
        group.bench_function(format!("{:?}", executor), |b| {
            b.iter(|| low_pass_filter(black_box(&x), SFREQ, 40.0, &opts).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_overlap_add_channel, benchmark_multichannel);
criterion_main!(benches);
