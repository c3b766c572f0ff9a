//! Python bindings for the filtering entry points
//!
//! Every function takes a 2-D float64 array (channels x samples) and returns
//! the filtered data, either as a new array (`copy=True`) or by writing into
//! the input.

use super::run_on_array;
use crate::config::{FilterOptions, Method, NotchOptions};
use crate::exec::Executor;
use crate::filtering;
use numpy::PyArray2;
use pyo3::prelude::*;

fn options(
    filter_length: Option<usize>,
    l_trans_bandwidth: f64,
    h_trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
) -> PyResult<FilterOptions> {
    Ok(FilterOptions {
        filter_length,
        l_trans_bandwidth,
        h_trans_bandwidth,
        method: method.parse::<Method>()?,
        picks,
        executor: Executor::from_n_jobs(n_jobs),
        ..Default::default()
    })
}

/// Band-pass filter between `fp1` and `fp2` (Hz)
#[pyfunction]
#[pyo3(signature = (x, sfreq, fp1, fp2, filter_length=None, l_trans_bandwidth=0.5, h_trans_bandwidth=0.5, method="fft", picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn band_pass_filter<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    fp1: f64,
    fp2: f64,
    filter_length: Option<usize>,
    l_trans_bandwidth: f64,
    h_trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let opts = options(filter_length, l_trans_bandwidth, h_trans_bandwidth, method, picks, n_jobs)?;
    let (out, ()) = run_on_array(py, x, copy, |data| {
        filtering::band_pass_filter_inplace(data, sfreq, fp1, fp2, &opts)
    })?;
    Ok(out)
}

/// Band-stop filter with one stop band per (`fp1[i]`, `fp2[i]`) pair (Hz)
#[pyfunction]
#[pyo3(signature = (x, sfreq, fp1, fp2, filter_length=None, l_trans_bandwidth=0.5, h_trans_bandwidth=0.5, method="fft", picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn band_stop_filter<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    fp1: Vec<f64>,
    fp2: Vec<f64>,
    filter_length: Option<usize>,
    l_trans_bandwidth: f64,
    h_trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let opts = options(filter_length, l_trans_bandwidth, h_trans_bandwidth, method, picks, n_jobs)?;
    let (out, ()) = run_on_array(py, x, copy, |data| {
        filtering::band_stop_filter_inplace(data, sfreq, &fp1, &fp2, &opts)
    })?;
    Ok(out)
}

/// Low-pass filter with passband edge `fp` (Hz)
#[pyfunction]
#[pyo3(signature = (x, sfreq, fp, filter_length=None, trans_bandwidth=0.5, method="fft", picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn low_pass_filter<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    fp: f64,
    filter_length: Option<usize>,
    trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let opts = options(filter_length, trans_bandwidth, trans_bandwidth, method, picks, n_jobs)?;
    let (out, ()) = run_on_array(py, x, copy, |data| {
        filtering::low_pass_filter_inplace(data, sfreq, fp, &opts)
    })?;
    Ok(out)
}

/// High-pass filter with passband edge `fp` (Hz)
#[pyfunction]
#[pyo3(signature = (x, sfreq, fp, filter_length=None, trans_bandwidth=0.5, method="fft", picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn high_pass_filter<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    fp: f64,
    filter_length: Option<usize>,
    trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let opts = options(filter_length, trans_bandwidth, trans_bandwidth, method, picks, n_jobs)?;
    let (out, ()) = run_on_array(py, x, copy, |data| {
        filtering::high_pass_filter_inplace(data, sfreq, fp, &opts)
    })?;
    Ok(out)
}

/// High-pass, low-pass, band-pass or band-stop depending on the given edges
#[pyfunction]
#[pyo3(signature = (x, sfreq, l_freq, h_freq, filter_length=None, l_trans_bandwidth=0.5, h_trans_bandwidth=0.5, method="fft", picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn filter_data<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    filter_length: Option<usize>,
    l_trans_bandwidth: f64,
    h_trans_bandwidth: f64,
    method: &str,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let opts = options(filter_length, l_trans_bandwidth, h_trans_bandwidth, method, picks, n_jobs)?;
    let (out, ()) = run_on_array(py, x, copy, |data| {
        filtering::filter_data_inplace(data, sfreq, l_freq, h_freq, &opts)
    })?;
    Ok(out)
}

/// Notch filter or sinusoid removal
///
/// Returns `(filtered, lines)` where `lines[i]` lists the
/// `(frequency, amplitude, phase)` fitted on the i-th picked channel; empty
/// for the `fft` and `iir` methods.
#[pyfunction]
#[pyo3(signature = (x, sfreq, freqs=None, filter_length=None, notch_widths=None, trans_bandwidth=1.0, method="fft", mt_bandwidth=None, p_value=0.05, picks=None, n_jobs=1, copy=true))]
#[allow(clippy::too_many_arguments)]
pub fn notch_filter<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    sfreq: f64,
    freqs: Option<Vec<f64>>,
    filter_length: Option<usize>,
    notch_widths: Option<Vec<f64>>,
    trans_bandwidth: f64,
    method: &str,
    mt_bandwidth: Option<f64>,
    p_value: f64,
    picks: Option<Vec<usize>>,
    n_jobs: usize,
    copy: bool,
) -> PyResult<(&'py PyArray2<f64>, Vec<Vec<(f64, f64, f64)>>)> {
    let mut opts = NotchOptions {
        filter: options(filter_length, 0.5, 0.5, method, picks, n_jobs)?,
        notch_widths,
        trans_bandwidth,
        ..Default::default()
    };
    opts.spectrum_fit.mt_bandwidth = mt_bandwidth;
    opts.spectrum_fit.p_value = p_value;

    let (out, lines) = run_on_array(py, x, copy, |data| {
        filtering::notch_filter_inplace(data, sfreq, freqs.as_deref(), &opts)
    })?;
    let lines = lines
        .into_iter()
        .map(|channel| {
            channel
                .into_iter()
                .map(|l| (l.frequency, l.amplitude.norm(), l.phase))
                .collect()
        })
        .collect();
    Ok((out, lines))
}
