//! Python bindings for resampling and detrending

use super::run_on_array;
use crate::exec::Executor;
use crate::resample::DEFAULT_NPAD;
use numpy::PyArray2;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Resample along the last axis by `up / down`
#[pyfunction]
#[pyo3(signature = (x, up, down, npad=DEFAULT_NPAD, n_jobs=1))]
pub fn resample<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    up: f64,
    down: f64,
    npad: usize,
    n_jobs: usize,
) -> PyResult<&'py PyArray2<f64>> {
    let data = x.readonly().as_array().to_owned().into_dyn();
    let out = crate::resample::resample(&data, up, down, npad, &Executor::from_n_jobs(n_jobs))?;
    let out = out
        .into_dimensionality::<ndarray::Ix2>()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(PyArray2::from_owned_array(py, out))
}

/// Remove the mean (`order=0`) or linear trend (`order=1`) of each channel
#[pyfunction]
#[pyo3(signature = (x, order=1, copy=true))]
pub fn detrend<'py>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    order: usize,
    copy: bool,
) -> PyResult<&'py PyArray2<f64>> {
    let (out, ()) = run_on_array(py, x, copy, |data| crate::detrend::detrend(data, order))?;
    Ok(out)
}
