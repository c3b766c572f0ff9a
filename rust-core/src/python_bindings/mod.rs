//! PyO3 bindings for Python integration

use crate::error::FilterError;
use ndarray::{ArrayD, Ix2};
use numpy::PyArray2;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

mod filter_bindings;
mod signal_bindings;

impl From<FilterError> for PyErr {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Resample(_) | FilterError::WorkerPool(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// Run `f` on an owned copy of `x`, then return the copy or write it back
pub(crate) fn run_on_array<'py, R, F>(
    py: Python<'py>,
    x: &'py PyArray2<f64>,
    copy: bool,
    f: F,
) -> PyResult<(&'py PyArray2<f64>, R)>
where
    F: FnOnce(&mut ArrayD<f64>) -> crate::error::Result<R>,
{
    let mut data = x.readonly().as_array().to_owned().into_dyn();
    let out = f(&mut data)?;
    let data = data
        .into_dimensionality::<Ix2>()
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    if copy {
        Ok((PyArray2::from_owned_array(py, data), out))
    } else {
        x.readwrite().as_array_mut().assign(&data);
        Ok((x, out))
    }
}

/// Python module definition
#[pymodule]
fn timeseries_filter(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(filter_bindings::band_pass_filter, m)?)?;
    m.add_function(wrap_pyfunction!(filter_bindings::band_stop_filter, m)?)?;
    m.add_function(wrap_pyfunction!(filter_bindings::low_pass_filter, m)?)?;
    m.add_function(wrap_pyfunction!(filter_bindings::high_pass_filter, m)?)?;
    m.add_function(wrap_pyfunction!(filter_bindings::filter_data, m)?)?;
    m.add_function(wrap_pyfunction!(filter_bindings::notch_filter, m)?)?;
    m.add_function(wrap_pyfunction!(signal_bindings::resample, m)?)?;
    m.add_function(wrap_pyfunction!(signal_bindings::detrend, m)?)?;
    Ok(())
}
