//! Timeseries Filter - Multichannel Time-Series Filtering Core
//!
//! Zero-phase FIR filtering (single-block and overlap-add), IIR
//! forward-backward filtering, multitaper line-noise removal, resampling and
//! detrending along the last axis of n-dimensional arrays, with optional Python
//! bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod config;
pub mod detrend;
pub mod error;
pub mod exec;
pub mod filtering;
pub mod filters;
pub mod line_noise;
pub mod resample;
pub mod signal;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use config::{FilterOptions, Method, NotchOptions, SpectrumFitOptions};
pub use error::{FilterError, Result};
pub use exec::{Executor, FftBackend};
pub use filtering::{
    band_pass_filter, band_pass_filter_inplace, band_stop_filter, band_stop_filter_inplace,
    filter_data, filter_data_inplace, high_pass_filter, high_pass_filter_inplace,
    low_pass_filter, low_pass_filter_inplace, notch_filter, notch_filter_inplace,
};
pub use line_noise::DetectedLine;
pub use signal::Sample;
