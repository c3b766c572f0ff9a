//! Error types for filter design and application

use thiserror::Error;

/// Errors raised before any sample is touched
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("Unknown method '{0}' (expected one of: fft, iir, spectrum_fit)")]
    UnknownMethod(String),

    #[error("Method '{method}' is not supported for {operation}")]
    UnsupportedMethod { method: String, operation: &'static str },

    #[error("{left} and {right} must be the same length ({left_len} vs {right_len})")]
    LengthMismatch {
        left: &'static str,
        right: &'static str,
        left_len: usize,
        right_len: usize,
    },

    #[error("FFT length {n_fft} is too short, has to be at least the filter length {filter_length}")]
    FftTooShort { n_fft: usize, filter_length: usize },

    #[error("Filter specification invalid: {0}")]
    InvalidSpecification(String),

    #[error("Stop bands are not sufficiently separated")]
    BandsNotSeparated,

    #[error("Filter length {length} does not match gain {gain} at Nyquist (gain 0 needs an even length, gain 1 an odd length)")]
    NyquistParity { length: usize, gain: f64 },

    #[error("Sampling rate must be positive, got {0}")]
    InvalidSampleRate(f64),

    #[error("Missing design parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Channel pick {pick} out of range for {n_channels} channels")]
    PickOutOfRange { pick: usize, n_channels: usize },

    #[error("Detrend order must be 0 or 1, got {0}")]
    InvalidDetrendOrder(usize),

    #[error("Invalid IIR coefficients for {frequency} Hz at sampling rate {sfreq} Hz")]
    InvalidIirCoefficients { frequency: f64, sfreq: f64 },

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Worker pool could not be created: {0}")]
    WorkerPool(String),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, FilterError>;
