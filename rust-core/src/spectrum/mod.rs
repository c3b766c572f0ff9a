//! Spectral estimation with FFT and DPSS tapers

pub mod fft;
pub mod multitaper;

pub use fft::FftEngine;
pub use multitaper::{mt_spectra, TaperSet, TaperedSpectra};
