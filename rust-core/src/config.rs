//! Filter configuration
//!
//! Every option struct has sensible defaults and can be loaded from JSON, so a
//! pipeline can keep its filter settings next to its other parameters.

use crate::error::{FilterError, Result};
use crate::exec::{Executor, FftBackend};
use crate::filters::iir::IirParams;
use crate::filters::windows::WindowType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default transition bandwidth of the band edges (Hz)
pub const DEFAULT_TRANS_BANDWIDTH: f64 = 0.5;

/// Default transition bandwidth around notches (Hz)
pub const DEFAULT_NOTCH_TRANS_BANDWIDTH: f64 = 1.0;

/// Default F-test significance level
pub const DEFAULT_P_VALUE: f64 = 0.05;

/// Filtering algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// FIR by frequency sampling, applied with FFTs
    #[default]
    Fft,
    /// Butterworth IIR applied forward and backward
    Iir,
    /// Multitaper sinusoid fitting (notch only)
    SpectrumFit,
}

impl FromStr for Method {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fft" => Ok(Method::Fft),
            "iir" => Ok(Method::Iir),
            "spectrum_fit" => Ok(Method::SpectrumFit),
            _ => Err(FilterError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Fft => "fft",
            Method::Iir => "iir",
            Method::SpectrumFit => "spectrum_fit",
        };
        f.write_str(name)
    }
}

/// Options shared by the band-limiting filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// FIR length for overlap-add; channels not longer than this (or every
    /// channel when `None`) use a single-block kernel as long as the channel
    pub filter_length: Option<usize>,

    /// Transition width below the lower band edge (Hz); also used by high-pass
    pub l_trans_bandwidth: f64,

    /// Transition width above the upper band edge (Hz); also used by low-pass
    pub h_trans_bandwidth: f64,

    pub method: Method,

    /// Window of the FIR design
    pub window: WindowType,

    pub iir_params: IirParams,

    /// Rows to filter; every row when `None`
    pub picks: Option<Vec<usize>>,

    pub executor: Executor,

    pub fft_backend: FftBackend,

    /// Run overlap-add forward and backward
    pub zero_phase: bool,

    /// Overlap-add block size; chosen by cost when `None`
    pub fft_size: Option<usize>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            filter_length: None,
            l_trans_bandwidth: DEFAULT_TRANS_BANDWIDTH,
            h_trans_bandwidth: DEFAULT_TRANS_BANDWIDTH,
            method: Method::Fft,
            window: WindowType::Hamming,
            iir_params: IirParams::default(),
            picks: None,
            executor: Executor::Serial,
            fft_backend: FftBackend::Portable,
            zero_phase: true,
            fft_size: None,
        }
    }
}

impl FilterOptions {
    /// Parse options from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Config(e.to_string()))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_picks(mut self, picks: Vec<usize>) -> Self {
        self.picks = Some(picks);
        self
    }
}

/// Multitaper line fitting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumFitOptions {
    /// Taper bandwidth (Hz); a time-half-bandwidth of 4 when `None`
    pub mt_bandwidth: Option<f64>,

    /// Significance level of the F-test, Bonferroni corrected over the bins
    pub p_value: f64,
}

impl Default for SpectrumFitOptions {
    fn default() -> Self {
        Self {
            mt_bandwidth: None,
            p_value: DEFAULT_P_VALUE,
        }
    }
}

impl SpectrumFitOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Config(e.to_string()))
    }
}

/// Options for [`notch_filter`](crate::filtering::notch_filter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotchOptions {
    #[serde(flatten)]
    pub filter: FilterOptions,

    /// Stop band width per frequency (Hz): `freq / 200` when `None`, a single
    /// value is used for every frequency
    pub notch_widths: Option<Vec<f64>>,

    /// Transition width around each stop band (Hz)
    pub trans_bandwidth: f64,

    pub spectrum_fit: SpectrumFitOptions,
}

impl Default for NotchOptions {
    fn default() -> Self {
        Self {
            filter: FilterOptions::default(),
            notch_widths: None,
            trans_bandwidth: DEFAULT_NOTCH_TRANS_BANDWIDTH,
            spectrum_fit: SpectrumFitOptions::default(),
        }
    }
}

impl NotchOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FilterError::Config(e.to_string()))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.filter.method = method;
        self
    }

    /// Resolve the per-frequency notch widths for `freqs`
    pub fn resolved_widths(&self, freqs: &[f64]) -> Result<Vec<f64>> {
        let widths = match &self.notch_widths {
            None => return Ok(freqs.iter().map(|f| f / 200.0).collect()),
            Some(w) => w,
        };
        if let Some(bad) = widths.iter().find(|&&w| w < 0.0) {
            return Err(FilterError::InvalidSpecification(format!(
                "notch_widths must be >= 0, got {}",
                bad
            )));
        }
        match widths.len() {
            1 => Ok(vec![widths[0]; freqs.len()]),
            n if n == freqs.len() => Ok(widths.clone()),
            n => Err(FilterError::LengthMismatch {
                left: "notch_widths",
                right: "freqs",
                left_len: n,
                right_len: freqs.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("FFT".parse::<Method>().unwrap(), Method::Fft);
        assert_eq!("iir".parse::<Method>().unwrap(), Method::Iir);
        assert_eq!("Spectrum_Fit".parse::<Method>().unwrap(), Method::SpectrumFit);
        assert_eq!(
            "fir".parse::<Method>(),
            Err(FilterError::UnknownMethod("fir".into()))
        );
        assert_eq!(Method::SpectrumFit.to_string(), "spectrum_fit");
    }

    #[test]
    fn test_defaults() {
        let opts = FilterOptions::default();
        assert_eq!(opts.l_trans_bandwidth, 0.5);
        assert!(opts.zero_phase);
        assert_eq!(opts.iir_params.order, 4);
        assert_eq!(opts.window, WindowType::Hamming);

        let notch = NotchOptions::default();
        assert_eq!(notch.trans_bandwidth, 1.0);
        assert_eq!(notch.spectrum_fit.p_value, 0.05);
    }

    #[test]
    fn test_from_json_partial() {
        let opts = FilterOptions::from_json(
            r#"{"filter_length": 2049, "method": "iir", "window": "blackman", "executor": {"threads": 4}}"#,
        )
        .unwrap();
        assert_eq!(opts.filter_length, Some(2049));
        assert_eq!(opts.method, Method::Iir);
        assert_eq!(opts.executor, Executor::Threads(4));
        assert_eq!(opts.window, WindowType::Blackman);
        assert_eq!(opts.h_trans_bandwidth, 0.5);

        let notch = NotchOptions::from_json(
            r#"{"method": "spectrum_fit", "spectrum_fit": {"p_value": 0.01}}"#,
        )
        .unwrap();
        assert_eq!(notch.filter.method, Method::SpectrumFit);
        assert_eq!(notch.spectrum_fit.p_value, 0.01);

        assert!(matches!(
            FilterOptions::from_json("{\"method\": \"fir\"}"),
            Err(FilterError::Config(_))
        ));
    }

    #[test]
    fn test_notch_widths() {
        let freqs = [50.0, 100.0];
        let mut opts = NotchOptions::default();
        assert_eq!(opts.resolved_widths(&freqs).unwrap(), vec![0.25, 0.5]);

        opts.notch_widths = Some(vec![2.0]);
        assert_eq!(opts.resolved_widths(&freqs).unwrap(), vec![2.0, 2.0]);

        opts.notch_widths = Some(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            opts.resolved_widths(&freqs),
            Err(FilterError::LengthMismatch { .. })
        ));

        opts.notch_widths = Some(vec![-1.0]);
        assert!(matches!(
            opts.resolved_widths(&freqs),
            Err(FilterError::InvalidSpecification(_))
        ));
    }
}
