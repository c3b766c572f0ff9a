//! IIR filtering with cascaded biquads, applied forward and backward
//!
//! Butterworth low/high/band-pass designs are built from second-order
//! sections with the pole-pair Q values of the analog prototype. Band-stop maps
//! each prototype pole pair through the low-pass to band-stop transform and
//! discretizes the resulting sections bilinearly. Filtering runs once forward and once on
//! the reversed output, so the result has zero phase and the squared magnitude
//! response of the cascade.

use crate::error::{FilterError, Result};
use crate::exec::Executor;
use crate::signal::odd_extend;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use log::debug;
use num_complex::Complex64;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Length of the impulse response used to estimate ringing
const RINGING_PROBE_LEN: usize = 1000;

/// Relative level below which the impulse response counts as settled
const RINGING_THRESHOLD: f64 = 0.001;

/// Normalized biquad `b0 + b1 z^-1 + b2 z^-2 / 1 + a1 z^-1 + a2 z^-2`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondOrderSection {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl From<SecondOrderSection> for Coefficients<f64> {
    fn from(s: SecondOrderSection) -> Self {
        Coefficients {
            a1: s.a1,
            a2: s.a2,
            b0: s.b0,
            b1: s.b1,
            b2: s.b2,
        }
    }
}

impl From<Coefficients<f64>> for SecondOrderSection {
    fn from(c: Coefficients<f64>) -> Self {
        Self {
            b0: c.b0,
            b1: c.b1,
            b2: c.b2,
            a1: c.a1,
            a2: c.a2,
        }
    }
}

/// IIR design parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IirParams {
    /// Butterworth order (positive, even)
    pub order: usize,
    /// Explicit sections; when set, `order` is ignored
    pub sections: Option<Vec<SecondOrderSection>>,
    /// Edge padding; estimated from the impulse response when `None`
    pub padlen: Option<usize>,
}

impl Default for IirParams {
    fn default() -> Self {
        Self {
            order: 4,
            sections: None,
            padlen: None,
        }
    }
}

/// Band shape of a designed IIR filter (Hz)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IirBand {
    LowPass(f64),
    HighPass(f64),
    BandPass(f64, f64),
    BandStop(f64, f64),
}

/// Cascade of biquad sections with its forward-backward padding
#[derive(Debug, Clone)]
pub struct IirFilter {
    sections: Vec<Coefficients<f64>>,
    ringing: usize,
    padlen: usize,
}

impl IirFilter {
    /// Design a filter for `band`, or wrap `params.sections` when given
    pub fn design(band: IirBand, sfreq: f64, params: &IirParams) -> Result<Self> {
        if let Some(sections) = &params.sections {
            return Ok(Self::from_sections(sections, params.padlen));
        }
        if params.order == 0 || params.order % 2 != 0 {
            return Err(FilterError::InvalidSpecification(format!(
                "Butterworth order must be a positive even number, got {}",
                params.order
            )));
        }

        let sections = match band {
            IirBand::LowPass(fc) => butterworth(false, params.order, fc, sfreq)?,
            IirBand::HighPass(fc) => butterworth(true, params.order, fc, sfreq)?,
            IirBand::BandPass(f1, f2) => {
                check_band(f1, f2)?;
                let mut sections = butterworth(true, params.order, f1, sfreq)?;
                sections.extend(butterworth(false, params.order, f2, sfreq)?);
                sections
            }
            IirBand::BandStop(f1, f2) => {
                check_band(f1, f2)?;
                butterworth_band_stop(params.order, f1, f2, sfreq)?
            }
        };

        let filter = Self::from_coefficients(sections, params.padlen);
        debug!(
            "IIR {:?}: {} sections, ringing {} samples, padlen {}",
            band,
            filter.sections.len(),
            filter.ringing,
            filter.padlen
        );
        Ok(filter)
    }

    /// Use explicit second-order sections
    pub fn from_sections(sections: &[SecondOrderSection], padlen: Option<usize>) -> Self {
        Self::from_coefficients(sections.iter().map(|&s| s.into()).collect(), padlen)
    }

    fn from_coefficients(sections: Vec<Coefficients<f64>>, padlen: Option<usize>) -> Self {
        let mut filter = Self {
            sections,
            ringing: 0,
            padlen: 0,
        };
        filter.ringing = filter.estimate_ringing_samples();
        filter.padlen = padlen.unwrap_or(filter.ringing);
        filter
    }

    /// Sections of the cascade
    pub fn sections(&self) -> Vec<SecondOrderSection> {
        self.sections.iter().map(|&c| c.into()).collect()
    }

    /// Requested edge padding (clamped per channel when filtering)
    pub fn padlen(&self) -> usize {
        self.padlen
    }

    /// Last sample of the impulse response above 0.1% of its peak
    pub fn estimate_ringing_samples(&self) -> usize {
        let mut impulse = vec![0.0; RINGING_PROBE_LEN];
        impulse[0] = 1.0;
        let h = self.run(&impulse, 0);
        let peak = h.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        h.iter()
            .rposition(|v| v.abs() > RINGING_THRESHOLD * peak)
            .unwrap_or(0)
    }

    /// Causal pass through the cascade
    ///
    /// The sections are first settled on `warmup` copies of the first sample,
    /// which approximates steady-state initial conditions.
    fn run(&self, x: &[f64], warmup: usize) -> Vec<f64> {
        let mut stages: Vec<DirectForm2Transposed<f64>> = self
            .sections
            .iter()
            .map(|&c| DirectForm2Transposed::<f64>::new(c))
            .collect();
        let mut step = |v: f64| stages.iter_mut().fold(v, |acc, s| s.run(acc));

        if let Some(&first) = x.first() {
            for _ in 0..warmup {
                step(first);
            }
        }
        x.iter().map(|&v| step(v)).collect()
    }

    /// Zero-phase forward-backward filtering of one channel
    pub fn filtfilt(&self, x: &[f64]) -> Vec<f64> {
        let n = x.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = self.padlen.min(n - 1);
        let ext = odd_extend(x, pad + 1);

        let mut y = self.run(&ext, self.ringing);
        y.reverse();
        let mut y = self.run(&y, self.ringing);
        y.reverse();
        y[pad..pad + n].to_vec()
    }
}

fn check_band(f1: f64, f2: f64) -> Result<()> {
    if f1 >= f2 {
        return Err(FilterError::InvalidSpecification(format!(
            "lower band edge ({:.1}Hz) must be below the upper edge ({:.1}Hz)",
            f1, f2
        )));
    }
    Ok(())
}

fn coefficients(kind: Type<f64>, f0: f64, sfreq: f64, q: f64) -> Result<Coefficients<f64>> {
    if !(f0 > 0.0 && f0 < sfreq / 2.0) {
        return Err(FilterError::InvalidIirCoefficients {
            frequency: f0,
            sfreq,
        });
    }
    Coefficients::<f64>::from_params(kind, sfreq.hz(), f0.hz(), q).map_err(|_| {
        FilterError::InvalidIirCoefficients {
            frequency: f0,
            sfreq,
        }
    })
}

/// Butterworth cascade of `order / 2` sections
fn butterworth(high_pass: bool, order: usize, fc: f64, sfreq: f64) -> Result<Vec<Coefficients<f64>>> {
    (0..order / 2)
        .map(|k| {
            let q = 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin());
            let kind = if high_pass { Type::HighPass } else { Type::LowPass };
            coefficients(kind, fc, sfreq, q)
        })
        .collect()
}

/// Butterworth band-stop with `order` sections and zeros at the band centre
///
/// Each prototype pole `p` becomes the roots of `s^2 - (bw / p) s + w0^2`; the
/// roots of a conjugate pole pair split into two conjugate pairs, one section
/// each. Sections are normalized to unit DC gain.
fn butterworth_band_stop(order: usize, f1: f64, f2: f64, sfreq: f64) -> Result<Vec<Coefficients<f64>>> {
    for f in [f1, f2] {
        if !(f > 0.0 && f < sfreq / 2.0) {
            return Err(FilterError::InvalidIirCoefficients { frequency: f, sfreq });
        }
    }
    let k = 2.0 * sfreq;
    let prewarp = |f: f64| k * (PI * f / sfreq).tan();
    let (w1, w2) = (prewarp(f1), prewarp(f2));
    let w0_sq = w1 * w2;
    let bw = w2 - w1;

    let mut sections = Vec::with_capacity(order);
    for i in 0..order / 2 {
        let angle = PI * (2 * i + order + 1) as f64 / (2 * order) as f64;
        let pole = Complex64::from_polar(1.0, angle);
        let sum = bw / pole;
        let disc = (sum * sum - 4.0 * w0_sq).sqrt();
        for root in [(sum + disc) / 2.0, (sum - disc) / 2.0] {
            // Analog section (g s^2 + g w0^2) / (s^2 + d1 s + d0)
            let d1 = -2.0 * root.re;
            let d0 = root.norm_sqr();
            let g = d0 / w0_sq;
            let a0 = k * k + d1 * k + d0;
            sections.push(Coefficients {
                b0: g * (k * k + w0_sq) / a0,
                b1: 2.0 * g * (w0_sq - k * k) / a0,
                b2: g * (k * k + w0_sq) / a0,
                a1: 2.0 * (d0 - k * k) / a0,
                a2: (k * k - d1 * k + d0) / a0,
            });
        }
    }
    Ok(sections)
}

/// Filter the picked rows of `rows` in place
pub fn iir_filter(
    rows: &mut Array2<f64>,
    picks: &[usize],
    filter: &IirFilter,
    executor: &Executor,
) -> Result<()> {
    executor.apply_rows(rows, picks, |row| Ok(filter.filtfilt(row)))
}
