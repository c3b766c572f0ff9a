//! Symmetric window functions for frequency-sampling FIR design

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window applied to the truncated impulse response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~44 dB
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~53 dB
    #[default]
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    /// Sidelobe attenuation: ~74 dB
    Blackman,

    /// Rectangular window (plain truncation)
    Rectangular,
}

/// Generate symmetric window coefficients w[n], n = 0..length-1
///
/// A window of length 1 is `[1.0]`.
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length <= 1 {
        return vec![1.0; length];
    }
    let denom = (length - 1) as f64;

    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / denom;
            match window_type {
                WindowType::Hann => 0.5 - 0.5 * angle.cos(),
                WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
                WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
                WindowType::Rectangular => 1.0,
            }
        })
        .collect()
}
