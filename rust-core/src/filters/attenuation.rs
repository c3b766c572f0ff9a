//! Stopband attenuation check for designed kernels

use super::design::{frequency_response, FrequencyResponseSpec};
use log::warn;

/// Attenuation below which a warning is issued (dB)
pub const MIN_ATTENUATION_DB: f64 = 20.0;

/// Extra attenuation credited when the kernel is applied twice (zero-phase)
pub const ZERO_PHASE_HEADROOM_DB: f64 = 6.0;

/// Worst stopband point of a kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopbandAttenuation {
    /// Attenuation relative to the passband maximum (dB, positive)
    pub attenuation_db: f64,
    /// Normalized frequency (units of Nyquist) where it occurs
    pub frequency: f64,
}

/// Insufficient attenuation, reported but never fatal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationWarning {
    pub attenuation_db: f64,
    pub frequency_hz: f64,
}

/// Measure the attenuation of `h` at the stopband control points of `spec`
///
/// The magnitude response is sampled at the design frequencies, normalized by
/// its maximum, and the largest response outside the unit-gain points is
/// reported. Returns infinite attenuation when every control point is
/// passband.
pub fn stopband_attenuation(h: &[f64], spec: &FrequencyResponseSpec) -> StopbandAttenuation {
    let freqs = spec.frequencies();
    let mut response: Vec<f64> = frequency_response(h, freqs)
        .iter()
        .map(|c| c.norm())
        .collect();
    let peak = response.iter().cloned().fold(0.0_f64, f64::max);
    if peak > 0.0 {
        for r in response.iter_mut() {
            *r /= peak;
        }
    }
    for (r, &g) in response.iter_mut().zip(spec.gains().iter()) {
        if g == 1.0 {
            *r = 0.0;
        }
    }

    let (idx, &worst) = response
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .unwrap_or((0, &0.0));
    StopbandAttenuation {
        attenuation_db: -20.0 * worst.log10(),
        frequency: freqs[idx],
    }
}

/// Check `h` against the minimum attenuation and warn if it falls short
///
/// `applied_twice` credits [`ZERO_PHASE_HEADROOM_DB`] for forward-backward
/// application.
pub fn verify_attenuation(
    h: &[f64],
    spec: &FrequencyResponseSpec,
    sfreq: f64,
    applied_twice: bool,
) -> Option<AttenuationWarning> {
    let measured = stopband_attenuation(h, spec);
    let mut att_db = measured.attenuation_db;
    if applied_twice {
        att_db += ZERO_PHASE_HEADROOM_DB;
    }
    if att_db >= MIN_ATTENUATION_DB {
        return None;
    }

    let frequency_hz = measured.frequency * sfreq / 2.0;
    if applied_twice {
        warn!(
            "Attenuation at stop frequency {:.1}Hz is only {:.1}dB. Increase filter_length for higher attenuation.",
            frequency_hz, att_db
        );
    } else {
        warn!(
            "Attenuation at stop frequency {:.1}Hz is only {:.1}dB.",
            frequency_hz, att_db
        );
    }
    Some(AttenuationWarning {
        attenuation_db: att_db,
        frequency_hz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::design::{adjust_length_for_nyquist, firwin2};
    use crate::filters::windows::WindowType;

    #[test]
    fn test_long_kernel_passes() {
        let spec = FrequencyResponseSpec::low_pass(1000.0, 40.0, 10.0).unwrap();
        let h = firwin2(1000, &spec, WindowType::Hamming).unwrap();
        let att = stopband_attenuation(&h, &spec);
        // Worst case sits on the stop edge
        assert!(att.attenuation_db > 25.0, "only {} dB", att.attenuation_db);
        assert!((att.frequency - 0.1).abs() < 1e-12);
        assert!(verify_attenuation(&h, &spec, 1000.0, false).is_none());
    }

    #[test]
    fn test_short_kernel_warns() {
        // 1 Hz transition with a 31-tap kernel cannot reach 20 dB
        let spec = FrequencyResponseSpec::low_pass(1000.0, 40.0, 1.0).unwrap();
        let n = adjust_length_for_nyquist(31, spec.nyquist_gain());
        let h = firwin2(n, &spec, WindowType::Hamming).unwrap();

        let warning = verify_attenuation(&h, &spec, 1000.0, false).expect("should warn");
        assert!(warning.attenuation_db < MIN_ATTENUATION_DB);
        // The worst stopband point is the stop edge at 41 Hz
        assert!((warning.frequency_hz - 41.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_phase_headroom() {
        let spec = FrequencyResponseSpec::low_pass(1000.0, 40.0, 1.0).unwrap();
        let h = firwin2(32, &spec, WindowType::Hamming).unwrap();
        let once = verify_attenuation(&h, &spec, 1000.0, false).unwrap();
        let twice = verify_attenuation(&h, &spec, 1000.0, true).unwrap();
        assert!((twice.attenuation_db - once.attenuation_db - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_passband_is_infinite() {
        let spec = FrequencyResponseSpec::new(vec![0.0, 1.0], vec![1.0, 1.0]).unwrap();
        let att = stopband_attenuation(&[1.0], &spec);
        assert!(att.attenuation_db.is_infinite());
    }
}
