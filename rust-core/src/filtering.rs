//! Public filtering entry points
//!
//! Each filter comes in a copying form taking `&ArrayD<T>` and an `_inplace`
//! form taking `&mut ArrayD<T>`. Arrays are filtered along their last axis,
//! every leading axis being an independent channel. All parameters are
//! validated and every kernel is designed before any sample is modified.

use crate::config::{FilterOptions, Method, NotchOptions};
use crate::error::{FilterError, Result};
use crate::filters::attenuation::verify_attenuation;
use crate::filters::design::{adjust_length_for_nyquist, check_sfreq, firwin2, FrequencyResponseSpec};
use crate::filters::direct::direct_filter;
use crate::filters::iir::{iir_filter, IirBand, IirFilter};
use crate::filters::overlap_add::overlap_add_filter;
use crate::line_noise::{remove_line_noise, DetectedLine, LineSelection};
use crate::signal::{n_samples, resolve_picks, to_rows, write_rows, Sample};
use log::{debug, warn};
use ndarray::{Array2, ArrayD};

/// Flatten `x`, run `f` on the picked rows and write the result back
///
/// Picks are validated first. When the last axis is empty `f` is skipped and
/// `on_empty` builds the result from the resolved picks.
fn with_rows<T, R, F, E>(x: &mut ArrayD<T>, picks: Option<&[usize]>, f: F, on_empty: E) -> Result<R>
where
    T: Sample,
    F: FnOnce(&mut Array2<f64>, &[usize]) -> Result<R>,
    E: FnOnce(&[usize]) -> R,
{
    let mut rows = to_rows(x)?;
    let picks = resolve_picks(picks, rows.nrows())?;
    if n_samples(x) == 0 {
        warn!("x has zero length along the last axis, returning it unmodified");
        return Ok(on_empty(&picks));
    }
    let out = f(&mut rows, &picks)?;
    write_rows(x, &rows);
    Ok(out)
}

/// FIR filtering with the engine matching the channel length
fn fir_filter(
    rows: &mut Array2<f64>,
    picks: &[usize],
    spec: &FrequencyResponseSpec,
    sfreq: f64,
    opts: &FilterOptions,
) -> Result<()> {
    let n = rows.ncols();
    match opts.filter_length {
        Some(length) if n > length => {
            let length = adjust_length_for_nyquist(length, spec.nyquist_gain());
            let h = firwin2(length, spec, opts.window)?;
            verify_attenuation(&h, spec, sfreq, opts.zero_phase);
            debug!("Overlap-add filtering with {} taps", length);
            overlap_add_filter(
                rows,
                picks,
                &h,
                opts.zero_phase,
                opts.fft_size,
                opts.fft_backend,
                &opts.executor,
            )
        }
        _ => {
            debug!("Direct FFT filtering with {} taps", n);
            direct_filter(rows, picks, spec, sfreq, opts.window, opts.fft_backend, &opts.executor)
                .map(|_| ())
        }
    }
}

/// Apply each IIR filter in turn to the picked rows
fn iir_cascade(
    rows: &mut Array2<f64>,
    picks: &[usize],
    filters: &[IirFilter],
    opts: &FilterOptions,
) -> Result<()> {
    for filter in filters {
        iir_filter(rows, picks, filter, &opts.executor)?;
    }
    Ok(())
}

/// Shared FIR/IIR dispatch for the band-limiting filters
fn band_limit<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    spec: FrequencyResponseSpec,
    iir_bands: &[IirBand],
    opts: &FilterOptions,
    operation: &'static str,
) -> Result<()> {
    match opts.method {
        Method::Fft => {
            with_rows(
                x,
                opts.picks.as_deref(),
                |rows, picks| fir_filter(rows, picks, &spec, sfreq, opts),
                |_| (),
            )?;
        }
        Method::Iir => {
            let filters = iir_bands
                .iter()
                .map(|&band| IirFilter::design(band, sfreq, &opts.iir_params))
                .collect::<Result<Vec<_>>>()?;
            with_rows(
                x,
                opts.picks.as_deref(),
                |rows, picks| iir_cascade(rows, picks, &filters, opts),
                |_| (),
            )?;
        }
        Method::SpectrumFit => {
            return Err(FilterError::UnsupportedMethod {
                method: Method::SpectrumFit.to_string(),
                operation,
            })
        }
    }
    Ok(())
}

/// Band-pass filter `x` in place between `fp1` and `fp2` (Hz)
///
/// The stop bands end `l_trans_bandwidth` below `fp1` and
/// `h_trans_bandwidth` above `fp2`.
pub fn band_pass_filter_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    fp1: f64,
    fp2: f64,
    opts: &FilterOptions,
) -> Result<()> {
    let spec = FrequencyResponseSpec::band_pass(
        sfreq,
        fp1,
        fp2,
        opts.l_trans_bandwidth,
        opts.h_trans_bandwidth,
    )?;
    band_limit(x, sfreq, spec, &[IirBand::BandPass(fp1, fp2)], opts, "band-pass filtering")
}

pub fn band_pass_filter<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    fp1: f64,
    fp2: f64,
    opts: &FilterOptions,
) -> Result<ArrayD<T>> {
    let mut y = x.clone();
    band_pass_filter_inplace(&mut y, sfreq, fp1, fp2, opts)?;
    Ok(y)
}

/// Band-stop filter `x` in place, one stop band per (`fp1[i]`, `fp2[i]`)
///
/// `fp1`/`fp2` are the passband edges; the stop band of each pair spans
/// `fp1[i] + l_trans_bandwidth` to `fp2[i] - h_trans_bandwidth`.
pub fn band_stop_filter_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    fp1: &[f64],
    fp2: &[f64],
    opts: &FilterOptions,
) -> Result<()> {
    let spec = FrequencyResponseSpec::band_stop(
        sfreq,
        fp1,
        fp2,
        opts.l_trans_bandwidth,
        opts.h_trans_bandwidth,
    )?;
    let bands: Vec<IirBand> = fp1
        .iter()
        .zip(fp2)
        .map(|(&f1, &f2)| IirBand::BandStop(f1, f2))
        .collect();
    band_limit(x, sfreq, spec, &bands, opts, "band-stop filtering")
}

pub fn band_stop_filter<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    fp1: &[f64],
    fp2: &[f64],
    opts: &FilterOptions,
) -> Result<ArrayD<T>> {
    let mut y = x.clone();
    band_stop_filter_inplace(&mut y, sfreq, fp1, fp2, opts)?;
    Ok(y)
}

/// Low-pass filter `x` in place with passband edge `fp` (Hz)
///
/// The stop band starts `h_trans_bandwidth` above `fp`.
pub fn low_pass_filter_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    fp: f64,
    opts: &FilterOptions,
) -> Result<()> {
    let spec = FrequencyResponseSpec::low_pass(sfreq, fp, opts.h_trans_bandwidth)?;
    band_limit(x, sfreq, spec, &[IirBand::LowPass(fp)], opts, "low-pass filtering")
}

pub fn low_pass_filter<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    fp: f64,
    opts: &FilterOptions,
) -> Result<ArrayD<T>> {
    let mut y = x.clone();
    low_pass_filter_inplace(&mut y, sfreq, fp, opts)?;
    Ok(y)
}

/// High-pass filter `x` in place with passband edge `fp` (Hz)
///
/// The stop band ends `l_trans_bandwidth` below `fp`.
pub fn high_pass_filter_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    fp: f64,
    opts: &FilterOptions,
) -> Result<()> {
    let spec = FrequencyResponseSpec::high_pass(sfreq, fp, opts.l_trans_bandwidth)?;
    band_limit(x, sfreq, spec, &[IirBand::HighPass(fp)], opts, "high-pass filtering")
}

pub fn high_pass_filter<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    fp: f64,
    opts: &FilterOptions,
) -> Result<ArrayD<T>> {
    let mut y = x.clone();
    high_pass_filter_inplace(&mut y, sfreq, fp, opts)?;
    Ok(y)
}

/// Remove narrow bands around `freqs` (Hz) from `x` in place
///
/// With [`Method::Fft`] or [`Method::Iir`] each frequency becomes a stop band
/// `freq ± (width + trans_bandwidth) / 2` and no lines are returned. With
/// [`Method::SpectrumFit`] sinusoids are fitted and subtracted; when `freqs`
/// is `None` they are found by an F-test. The fitted lines of each picked
/// channel are returned in pick order.
pub fn notch_filter_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    freqs: Option<&[f64]>,
    opts: &NotchOptions,
) -> Result<Vec<Vec<DetectedLine>>> {
    check_sfreq(sfreq)?;
    let method = opts.filter.method;

    let selection = match freqs {
        Some(freqs) => LineSelection::Explicit {
            freqs: freqs.to_vec(),
            notch_widths: opts.resolved_widths(freqs)?,
        },
        None if method == Method::SpectrumFit => LineSelection::FTest {
            p_value: opts.spectrum_fit.p_value,
        },
        None => {
            return Err(FilterError::MissingParameter(
                "freqs (only spectrum_fit can detect lines)",
            ))
        }
    };

    match (method, selection) {
        (
            Method::Fft | Method::Iir,
            LineSelection::Explicit {
                freqs,
                notch_widths,
            },
        ) => {
            let tb_2 = opts.trans_bandwidth / 2.0;
            let lows: Vec<f64> = freqs
                .iter()
                .zip(&notch_widths)
                .map(|(f, w)| f - w / 2.0 - tb_2)
                .collect();
            let highs: Vec<f64> = freqs
                .iter()
                .zip(&notch_widths)
                .map(|(f, w)| f + w / 2.0 + tb_2)
                .collect();
            let band_opts = FilterOptions {
                l_trans_bandwidth: tb_2,
                h_trans_bandwidth: tb_2,
                ..opts.filter.clone()
            };
            band_stop_filter_inplace(x, sfreq, &lows, &highs, &band_opts)?;
            Ok(Vec::new())
        }
        (_, selection) => with_rows(
            x,
            opts.filter.picks.as_deref(),
            |rows, picks| {
                remove_line_noise(
                    rows,
                    picks,
                    sfreq,
                    opts.spectrum_fit.mt_bandwidth,
                    selection,
                    &opts.filter.executor,
                )
            },
            |picks| vec![Vec::new(); picks.len()],
        ),
    }
}

pub fn notch_filter<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    freqs: Option<&[f64]>,
    opts: &NotchOptions,
) -> Result<(ArrayD<T>, Vec<Vec<DetectedLine>>)> {
    let mut y = x.clone();
    let lines = notch_filter_inplace(&mut y, sfreq, freqs, opts)?;
    Ok((y, lines))
}

/// Filter `x` in place according to which band edges are given
///
/// | `l_freq` | `h_freq` | filter |
/// |---|---|---|
/// | `None` | `None` | none |
/// | `Some` | `None` | high-pass at `l_freq` |
/// | `None` | `Some` | low-pass at `h_freq` |
/// | `l < h` | | band-pass between them |
/// | `l > h` | | band-stop between `h_freq` and `l_freq` |
pub fn filter_data_inplace<T: Sample>(
    x: &mut ArrayD<T>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    opts: &FilterOptions,
) -> Result<()> {
    check_sfreq(sfreq)?;
    match (l_freq, h_freq) {
        (None, None) => {
            debug!("No band edges given, data left unfiltered");
            Ok(())
        }
        (Some(l), None) => high_pass_filter_inplace(x, sfreq, l, opts),
        (None, Some(h)) => low_pass_filter_inplace(x, sfreq, h, opts),
        (Some(l), Some(h)) if l < h => band_pass_filter_inplace(x, sfreq, l, h, opts),
        (Some(l), Some(h)) if l > h => band_stop_filter_inplace(x, sfreq, &[h], &[l], opts),
        (Some(l), Some(_)) => Err(FilterError::InvalidSpecification(format!(
            "l_freq and h_freq are both {:.1}Hz",
            l
        ))),
    }
}

pub fn filter_data<T: Sample>(
    x: &ArrayD<T>,
    sfreq: f64,
    l_freq: Option<f64>,
    h_freq: Option<f64>,
    opts: &FilterOptions,
) -> Result<ArrayD<T>> {
    let mut y = x.clone();
    filter_data_inplace(&mut y, sfreq, l_freq, h_freq, opts)?;
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use std::f64::consts::PI;

    fn tones(freqs: &[f64], sfreq: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let t = i as f64 / sfreq;
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum()
            })
            .collect()
    }

    fn rms(x: &[f64]) -> f64 {
        (x.iter().map(|v| v * v).sum::<f64>() / x.len() as f64).sqrt()
    }

    fn as_array(x: Vec<f64>) -> ArrayD<f64> {
        let n = x.len();
        ArrayD::from_shape_vec(IxDyn(&[1, n]), x).unwrap()
    }

    #[test]
    fn test_band_pass_keeps_band() {
        let x = as_array(tones(&[2.0, 20.0, 120.0], 500.0, 2000));
        let y = band_pass_filter(&x, 500.0, 10.0, 40.0, &FilterOptions::default()).unwrap();

        let expected = tones(&[20.0], 500.0, 2000);
        let diff: Vec<f64> = y
            .iter()
            .zip(&expected)
            .skip(200)
            .take(1600)
            .map(|(a, b)| a - b)
            .collect();
        assert!(rms(&diff) < 0.02, "rms error {}", rms(&diff));
    }

    #[test]
    fn test_filter_data_dispatch() {
        let x = as_array(tones(&[5.0, 60.0], 250.0, 1000));
        let opts = FilterOptions::default();

        let unchanged = filter_data(&x, 250.0, None, None, &opts).unwrap();
        assert_eq!(unchanged, x);

        let low = filter_data(&x, 250.0, None, Some(20.0), &opts).unwrap();
        let direct = low_pass_filter(&x, 250.0, 20.0, &opts).unwrap();
        assert_eq!(low, direct);

        // l > h is a band-stop between h and l
        let stop = filter_data(&x, 250.0, Some(50.0), Some(10.0), &opts).unwrap();
        let expected = band_stop_filter(&x, 250.0, &[10.0], &[50.0], &opts).unwrap();
        assert_eq!(stop, expected);

        assert!(matches!(
            filter_data(&x, 250.0, Some(10.0), Some(10.0), &opts),
            Err(FilterError::InvalidSpecification(_))
        ));
    }

    #[test]
    fn test_errors_leave_input_untouched() {
        let mut x = as_array(tones(&[5.0], 250.0, 500));
        let original = x.clone();
        let opts = FilterOptions::default().with_picks(vec![0, 3]);
        assert!(matches!(
            low_pass_filter_inplace(&mut x, 250.0, 20.0, &opts),
            Err(FilterError::PickOutOfRange { pick: 3, .. })
        ));
        assert_eq!(x, original);

        let opts = FilterOptions::default();
        assert!(matches!(
            high_pass_filter_inplace(&mut x, 250.0, 0.3, &opts),
            Err(FilterError::InvalidSpecification(_))
        ));
        assert!(matches!(
            low_pass_filter_inplace(&mut x, -1.0, 20.0, &opts),
            Err(FilterError::InvalidSampleRate(_))
        ));
        let fit = FilterOptions::default().with_method(Method::SpectrumFit);
        assert!(matches!(
            band_pass_filter_inplace(&mut x, 250.0, 5.0, 20.0, &fit),
            Err(FilterError::UnsupportedMethod { .. })
        ));
        assert_eq!(x, original);
    }

    #[test]
    fn test_zero_length_is_returned_unchanged() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[4, 0]));
        let y = low_pass_filter(&x, 100.0, 10.0, &FilterOptions::default()).unwrap();
        assert_eq!(y.shape(), &[4, 0]);

        // Picks are still checked
        let opts = FilterOptions::default().with_picks(vec![1, 4]);
        assert!(matches!(
            low_pass_filter(&x, 100.0, 10.0, &opts),
            Err(FilterError::PickOutOfRange { pick: 4, .. })
        ));

        // One empty line list per pick
        let mut notch = NotchOptions::default().with_method(Method::SpectrumFit);
        notch.filter.picks = Some(vec![0, 2]);
        let (y, lines) = notch_filter(&x, 100.0, None, &notch).unwrap();
        assert_eq!(y.shape(), &[4, 0]);
        assert_eq!(lines, vec![Vec::new(), Vec::new()]);
    }

    #[test]
    fn test_notch_methods() {
        let sfreq = 1000.0;
        let x = as_array(tones(&[10.0, 50.0], sfreq, 4000));
        let clean = tones(&[10.0], sfreq, 4000);

        for method in [Method::Fft, Method::Iir, Method::SpectrumFit] {
            let mut opts = NotchOptions::default().with_method(method);
            opts.notch_widths = Some(vec![2.0]);
            let (y, lines) = notch_filter(&x, sfreq, Some(&[50.0][..]), &opts).unwrap();
            let residual: Vec<f64> = y
                .iter()
                .zip(&clean)
                .skip(500)
                .take(3000)
                .map(|(a, b)| a - b)
                .collect();
            assert!(rms(&residual) < 0.05, "{:?}: rms {}", method, rms(&residual));
            match method {
                Method::SpectrumFit => {
                    assert_eq!(lines.len(), 1);
                    assert!(!lines[0].is_empty());
                }
                _ => assert!(lines.is_empty()),
            }
        }

        // Only spectrum fitting can detect lines
        assert!(matches!(
            notch_filter(&x, sfreq, None, &NotchOptions::default()),
            Err(FilterError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_picks_leave_other_rows() {
        let row = tones(&[5.0, 100.0], 500.0, 1000);
        let mut data = row.clone();
        data.extend(row.iter());
        let x = ArrayD::from_shape_vec(IxDyn(&[2, 1000]), data).unwrap();

        let opts = FilterOptions::default().with_picks(vec![1]);
        let y = low_pass_filter(&x, 500.0, 20.0, &opts).unwrap();
        for (a, b) in y.iter().take(1000).zip(&row) {
            assert_eq!(a, b);
        }
        let filtered: Vec<f64> = y.iter().skip(1000).copied().collect();
        assert!((rms(&filtered) - (0.5f64).sqrt()).abs() < 0.02);
    }
}
