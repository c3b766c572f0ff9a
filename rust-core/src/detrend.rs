//! Polynomial detrending along the last axis

use crate::error::{FilterError, Result};
use crate::signal::{to_rows, write_rows, Sample};
use ndarray::ArrayD;

/// Remove the mean (order 0) or least-squares line (order 1) from one channel
pub fn detrend_channel(x: &mut [f64], order: usize) -> Result<()> {
    let n = x.len();
    if n == 0 {
        return match order {
            0 | 1 => Ok(()),
            _ => Err(FilterError::InvalidDetrendOrder(order)),
        };
    }
    let nf = n as f64;
    let mean = x.iter().sum::<f64>() / nf;
    match order {
        0 => x.iter_mut().for_each(|v| *v -= mean),
        1 => {
            let t_mean = (nf - 1.0) / 2.0;
            let (mut sxy, mut sxx) = (0.0, 0.0);
            for (i, &v) in x.iter().enumerate() {
                let dt = i as f64 - t_mean;
                sxy += dt * (v - mean);
                sxx += dt * dt;
            }
            let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
            for (i, v) in x.iter_mut().enumerate() {
                *v -= mean + slope * (i as f64 - t_mean);
            }
        }
        _ => return Err(FilterError::InvalidDetrendOrder(order)),
    }
    Ok(())
}

/// Detrend every channel of `x` in place
pub fn detrend<T: Sample>(x: &mut ArrayD<T>, order: usize) -> Result<()> {
    if order > 1 {
        return Err(FilterError::InvalidDetrendOrder(order));
    }
    let mut rows = to_rows(x)?;
    for mut row in rows.rows_mut() {
        if let Some(slice) = row.as_slice_mut() {
            detrend_channel(slice, order)?;
        }
    }
    write_rows(x, &rows);
    Ok(())
}
