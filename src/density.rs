// src/density.rs

//! Gaussian log-density helpers.

use crate::linalg_backends::ThreadSafeStdError;
use ndarray::{Array1, ArrayView1};
use std::f64::consts::PI;

fn check_variance(variance: f64) -> Result<(), ThreadSafeStdError> {
    if !variance.is_finite() || variance <= 0.0 {
        return Err(format!("Variance must be finite and positive, got {}.", variance).into());
    }
    Ok(())
}

/// Log of the normal density with mean `mean` and variance `variance` at `x`:
/// `-0.5 * (x - mean)^2 / variance - 0.5 * ln(2 * pi * variance)`.
///
/// # Errors
/// Returns an error if `variance` is non-finite or not strictly positive.
pub fn log_npdf(x: f64, mean: f64, variance: f64) -> Result<f64, ThreadSafeStdError> {
    check_variance(variance)?;
    Ok(log_npdf_unchecked(x, mean, variance))
}

/// Element-wise [`log_npdf`] over `x`.
pub fn log_npdf_array(
    x: ArrayView1<f64>,
    mean: f64,
    variance: f64,
) -> Result<Array1<f64>, ThreadSafeStdError> {
    check_variance(variance)?;
    Ok(x.mapv(|xi| log_npdf_unchecked(xi, mean, variance)))
}

#[inline]
fn log_npdf_unchecked(x: f64, mean: f64, variance: f64) -> f64 {
    let diff = x - mean;
    -0.5 * diff * diff / variance - 0.5 * (2.0 * PI * variance).ln()
}
