//! Centering and ZCA whitening.
//!
//! ICA conditioning demands decorrelated, unit-variance input.  The channel
//! covariance is eigendecomposed and the symmetric (ZCA) whitening matrix
//! `K = V Λ^{-1/2} Vᵀ` is applied to the centered data, after which the
//! whitened covariance is the identity.  Eigenvalues below a relative floor
//! are clamped; that happens only when the covariance is nearly singular
//! (e.g. a duplicated channel) and is reported as a warning.

use linfa_linalg::eigh::Eigh;
use log::warn;
use ndarray::{Array1, Array2, Axis};

use crate::error::{DenoiseError, Result};

/// Relative eigenvalue floor for the covariance, as a fraction of the
/// largest eigenvalue.
const EIG_FLOOR_REL: f64 = 1e-12;

/// Result of whitening a `[C, T]` signal.
#[derive(Debug, Clone)]
pub struct Whitened {
    /// ZCA whitening matrix `K`, shape `[C, C]`.
    pub matrix: Array2<f64>,
    /// `K · (X - μ)`, shape `[C, T]`, unit covariance.
    pub data: Array2<f64>,
    /// Per-channel means `μ` removed before whitening.
    pub means: Array1<f64>,
}

/// Center each channel and whiten the result.
pub fn whiten(samples: &Array2<f64>) -> Result<Whitened> {
    let (n_ch, n_t) = samples.dim();
    if n_ch == 0 || n_t < 2 {
        return Err(DenoiseError::InvalidInput(format!(
            "cannot whiten a {n_ch} x {n_t} signal"
        )));
    }

    let means = samples
        .mean_axis(Axis(1))
        .ok_or_else(|| DenoiseError::InvalidInput("signal has zero samples".into()))?;
    let mut centered = samples.to_owned();
    for (mut row, &m) in centered.rows_mut().into_iter().zip(means.iter()) {
        row.mapv_inplace(|v| v - m);
    }

    let cov = centered.dot(&centered.t()) / (n_t as f64 - 1.0);
    let (vals, vecs) = cov.eigh().map_err(|e| {
        DenoiseError::Numerical(format!("eigendecomposition of channel covariance failed: {e}"))
    })?;

    let lam_max = vals.iter().fold(0.0_f64, |a, &b| a.max(b));
    if lam_max <= 0.0 {
        return Err(DenoiseError::Numerical(
            "channel covariance has no positive eigenvalue (constant signal?)".into(),
        ));
    }
    let floor = lam_max * EIG_FLOOR_REL;
    let floored = vals.iter().filter(|&&l| l < floor).count();
    if floored > 0 {
        warn!(
            "channel covariance nearly singular: {floored} of {n_ch} eigenvalues \
             below {floor:.3e}, clamped for whitening"
        );
    }

    let scale = vals.mapv(|l| 1.0 / l.max(floor).sqrt());
    // K = V diag(scale) Vᵀ  (column j of V scaled by scale[j]).
    let matrix = (&vecs * &scale).dot(&vecs.t());
    let data = matrix.dot(&centered);

    Ok(Whitened { matrix, data, means })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn whitened_covariance_is_identity() {
        // Correlated channels built from shared sinusoids.
        let data = Array2::from_shape_fn((3, 2000), |(c, t)| {
            let x = t as f64 / 250.0;
            (2.0 * std::f64::consts::PI * 7.0 * x).sin()
                + 0.5 * (c as f64 + 1.0) * (2.0 * std::f64::consts::PI * 13.0 * x).sin()
                + 0.1 * ((c * 7919 + t * 60013) % 1000) as f64 / 1000.0
        });
        let wh = whiten(&data).unwrap();
        let n_t = wh.data.ncols() as f64;
        let cov = wh.data.dot(&wh.data.t()) / (n_t - 1.0);
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                approx::assert_abs_diff_eq!(cov[[i, j]], expect, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn whitening_matrix_is_symmetric() {
        let data = Array2::from_shape_fn((4, 500), |(c, t)| {
            ((c * 13 + t * 7) as f64 * 0.37).sin()
        });
        let wh = whiten(&data).unwrap();
        for i in 0..4 {
            for j in 0..4 {
                approx::assert_abs_diff_eq!(
                    wh.matrix[[i, j]],
                    wh.matrix[[j, i]],
                    epsilon = 1e-10
                );
            }
        }
    }

    #[test]
    fn constant_signal_rejected() {
        let data = Array2::from_elem((2, 100), 3.0);
        assert!(whiten(&data).is_err());
    }

    #[test]
    fn too_short_signal_rejected() {
        let data = Array2::zeros((2, 1));
        assert!(whiten(&data).is_err());
    }
}
