//! Fixed-point ICA estimator.
//!
//! The unmixing matrix is fitted on whitened data by the classic fixed-point
//! update `W₁ = E[g(WZ)Zᵀ] - diag(E[g'(WZ)]) W`, either for all rows in
//! parallel with symmetric decorrelation (`ortho = true`) or one row at a
//! time with Gram-Schmidt deflation (`ortho = false`).  Components come out
//! in arbitrary order and sign — downstream code must not assume a fixed
//! index correspondence across runs.
//!
//! Initialisation is driven by an explicit seed so a decomposition is
//! reproducible and a `ConvergenceFailure` can be answered by reseeding.

use linfa_linalg::{eigh::Eigh, svd::SVD};
use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::{rand::SeedableRng, rand_distr::StandardNormal, RandomExt};
use rand_isaac::Isaac64Rng;

use super::whiten::whiten;
use crate::config::PipelineConfig;
use crate::error::{DenoiseError, Result};
use crate::store::SignalStore;

/// Minimum samples per channel for a stable fit: `T >= 10 * C`.
const MIN_SAMPLES_PER_CHANNEL: usize = 10;

/// Relative singular-value floor for the pseudo-inverse.
const SV_FLOOR_REL: f64 = 1e-10;

/// Result of one ICA run on a `[C, T]` signal.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Unmixing matrix `W`, shape `[C, C]`: channel space → component space.
    pub unmixing: Array2<f64>,
    /// Mixing matrix `M = pinv(W)`: component space → channel space.
    pub mixing: Array2<f64>,
    /// `W · samples`, shape `[C, T]`.  Built from the raw (uncentered)
    /// samples so `M · components` reproduces the input exactly up to
    /// floating-point error.
    pub components: Array2<f64>,
}

/// Decompose a multi-channel signal into maximally independent components.
///
/// # Errors
///
/// - `InvalidInput` for fewer than two channels or a malformed store.
/// - `InsufficientData` when `T < 10 · C`.
/// - `ConvergenceFailure` when the fixed point does not reach `cfg.tol`
///   within `cfg.max_iter` iterations.  Recoverable: retry with another
///   `cfg.seed` or skip the subject.
pub fn decompose(signal: &SignalStore, cfg: &PipelineConfig) -> Result<Decomposition> {
    signal.validate()?;
    let (n_ch, n_t) = signal.samples.dim();
    if n_ch < 2 {
        return Err(DenoiseError::InvalidInput(format!(
            "ICA needs at least 2 channels, got {n_ch}"
        )));
    }
    if n_t < MIN_SAMPLES_PER_CHANNEL * n_ch {
        return Err(DenoiseError::InsufficientData(format!(
            "{n_t} samples for {n_ch} channels; need at least {}",
            MIN_SAMPLES_PER_CHANNEL * n_ch
        )));
    }

    let wh = whiten(&signal.samples)?;

    let mut rng = Isaac64Rng::seed_from_u64(cfg.seed);
    let w0: Array2<f64> = Array2::random_using((n_ch, n_ch), StandardNormal, &mut rng);

    let w_rot = if cfg.ortho {
        ica_parallel(&wh.data, w0, cfg)?
    } else {
        ica_deflation(&wh.data, w0, cfg)?
    };

    let unmixing = w_rot.dot(&wh.matrix);
    let mixing = pinv(&unmixing)?;
    let components = unmixing.dot(&signal.samples);

    Ok(Decomposition {
        unmixing,
        mixing,
        components,
    })
}

/// Symmetric decorrelation `W ← (W Wᵀ)^{-1/2} W`.
///
/// Leaves `W` with orthonormal rows while treating all of them equally
/// (no row is privileged the way Gram-Schmidt ordering privileges earlier
/// rows).
fn sym_decorrelate(w: &Array2<f64>) -> Result<Array2<f64>> {
    let (vals, vecs) = w.dot(&w.t()).eigh().map_err(|e| {
        DenoiseError::Numerical(format!("symmetric decorrelation eigh failed: {e}"))
    })?;
    let scale = vals.mapv(|l| 1.0 / l.max(f64::EPSILON).sqrt());
    Ok((&vecs * &scale).dot(&vecs.t()).dot(w))
}

/// Elementwise contrast `g(y)` and per-row mean of `g'(y)`.
///
/// `extended = false`: log-cosh (`g = tanh`) for every row.
/// `extended = true`: per-row excess kurtosis each call; cube contrast for
/// sub-Gaussian rows, log-cosh for super-Gaussian ones.  Rows of `y` have
/// unit variance under the whitening + orthonormal-W invariant, so
/// `E[y⁴] - 3` estimates excess kurtosis directly.
fn apply_contrast(y: &Array2<f64>, extended: bool) -> (Array2<f64>, Array1<f64>) {
    let mut g = Array2::<f64>::zeros(y.raw_dim());
    let mut gprime_mean = Array1::<f64>::zeros(y.nrows());

    for (i, row) in y.axis_iter(Axis(0)).enumerate() {
        let sub_gaussian = extended && {
            let kurt = row.mapv(|v| v * v * v * v).mean().unwrap_or(0.0) - 3.0;
            kurt < 0.0
        };
        if sub_gaussian {
            g.row_mut(i).assign(&row.mapv(|v| v * v * v));
            gprime_mean[i] = 3.0 * row.mapv(|v| v * v).mean().unwrap_or(0.0);
        } else {
            let th = row.mapv(f64::tanh);
            gprime_mean[i] = th.mapv(|v| 1.0 - v * v).mean().unwrap_or(0.0);
            g.row_mut(i).assign(&th);
        }
    }
    (g, gprime_mean)
}

/// Parallel fixed point: every row updated at once, symmetric decorrelation
/// after each iteration.
fn ica_parallel(z: &Array2<f64>, w0: Array2<f64>, cfg: &PipelineConfig) -> Result<Array2<f64>> {
    let n_t = z.ncols() as f64;
    let mut w = sym_decorrelate(&w0)?;
    let mut delta = f64::INFINITY;

    for iteration in 0..cfg.max_iter {
        let wz = w.dot(z);
        let (gwz, gprime_mean) = apply_contrast(&wz, cfg.extended);
        let penalty = &w * &gprime_mean.insert_axis(Axis(1));
        let w1 = sym_decorrelate(&(gwz.dot(&z.t()) / n_t - penalty))?;

        delta = w1
            .dot(&w.t())
            .diag()
            .iter()
            .map(|d| (d.abs() - 1.0).abs())
            .fold(0.0_f64, f64::max);
        w = w1;

        if delta < cfg.tol {
            debug!("ICA converged after {} iterations (delta {delta:.3e})", iteration + 1);
            return Ok(w);
        }
    }

    Err(DenoiseError::ConvergenceFailure {
        iterations: cfg.max_iter,
        delta,
    })
}

/// Deflationary fixed point: one row at a time, Gram-Schmidt against the
/// rows already extracted.
fn ica_deflation(z: &Array2<f64>, w0: Array2<f64>, cfg: &PipelineConfig) -> Result<Array2<f64>> {
    let (n_ch, n_t) = z.dim();
    let n_t = n_t as f64;
    let mut w = Array2::<f64>::zeros((n_ch, n_ch));

    for i in 0..n_ch {
        let mut wi = w0.row(i).to_owned();
        orthonormalize_against(&mut wi, &w, i);

        let mut delta = f64::INFINITY;
        let mut converged = false;
        for _ in 0..cfg.max_iter {
            let y = wi.dot(z);
            let (gy, gprime_mean) = contrast_row(&y, cfg.extended);
            let mut wnew = z.dot(&gy) / n_t - &wi * gprime_mean;
            orthonormalize_against(&mut wnew, &w, i);

            delta = (wnew.dot(&wi).abs() - 1.0).abs();
            wi = wnew;
            if delta < cfg.tol {
                converged = true;
                break;
            }
        }
        if !converged {
            return Err(DenoiseError::ConvergenceFailure {
                iterations: cfg.max_iter,
                delta,
            });
        }
        w.row_mut(i).assign(&wi);
    }
    Ok(w)
}

/// 1-D counterpart of [`apply_contrast`] for the deflation scheme.
fn contrast_row(y: &Array1<f64>, extended: bool) -> (Array1<f64>, f64) {
    let sub_gaussian = extended && {
        let kurt = y.mapv(|v| v * v * v * v).mean().unwrap_or(0.0) - 3.0;
        kurt < 0.0
    };
    if sub_gaussian {
        let gprime_mean = 3.0 * y.mapv(|v| v * v).mean().unwrap_or(0.0);
        (y.mapv(|v| v * v * v), gprime_mean)
    } else {
        let th = y.mapv(f64::tanh);
        let gprime_mean = th.mapv(|v| 1.0 - v * v).mean().unwrap_or(0.0);
        (th, gprime_mean)
    }
}

/// Project `v` away from the first `count` rows of `w`, then normalise.
fn orthonormalize_against(v: &mut Array1<f64>, w: &Array2<f64>, count: usize) {
    for j in 0..count {
        let proj = v.dot(&w.row(j));
        *v = &*v - &(&w.row(j) * proj);
    }
    let norm = v.dot(v).sqrt().max(f64::EPSILON);
    v.mapv_inplace(|x| x / norm);
}

/// SVD pseudo-inverse with a relative singular-value floor.
///
/// Singular values below `1e-10 · σ_max` are treated as zero; when that
/// happens the matrix was nearly singular and reconstruction falls back to
/// the best-effort pseudo-inverse, reported as a warning rather than an
/// error.
pub fn pinv(a: &Array2<f64>) -> Result<Array2<f64>> {
    let (u_opt, s, vt_opt) = a
        .svd(true, true)
        .map_err(|e| DenoiseError::Numerical(format!("SVD failed: {e}")))?;
    let u = u_opt.ok_or_else(|| DenoiseError::Numerical("SVD returned no U factor".into()))?;
    let vt = vt_opt.ok_or_else(|| DenoiseError::Numerical("SVD returned no Vᵀ factor".into()))?;

    let s_max = s.iter().fold(0.0_f64, |a, &b| a.max(b));
    if s_max <= 0.0 {
        return Err(DenoiseError::Numerical(
            "cannot pseudo-invert a zero matrix".into(),
        ));
    }
    let floor = s_max * SV_FLOOR_REL;
    let truncated = s.iter().filter(|&&v| v < floor).count();
    if truncated > 0 {
        warn!(
            "unmixing matrix nearly singular: {truncated} singular value(s) \
             truncated in the pseudo-inverse"
        );
    }
    let s_inv = s.mapv(|v| if v < floor { 0.0 } else { 1.0 / v });

    // pinv = V diag(1/σ) Uᵀ  (column j of V scaled by s_inv[j]).
    Ok((&vt.t() * &s_inv).dot(&u.t()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn sym_decorrelate_yields_orthonormal_rows() {
        let w = array![[2.0, 0.3, -0.5], [0.1, 1.5, 0.7], [-0.6, 0.2, 0.9]];
        let q = sym_decorrelate(&w).unwrap();
        let qqt = q.dot(&q.t());
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                approx::assert_abs_diff_eq!(qqt[[i, j]], expect, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn pinv_of_invertible_matrix_is_inverse() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let p = pinv(&a).unwrap();
        let ident = a.dot(&p);
        for i in 0..2 {
            for j in 0..2 {
                let expect = if i == j { 1.0 } else { 0.0 };
                approx::assert_abs_diff_eq!(ident[[i, j]], expect, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn pinv_satisfies_moore_penrose_on_singular_matrix() {
        // Rank-1 matrix: A · pinv(A) · A == A must still hold.
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let p = pinv(&a).unwrap();
        let back = a.dot(&p).dot(&a);
        for i in 0..2 {
            for j in 0..2 {
                approx::assert_abs_diff_eq!(back[[i, j]], a[[i, j]], epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn orthonormalize_produces_unit_norm() {
        let w = array![[1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, 0.0, 0.0]];
        let mut v = array![3.0, 4.0, 0.0];
        orthonormalize_against(&mut v, &w, 1);
        // Component along row 0 removed, rest normalised.
        approx::assert_abs_diff_eq!(v[0], 0.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(v.dot(&v), 1.0, epsilon = 1e-12);
    }
}
