//! Blink-locked component scoring.
//!
//! For every independent component we average the component waveform over
//! all blink windows (aligned on the peak) to form a blink-locked template,
//! then score the template amplitude at the blink latency against the
//! component's baseline variability.
//!
//! Scoring statistic: with `m` the template value at the window
//! center, `n` the number of averaged windows and `σ` the component's
//! standard deviation over all samples *outside* every blink epoch, the
//! score is `z = |m| · √n / σ`.  Under the null hypothesis of no
//! time-locking the peak-locked mean is approximately `N(0, σ²/n)`, so `z`
//! is a proper z-score; a blink-driven component keeps its full amplitude
//! in the average and scores far above any plausible threshold.
//!
//! The procedure is fully deterministic and monotone in the threshold.

use ndarray::{Array1, Array2, ArrayView1};

use crate::blink::BlinkEvents;
use crate::error::{DenoiseError, Result};

/// Average a component over every blink window that fits entirely inside
/// the signal, aligned so index `epoch_samples / 2` is the blink latency.
///
/// Returns the template and the number of windows averaged, or `None` when
/// no window fits.
pub fn blink_locked_template(
    component: ArrayView1<f64>,
    peaks: &[usize],
    epoch_samples: usize,
) -> Option<(Array1<f64>, usize)> {
    let n_t = component.len();
    let half = epoch_samples / 2;
    let tail = epoch_samples - half;

    let mut template = Array1::<f64>::zeros(epoch_samples);
    let mut used = 0usize;
    for &p in peaks {
        if p < half || p + tail > n_t {
            continue;
        }
        let window = component.slice(ndarray::s![p - half..p + tail]);
        template += &window;
        used += 1;
    }
    if used == 0 {
        return None;
    }
    template.mapv_inplace(|v| v / used as f64);
    Some((template, used))
}

/// Blink-locking score for every component row.
///
/// Components with zero baseline variability (constant rows) score `0.0`,
/// as does everything when `blinks` is empty.
pub fn blink_scores(
    components: &Array2<f64>,
    blinks: &BlinkEvents,
    epoch_samples: usize,
) -> Result<Vec<f64>> {
    let (n_comp, n_t) = components.dim();
    if epoch_samples == 0 {
        return Err(DenoiseError::InvalidInput(
            "blink epoch width must be at least one sample".into(),
        ));
    }
    if let Some(&bad) = blinks.peaks.iter().find(|&&p| p >= n_t) {
        return Err(DenoiseError::InvalidInput(format!(
            "blink peak {bad} outside component length {n_t}"
        )));
    }
    if let Some(&(s, e)) = blinks.epochs.iter().find(|&&(s, e)| s >= e || e > n_t) {
        return Err(DenoiseError::InvalidInput(format!(
            "blink epoch ({s}, {e}) invalid for component length {n_t}"
        )));
    }

    if blinks.is_empty() {
        return Ok(vec![0.0; n_comp]);
    }

    // Baseline mask: samples covered by any blink epoch are excluded from
    // the variability estimate.
    let mut inside = vec![false; n_t];
    for &(s, e) in &blinks.epochs {
        for flag in inside.iter_mut().take(e).skip(s) {
            *flag = true;
        }
    }

    let half = epoch_samples / 2;
    let mut scores = Vec::with_capacity(n_comp);
    for row in components.rows() {
        let Some((template, used)) = blink_locked_template(row, &blinks.peaks, epoch_samples)
        else {
            scores.push(0.0);
            continue;
        };

        let baseline: Vec<f64> = row
            .iter()
            .zip(inside.iter())
            .filter(|(_, &masked)| !masked)
            .map(|(&v, _)| v)
            .collect();
        let sigma = if baseline.len() >= 2 {
            std_ddof0(&baseline)
        } else {
            // Blink epochs cover the whole signal: fall back to the full row.
            let full: Vec<f64> = row.iter().copied().collect();
            std_ddof0(&full)
        };

        if sigma <= 0.0 {
            scores.push(0.0);
            continue;
        }
        scores.push(template[half].abs() * (used as f64).sqrt() / sigma);
    }
    Ok(scores)
}

/// Indices of components whose blink score exceeds `threshold_z`, ascending.
///
/// Empty `blinks` means nothing to correlate against: the result is empty,
/// not an error.  For fixed inputs the result is exactly reproducible, and
/// raising `threshold_z` never grows the set.
pub fn find_blink_related_components(
    components: &Array2<f64>,
    blinks: &BlinkEvents,
    epoch_samples: usize,
    threshold_z: f64,
) -> Result<Vec<usize>> {
    if !(threshold_z > 0.0) || !threshold_z.is_finite() {
        return Err(DenoiseError::InvalidInput(format!(
            "threshold_z must be positive, got {threshold_z}"
        )));
    }
    let scores = blink_scores(components, blinks, epoch_samples)?;
    Ok(scores
        .iter()
        .enumerate()
        .filter(|(_, &z)| z > threshold_z)
        .map(|(i, _)| i)
        .collect())
}

fn std_ddof0(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn blinks_at(peaks: &[usize], epoch_samples: usize, n_t: usize) -> BlinkEvents {
        let half = epoch_samples / 2;
        BlinkEvents {
            epochs: peaks
                .iter()
                .map(|&p| (p.saturating_sub(half), (p + half).min(n_t)))
                .collect(),
            peaks: peaks.to_vec(),
        }
    }

    #[test]
    fn empty_peaks_score_zero_and_flag_nothing() {
        let comps = Array2::from_shape_fn((3, 500), |(c, t)| ((c + t) as f64 * 0.1).sin());
        let blinks = BlinkEvents::default();
        assert_eq!(blink_scores(&comps, &blinks, 100).unwrap(), vec![0.0; 3]);
        assert!(find_blink_related_components(&comps, &blinks, 100, 3.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn peak_locked_component_scores_high() {
        // Component 0: pulses exactly at the peaks. Component 1: unrelated sine.
        let peaks = [200usize, 500, 800];
        let mut comps = Array2::from_shape_fn((2, 1000), |(c, t)| {
            if c == 1 {
                (t as f64 * 0.11).sin()
            } else {
                0.01 * (t as f64 * 0.37).sin()
            }
        });
        for &p in &peaks {
            comps[[0, p]] += 10.0;
        }
        let blinks = blinks_at(&peaks, 100, 1000);
        let scores = blink_scores(&comps, &blinks, 100).unwrap();
        assert!(scores[0] > 100.0, "blink component score {}", scores[0]);
        assert!(scores[1] < 10.0, "sine component score {}", scores[1]);

        let flagged = find_blink_related_components(&comps, &blinks, 100, 50.0).unwrap();
        assert_eq!(flagged, vec![0]);
    }

    #[test]
    fn classification_is_idempotent() {
        let peaks = [300usize, 700];
        let mut comps = Array2::from_shape_fn((4, 1200), |(c, t)| ((c * 3 + t) as f64 * 0.07).sin());
        for &p in &peaks {
            comps[[2, p]] += 8.0;
        }
        let blinks = blinks_at(&peaks, 80, 1200);
        let a = find_blink_related_components(&comps, &blinks, 80, 5.0).unwrap();
        let b = find_blink_related_components(&comps, &blinks, 80, 5.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn raising_threshold_never_grows_the_set() {
        let peaks = [300usize, 700];
        let mut comps = Array2::from_shape_fn((4, 1200), |(c, t)| ((c * 3 + t) as f64 * 0.07).sin());
        for &p in &peaks {
            comps[[2, p]] += 8.0;
        }
        let blinks = blinks_at(&peaks, 80, 1200);
        let mut prev_len = usize::MAX;
        for thr in [0.5, 1.0, 2.0, 5.0, 20.0, 1e6] {
            let flagged =
                find_blink_related_components(&comps, &blinks, 80, thr).unwrap();
            assert!(flagged.len() <= prev_len, "set grew at threshold {thr}");
            prev_len = flagged.len();
        }
        assert_eq!(prev_len, 0);
    }

    #[test]
    fn constant_component_scores_zero() {
        let comps = Array2::from_elem((1, 400), 2.5);
        let blinks = blinks_at(&[200], 50, 400);
        assert_eq!(blink_scores(&comps, &blinks, 50).unwrap(), vec![0.0]);
    }

    #[test]
    fn out_of_range_peak_rejected() {
        let comps = Array2::zeros((2, 100));
        let blinks = BlinkEvents {
            epochs: vec![(50, 100)],
            peaks: vec![100],
        };
        assert!(matches!(
            blink_scores(&comps, &blinks, 20),
            Err(DenoiseError::InvalidInput(_))
        ));
    }

    #[test]
    fn non_positive_threshold_rejected() {
        let comps = Array2::zeros((2, 100));
        let blinks = BlinkEvents::default();
        assert!(find_blink_related_components(&comps, &blinks, 20, 0.0).is_err());
    }

    #[test]
    fn template_alignment_puts_peak_at_center() {
        let mut comps = Array2::<f64>::zeros((1, 600));
        for &p in &[200usize, 400] {
            comps[[0, p]] = 1.0;
        }
        let (template, used) =
            blink_locked_template(comps.row(0), &[200, 400], 100).unwrap();
        assert_eq!(used, 2);
        approx::assert_abs_diff_eq!(template[50], 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(template[0], 0.0, epsilon = 1e-12);
    }
}
