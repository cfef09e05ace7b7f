//! Blink detection on a filtered ocular (EOG) trace.
//!
//! Candidate peaks are strict local maxima above `mean + k·std`; a minimum
//! inter-peak distance of one full epoch width suppresses double counts and
//! guarantees the derived windows never overlap.  When two candidates fall
//! inside the same window the larger one wins.

use ndarray::Axis;

use crate::error::{DenoiseError, Result};
use crate::store::SignalStore;

/// Detected blinks: time windows plus the peak sample inside each.
///
/// Created once per subject from the filtered EOG; consumed read-only by the
/// component classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlinkEvents {
    /// Half-open `(start, end)` windows, time-ordered, non-overlapping,
    /// each contained in `[0, T)`.
    pub epochs: Vec<(usize, usize)>,
    /// Peak sample indices, strictly increasing, one per blink.
    pub peaks: Vec<usize>,
}

impl BlinkEvents {
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }
}

/// Locate blinks in `signal` and cut an epoch of `epoch_dur` seconds around
/// each peak.
///
/// Multi-channel input is reduced to a single trace by averaging across
/// channels.  The amplitude threshold is `mean + threshold_sd · std` of that
/// trace.  An epoch wider than the signal is clipped, not an error; a signal
/// with nothing above threshold yields an empty result.
///
/// # Errors
///
/// `InvalidInput` when the store is malformed (zero channels, non-positive
/// sample rate) or `epoch_dur <= 0`.
pub fn detect_blinks(
    signal: &SignalStore,
    epoch_dur: f64,
    threshold_sd: f64,
) -> Result<BlinkEvents> {
    signal.validate()?;
    if !(epoch_dur > 0.0) || !epoch_dur.is_finite() {
        return Err(DenoiseError::InvalidInput(format!(
            "blink epoch duration must be positive, got {epoch_dur}"
        )));
    }
    if !(threshold_sd > 0.0) || !threshold_sd.is_finite() {
        return Err(DenoiseError::InvalidInput(format!(
            "blink threshold must be positive, got {threshold_sd} SD"
        )));
    }

    let n = signal.n_samples();
    let trace = signal
        .samples
        .mean_axis(Axis(0))
        .ok_or_else(|| DenoiseError::InvalidInput("signal has zero channels".into()))?;

    let mean = trace.mean().unwrap_or(0.0);
    let var = trace.mapv(|v| (v - mean) * (v - mean)).mean().unwrap_or(0.0);
    let thr = mean + threshold_sd * var.sqrt();

    // Window width in samples, clipped to the signal length.
    let epoch_samples = ((epoch_dur * signal.sample_rate).round() as usize)
        .clamp(2, n.max(2));
    let half = epoch_samples / 2;

    // Strict local maxima above threshold. The non-strict right comparison
    // keeps the first sample of a flat-topped peak.
    let mut candidates: Vec<usize> = (1..n.saturating_sub(1))
        .filter(|&i| trace[i] > thr && trace[i] > trace[i - 1] && trace[i] >= trace[i + 1])
        .collect();

    // Enforce the minimum distance, highest amplitude first (ties broken by
    // position so the result is fully deterministic).
    candidates.sort_by(|&a, &b| trace[b].total_cmp(&trace[a]).then(a.cmp(&b)));
    let mut peaks: Vec<usize> = Vec::new();
    for &p in &candidates {
        if peaks.iter().all(|&q| p.abs_diff(q) >= epoch_samples) {
            peaks.push(p);
        }
    }
    peaks.sort_unstable();

    let epochs = peaks
        .iter()
        .map(|&p| (p.saturating_sub(half), (p + half).min(n)))
        .collect();

    Ok(BlinkEvents { epochs, peaks })
}
