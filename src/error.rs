//! Error taxonomy for the denoising core.
//!
//! Three failure classes matter to a batch caller:
//! - [`DenoiseError::InvalidInput`] — malformed shapes, out-of-range indices,
//!   non-positive rates or durations. Always fatal to the current subject.
//! - [`DenoiseError::InsufficientData`] — the recording is structurally fine
//!   but too short relative to its channel count for a stable decomposition.
//!   Log and move on to the next subject.
//! - [`DenoiseError::ConvergenceFailure`] — the ICA iteration hit its cap.
//!   Recoverable: retry with a different seed, or skip the subject.
//!
//! Near-singular matrices are *not* errors; the pseudo-inverse proceeds
//! best-effort and the condition is reported through `log::warn!`.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, DenoiseError>;

#[derive(Debug, Error)]
pub enum DenoiseError {
    /// Malformed input: bad shapes, out-of-range indices, non-positive
    /// sample rate or duration. Never silently corrected.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Signal too short relative to channel count for a stable ICA fit.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// ICA did not reach tolerance within the bounded iteration count.
    #[error("ICA did not converge after {iterations} iterations (last delta {delta:.3e})")]
    ConvergenceFailure { iterations: usize, delta: f64 },

    /// Failure inside the linear-algebra layer (eigendecomposition / SVD).
    #[error("numerical failure: {0}")]
    Numerical(String),
}
