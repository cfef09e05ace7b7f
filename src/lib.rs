//! # eegica — ICA-based ocular-artifact removal for EEG
//!
//! `eegica` is the denoising core of an offline EEG preprocessing pipeline:
//! it takes an already-filtered multi-channel EEG recording plus an
//! already-filtered EOG (ocular) recording, locates eye blinks, decomposes
//! the EEG into independent components, flags the blink-driven components
//! and projects the rest back into channel space.
//!
//! Pure Rust, no BLAS: linear algebra comes from
//! [linfa-linalg](https://crates.io/crates/linfa-linalg).
//!
//! ## Pipeline overview
//!
//! ```text
//! {subject}_EOG_filt.safetensors        {subject}_EEG_filt.safetensors
//!   │                                     │
//!   ├─ detect_blinks()                    ├─ ica::decompose()
//!   │    peaks + non-overlapping epochs   │    whiten → fixed-point ICA
//!   │                                     │    → (W, M = pinv(W), components)
//!   └────────────┬────────────────────────┘
//!                │
//!                ├─ find_blink_related_components()
//!                │    peak-locked template z-score > threshold_z
//!                │
//!                └─ denoise_components()
//!                     zero flagged rows, M · components
//!                       │
//!                       └─→ {subject}_EEG_denoised.safetensors
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegica::{denoise_pipeline, detect_blinks, load_store, save_store, PipelineConfig};
//! use std::path::Path;
//!
//! let dir = Path::new("data/processed");
//! let cfg = PipelineConfig::default();
//!
//! // 1. Blink detection on the filtered ocular channel.
//! let eog = load_store("S01", "EOG_filt", dir)?;
//! let blinks = detect_blinks(&eog, cfg.blink_epoch_dur, cfg.blink_threshold_sd)?;
//!
//! // 2. ICA decomposition + blink-component removal on the filtered EEG.
//! let eeg = load_store("S01", "EEG_filt", dir)?;
//! let denoised = denoise_pipeline(&eeg, &blinks, &cfg)?;
//!
//! // 3. Persist for the ERP-extraction stage.
//! save_store(&denoised, "S01", "EEG_denoised", dir)?;
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Running individual stages
//!
//! Every stage is also exposed directly ([`ica::decompose`],
//! [`find_blink_related_components`], [`denoise_components`]) — the
//! `ica_steps` binary uses them to dump every intermediate array for
//! inspection.
//!
//! ## Determinism
//!
//! ICA initialisation is driven by [`PipelineConfig::seed`]; a run with the
//! same data and seed is exactly reproducible.  Component *order and sign*
//! are still arbitrary across seeds (inherent ICA indeterminacy), so
//! component indices are only meaningful within one decomposition.

pub mod blink;
pub mod classify;
pub mod config;
pub mod error;
pub mod ica;
pub mod io;
pub mod reconstruct;
pub mod store;

use log::info;

// ── Crate-root re-exports ─────────────────────────────────────────────────
//
// Everything a downstream user is likely to need is available directly as
// `eegica::Foo` without having to know the internal module layout.

pub use blink::{detect_blinks, BlinkEvents};
pub use classify::{blink_locked_template, blink_scores, find_blink_related_components};
pub use config::PipelineConfig;
pub use error::{DenoiseError, Result};
pub use ica::{decompose, Decomposition};
pub use io::{load_store, save_store, store_path, SafetensorsWriter};
pub use reconstruct::denoise_components;
pub use store::{SignalStore, UrEvent};

/// Run the **ICA denoising pipeline** on one subject's filtered EEG.
///
/// Chains the three core stages:
///
/// 1. [`ica::decompose`] — whitening + fixed-point ICA, seeded by
///    [`PipelineConfig::seed`].
/// 2. [`find_blink_related_components`] — peak-locked template z-score
///    against `blinks`, threshold [`PipelineConfig::threshold_z`].
/// 3. [`denoise_components`] — zero the flagged components and project the
///    remainder back through the mixing matrix.
///
/// The result carries the input's metadata (labels, events, `ur_events`)
/// unchanged and has exactly the input's shape.  With no blink events the
/// result is the input reproduced up to floating-point round-trip error.
///
/// # Errors
///
/// Propagates the first stage failure; nothing is partially produced.
/// `ConvergenceFailure` is recoverable — retry with a different
/// [`PipelineConfig::seed`] or skip the subject.
pub fn denoise_pipeline(
    eeg: &SignalStore,
    blinks: &BlinkEvents,
    cfg: &PipelineConfig,
) -> Result<SignalStore> {
    let deco = ica::decompose(eeg, cfg)?;

    let epoch_samples = cfg.blink_epoch_samples(eeg.sample_rate);
    let artifacts =
        find_blink_related_components(&deco.components, blinks, epoch_samples, cfg.threshold_z)?;
    info!(
        "flagged {} of {} components as blink-related: {:?}",
        artifacts.len(),
        eeg.n_channels(),
        artifacts
    );

    let denoised = denoise_components(&deco.mixing, &deco.components, &artifacts)?;
    eeg.with_samples(denoised)
}
