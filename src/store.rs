//! In-memory representation of a multi-channel recording.
//!
//! [`SignalStore`] carries the sample matrix plus everything the pipeline
//! must pass through untouched: channel labels, stimulus events and the
//! original pre-segmentation event list (`ur_events`).  Every stage that
//! produces a new signal goes through [`SignalStore::with_samples`] so the
//! metadata can never drift out of sync with the data.

use ndarray::Array2;

use crate::error::{DenoiseError, Result};

/// One entry of the original (pre-segment-removal) event list.
///
/// Opaque pass-through metadata: the core never interprets it, it only has
/// to survive a load/save round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrEvent {
    pub code: i32,
    pub latency: i64,
}

/// A multi-channel time series with per-channel metadata and event markers.
///
/// Shape convention throughout the crate: `samples` is `[C, T]`
/// (channels × time), `f64`.
#[derive(Debug, Clone)]
pub struct SignalStore {
    /// Signal data, shape `[C, T]`.
    pub samples: Array2<f64>,
    /// Sampling rate in Hz. Must be positive.
    pub sample_rate: f64,
    /// One label per channel, unique, `len == C`.
    pub channel_labels: Vec<String>,
    /// Stimulus event codes (may be empty).
    pub event_types: Vec<i32>,
    /// Sample index of each event, `len == event_types.len()`, each `< T`.
    pub event_latencies: Vec<usize>,
    /// Original event list, passed through unchanged.
    pub ur_events: Vec<UrEvent>,
}

impl SignalStore {
    /// Build a store with no events and validate it.
    pub fn new(
        samples: Array2<f64>,
        sample_rate: f64,
        channel_labels: Vec<String>,
    ) -> Result<Self> {
        let store = Self {
            samples,
            sample_rate,
            channel_labels,
            event_types: vec![],
            event_latencies: vec![],
            ur_events: vec![],
        };
        store.validate()?;
        Ok(store)
    }

    pub fn n_channels(&self) -> usize {
        self.samples.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.samples.ncols()
    }

    /// Check every structural invariant; `InvalidInput` on the first breach.
    pub fn validate(&self) -> Result<()> {
        let (n_ch, n_t) = self.samples.dim();
        if n_ch == 0 || n_t == 0 {
            return Err(DenoiseError::InvalidInput(format!(
                "signal must be non-empty, got {n_ch} channels x {n_t} samples"
            )));
        }
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(DenoiseError::InvalidInput(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.channel_labels.len() != n_ch {
            return Err(DenoiseError::InvalidInput(format!(
                "{} channel labels for {n_ch} channels",
                self.channel_labels.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for label in &self.channel_labels {
            if !seen.insert(label.as_str()) {
                return Err(DenoiseError::InvalidInput(format!(
                    "duplicate channel label {label:?}"
                )));
            }
        }
        if self.event_types.len() != self.event_latencies.len() {
            return Err(DenoiseError::InvalidInput(format!(
                "{} event types but {} event latencies",
                self.event_types.len(),
                self.event_latencies.len()
            )));
        }
        if let Some(&bad) = self.event_latencies.iter().find(|&&l| l >= n_t) {
            return Err(DenoiseError::InvalidInput(format!(
                "event latency {bad} outside signal of length {n_t}"
            )));
        }
        Ok(())
    }

    /// New store with the same metadata and a replacement sample array.
    ///
    /// The replacement must have the same shape as the original so labels
    /// and event latencies stay valid.
    pub fn with_samples(&self, samples: Array2<f64>) -> Result<SignalStore> {
        if samples.dim() != self.samples.dim() {
            return Err(DenoiseError::InvalidInput(format!(
                "replacement samples have shape {:?}, expected {:?}",
                samples.dim(),
                self.samples.dim()
            )));
        }
        let store = SignalStore {
            samples,
            sample_rate: self.sample_rate,
            channel_labels: self.channel_labels.clone(),
            event_types: self.event_types.clone(),
            event_latencies: self.event_latencies.clone(),
            ur_events: self.ur_events.clone(),
        };
        store.validate()?;
        Ok(store)
    }
}
