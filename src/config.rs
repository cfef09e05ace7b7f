//! Pipeline configuration.
//!
//! [`PipelineConfig`] holds every tunable parameter for blink detection,
//! ICA decomposition and artifact thresholding.  All fields have defaults
//! matching the values used for the experiment's batch runs.

/// Configuration for the full denoising pipeline.
///
/// All fields are `pub` so you can construct one with struct-update syntax:
///
/// ```
/// use eegica::PipelineConfig;
///
/// let cfg = PipelineConfig {
///     threshold_z: 4.0,     // more aggressive component rejection
///     extended: true,       // kurtosis-adaptive contrast
///     ..PipelineConfig::default()
/// };
/// assert!(cfg.ortho);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Width of the window cut around each detected blink peak, in seconds.
    ///
    /// Also the alignment window for component scoring.  Windows are clipped
    /// to the signal bounds, never an error.
    ///
    /// Default: `0.4` s.
    pub blink_epoch_dur: f64,

    /// Amplitude threshold for blink peaks, in standard deviations above the
    /// mean of the (channel-averaged) ocular trace.
    ///
    /// Default: `3.0`.
    pub blink_threshold_sd: f64,

    /// z-score above which a component counts as blink-related.
    ///
    /// The statistic is the peak-locked template amplitude at the blink
    /// latency, normalised by the component's baseline variability (see
    /// `classify`).  Raising this never grows the flagged set.
    ///
    /// Default: `5.0`.
    pub threshold_z: f64,

    /// Orthogonalisation scheme for the ICA iteration.
    ///
    /// `true` (default): symmetric decorrelation — all rows updated in
    /// parallel and the unmixing matrix re-orthonormalised after every
    /// iteration.  `false`: deflationary extraction, one component at a
    /// time with Gram-Schmidt against the rows already found.
    pub ortho: bool,

    /// Contrast function selection.
    ///
    /// `false` (default): log-cosh contrast for every component.
    /// `true`: per-component kurtosis estimate each iteration, cube
    /// contrast for sub-Gaussian components, log-cosh for super-Gaussian —
    /// suited to mixtures containing both.
    pub extended: bool,

    /// Iteration cap for the ICA fixed point. Exceeding it is a
    /// `ConvergenceFailure` (recoverable; try another seed).
    ///
    /// Default: `500`.
    pub max_iter: usize,

    /// Convergence tolerance on the unmixing update
    /// (`max_i |1 - |diag(W_new W_old^T)_i||`).
    ///
    /// Default: `1e-4`.
    pub tol: f64,

    /// Seed for the unmixing initialisation. Runs with the same seed and
    /// data are bit-for-bit reproducible; no process-global RNG state.
    ///
    /// Default: `42`.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            blink_epoch_dur: 0.4,
            blink_threshold_sd: 3.0,
            threshold_z: 5.0,
            ortho: true,
            extended: false,
            max_iter: 500,
            tol: 1e-4,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Blink window width in samples at a given sampling rate.
    ///
    /// ```
    /// use eegica::PipelineConfig;
    /// let cfg = PipelineConfig::default();
    /// assert_eq!(cfg.blink_epoch_samples(250.0), 100); // 0.4 s x 250 Hz
    /// ```
    pub fn blink_epoch_samples(&self, sample_rate: f64) -> usize {
        (self.blink_epoch_dur * sample_rate).round() as usize
    }
}
