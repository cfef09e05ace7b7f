/// denoise: batch ICA denoising over a list of subjects.
///
/// For each subject, loads `{sid}_EOG_filt.safetensors` and
/// `{sid}_EEG_filt.safetensors` from the data directory, detects blinks,
/// runs ICA, removes blink-related components and writes
/// `{sid}_EEG_denoised.safetensors`.
///
/// Failure policy: a subject that fails is logged and skipped — the batch
/// never aborts, and a failed subject writes no output file.  A
/// `ConvergenceFailure` is retried once with `seed + 1` before giving up.
use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

use eegica::{
    decompose, denoise_components, detect_blinks, find_blink_related_components, load_store,
    save_store, Decomposition, DenoiseError, PipelineConfig, SignalStore,
};

const EEG_INPUT: &str = "EEG_filt";
const EOG_INPUT: &str = "EOG_filt";
const EEG_OUTPUT: &str = "EEG_denoised";

#[derive(Parser, Debug)]
#[command(name = "denoise", about = "ICA-based blink removal, one subject at a time")]
struct Args {
    /// Directory holding the processed per-subject safetensors files.
    #[arg(long)]
    data_dir: PathBuf,

    /// Subject IDs, comma-separated (e.g. "S01,S02,S03").
    #[arg(long)]
    subjects: String,

    /// Blink epoch duration (s).
    #[arg(long, default_value_t = 0.4)]
    epoch_dur: f64,

    /// Blink amplitude threshold (standard deviations above the mean).
    #[arg(long, default_value_t = 3.0)]
    blink_sd: f64,

    /// z-score threshold for flagging blink components.
    #[arg(long, default_value_t = 5.0)]
    threshold_z: f64,

    /// Use deflationary extraction instead of symmetric decorrelation.
    #[arg(long, default_value_t = false)]
    deflation: bool,

    /// Kurtosis-adaptive contrast (for mixed sub/super-Gaussian sources).
    #[arg(long, default_value_t = false)]
    extended: bool,

    /// ICA initialisation seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// ICA iteration cap.
    #[arg(long, default_value_t = 500)]
    max_iter: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = PipelineConfig {
        blink_epoch_dur: args.epoch_dur,
        blink_threshold_sd: args.blink_sd,
        threshold_z: args.threshold_z,
        ortho: !args.deflation,
        extended: args.extended,
        max_iter: args.max_iter,
        seed: args.seed,
        ..PipelineConfig::default()
    };

    let subjects: Vec<&str> = args
        .subjects
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    anyhow::ensure!(!subjects.is_empty(), "no subjects given");

    let mut failed = 0usize;
    for sid in &subjects {
        match process_subject(sid, &args.data_dir, &cfg) {
            Ok(removed) => {
                info!("{sid}: done, removed components {removed:?}");
            }
            Err(e) => {
                error!("{sid}: {e:#}, skipping");
                failed += 1;
            }
        }
    }

    info!(
        "batch finished: {}/{} subjects ok",
        subjects.len() - failed,
        subjects.len()
    );
    anyhow::ensure!(failed < subjects.len(), "every subject failed");
    Ok(())
}

fn process_subject(sid: &str, dir: &Path, cfg: &PipelineConfig) -> Result<Vec<usize>> {
    let eog = load_store(sid, EOG_INPUT, dir).context("loading filtered EOG")?;
    let blinks = detect_blinks(&eog, cfg.blink_epoch_dur, cfg.blink_threshold_sd)
        .context("blink detection")?;
    info!("{sid}: {} blink(s) detected", blinks.len());
    if blinks.is_empty() {
        warn!("{sid}: no blinks above threshold; output will keep all components");
    }

    let eeg = load_store(sid, EEG_INPUT, dir).context("loading filtered EEG")?;

    let deco = decompose_with_retry(sid, &eeg, cfg)?;

    let epoch_samples = cfg.blink_epoch_samples(eeg.sample_rate);
    let artifacts =
        find_blink_related_components(&deco.components, &blinks, epoch_samples, cfg.threshold_z)
            .context("component classification")?;

    let samples = denoise_components(&deco.mixing, &deco.components, &artifacts)
        .context("reconstruction")?;
    let denoised = eeg.with_samples(samples).context("rebuilding store")?;

    save_store(&denoised, sid, EEG_OUTPUT, dir).context("saving denoised EEG")?;
    Ok(artifacts)
}

/// ConvergenceFailure is the one recoverable condition: one retry with a
/// fresh initialisation before the subject is given up.
fn decompose_with_retry(
    sid: &str,
    eeg: &SignalStore,
    cfg: &PipelineConfig,
) -> Result<Decomposition> {
    match decompose(eeg, cfg) {
        Ok(deco) => Ok(deco),
        Err(DenoiseError::ConvergenceFailure { iterations, delta }) => {
            warn!(
                "{sid}: ICA stopped after {iterations} iterations (delta {delta:.3e}); \
                 retrying with seed {}",
                cfg.seed + 1
            );
            let retry_cfg = PipelineConfig {
                seed: cfg.seed + 1,
                ..cfg.clone()
            };
            decompose(eeg, &retry_cfg).context("ICA retry")
        }
        Err(e) => Err(e).context("ICA decomposition"),
    }
}
