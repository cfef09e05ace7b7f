/// ica_steps: run every denoising stage for one subject and write all
/// intermediate arrays to a single safetensors file for inspection.
///
/// Output keys:
///   unmixing        [C, C]  f64  channel space → component space
///   mixing          [C, C]  f64  pseudo-inverse of unmixing
///   components      [C, T]  f64  unmixing · samples
///   scores          [C]     f64  blink-locking z-score per component
///   artifacts       [K]     i32  flagged component indices
///   blink_peaks     [B]     i64  detected blink peak samples
///   denoised        [C, T]  f64  reconstruction without the flagged rows
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use eegica::{
    blink_scores, decompose, denoise_components, detect_blinks, load_store, PipelineConfig,
    SafetensorsWriter,
};

#[derive(Parser, Debug)]
#[command(name = "ica_steps")]
struct Args {
    /// Directory holding `{subject}_EEG_filt` / `{subject}_EOG_filt`.
    #[arg(long)]
    data_dir: PathBuf,

    /// Subject ID.
    #[arg(long)]
    subject: String,

    /// Output safetensors path.
    #[arg(long)]
    output: PathBuf,

    /// Blink epoch duration (s).
    #[arg(long, default_value_t = 0.4)]
    epoch_dur: f64,

    /// z-score threshold for flagging blink components.
    #[arg(long, default_value_t = 5.0)]
    threshold_z: f64,

    /// ICA initialisation seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let cfg = PipelineConfig {
        blink_epoch_dur: args.epoch_dur,
        threshold_z: args.threshold_z,
        seed: args.seed,
        ..PipelineConfig::default()
    };

    // ── 1. Blink detection on the EOG ──────────────────────────────────────
    let t_blink = Instant::now();
    let eog = load_store(&args.subject, "EOG_filt", &args.data_dir)?;
    let blinks = detect_blinks(&eog, cfg.blink_epoch_dur, cfg.blink_threshold_sd)?;
    let ms_blink = t_blink.elapsed().as_secs_f64() * 1000.0;

    // ── 2. ICA on the EEG ──────────────────────────────────────────────────
    let t_ica = Instant::now();
    let eeg = load_store(&args.subject, "EEG_filt", &args.data_dir)?;
    let deco = decompose(&eeg, &cfg).context("ICA decomposition")?;
    let ms_ica = t_ica.elapsed().as_secs_f64() * 1000.0;

    // ── 3. Component scoring ───────────────────────────────────────────────
    let epoch_samples = cfg.blink_epoch_samples(eeg.sample_rate);
    let scores = blink_scores(&deco.components, &blinks, epoch_samples)?;
    let artifacts: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, &z)| z > cfg.threshold_z)
        .map(|(i, _)| i)
        .collect();

    // ── 4. Reconstruction ──────────────────────────────────────────────────
    let denoised = denoise_components(&deco.mixing, &deco.components, &artifacts)?;

    eprintln!(
        "TIMING blink={ms_blink:.4}ms ica={ms_ica:.4}ms  \
         {} ch  {} blink(s)  flagged {:?}",
        eeg.n_channels(),
        blinks.len(),
        artifacts
    );

    // ── 5. Write output ────────────────────────────────────────────────────
    eprintln!("Writing → {}", args.output.display());
    let mut w = SafetensorsWriter::new();
    w.add_f64_arr2("unmixing", &deco.unmixing);
    w.add_f64_arr2("mixing", &deco.mixing);
    w.add_f64_arr2("components", &deco.components);
    w.add_f64("scores", &scores, &[scores.len()]);
    let artifact_i32: Vec<i32> = artifacts.iter().map(|&i| i as i32).collect();
    w.add_i32("artifacts", &artifact_i32, &[artifact_i32.len()]);
    let peaks_i64: Vec<i64> = blinks.peaks.iter().map(|&p| p as i64).collect();
    w.add_i64("blink_peaks", &peaks_i64, &[peaks_i64.len()]);
    w.add_f64_arr2("denoised", &denoised);
    w.write(&args.output)?;

    eprintln!("Done.");
    Ok(())
}
