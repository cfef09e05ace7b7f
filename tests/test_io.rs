mod common;
use common::eeg_store;
use eegica::{load_store, save_store, store_path};
use std::path::PathBuf;

/// Fresh scratch directory per test so parallel tests never collide.
fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("eegica_test_{}_{tag}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn save_then_load_round_trips_every_field() {
    let dir = scratch_dir("roundtrip");
    let store = eeg_store();
    save_store(&store, "S01", "EEG_filt", &dir).unwrap();

    let loaded = load_store("S01", "EEG_filt", &dir).unwrap();
    assert_eq!(loaded.samples, store.samples); // f64 bits preserved
    assert_eq!(loaded.sample_rate, store.sample_rate);
    assert_eq!(loaded.channel_labels, store.channel_labels);
    assert_eq!(loaded.event_types, store.event_types);
    assert_eq!(loaded.event_latencies, store.event_latencies);
    assert_eq!(loaded.ur_events, store.ur_events);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn files_are_keyed_by_subject_and_dataset() {
    let dir = scratch_dir("keying");
    let store = eeg_store();
    save_store(&store, "S07", "EEG_denoised", &dir).unwrap();

    let path = store_path(&dir, "S07", "EEG_denoised");
    assert!(path.exists(), "missing {}", path.display());
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("S07_EEG_denoised"));
    // No stray temp file left behind.
    assert!(!path.with_extension("safetensors.tmp").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_is_an_error() {
    let dir = scratch_dir("missing");
    assert!(load_store("S99", "EEG_filt", &dir).is_err());
}

#[test]
fn truncated_file_is_rejected() {
    let dir = scratch_dir("truncated");
    std::fs::create_dir_all(&dir).unwrap();
    let path = store_path(&dir, "S01", "EEG_filt");
    std::fs::write(&path, [0u8; 4]).unwrap();
    assert!(load_store("S01", "EEG_filt", &dir).is_err());

    let _ = std::fs::remove_dir_all(&dir);
}
