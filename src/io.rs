//! Safetensors persistence for [`SignalStore`].
//!
//! Per-subject files are keyed `{subject_id}_{dataset_name}.safetensors`
//! under a processed-data directory.  Every store field round-trips
//! losslessly so pipeline stages can be chained across separate runs.
//!
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! subject that fails mid-write leaves no partial file for a downstream
//! stage to pick up.

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::store::{SignalStore, UrEvent};

// ── Low-level safetensors parsing (raw bytes → typed slices; no dependency
//    on a tensor crate). ──────────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    if bytes.len() < 8 {
        bail!("safetensors file too small");
    }
    let n = u64::from_le_bytes(bytes[..8].try_into().unwrap()) as usize;
    if bytes.len() < 8 + n {
        bail!("safetensors header truncated");
    }
    let header: HashMap<String, serde_json::Value> = serde_json::from_slice(&bytes[8..8 + n])
        .context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn raw_bytes<'a>(
    bytes: &'a [u8],
    data_start: usize,
    entry: &serde_json::Value,
) -> Result<&'a [u8]> {
    let offsets = entry["data_offsets"]
        .as_array()
        .context("tensor entry missing data_offsets")?;
    let s = offsets[0].as_u64().context("bad offset")? as usize;
    let e = offsets[1].as_u64().context("bad offset")? as usize;
    if data_start + e > bytes.len() || s > e {
        bail!("tensor offsets outside file");
    }
    Ok(&bytes[data_start + s..data_start + e])
}

fn shape_of(entry: &serde_json::Value) -> Result<Vec<usize>> {
    entry["shape"]
        .as_array()
        .context("tensor entry missing shape")?
        .iter()
        .map(|v| v.as_u64().map(|n| n as usize).context("bad shape entry"))
        .collect()
}

fn read_f64_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<f64>> {
    let raw = raw_bytes(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(8)
        .map(|b| f64::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

fn read_i32_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<i32>> {
    let raw = raw_bytes(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

fn read_i64_tensor(bytes: &[u8], data_start: usize, entry: &serde_json::Value) -> Result<Vec<i64>> {
    let raw = raw_bytes(bytes, data_start, entry)?;
    Ok(raw
        .chunks_exact(8)
        .map(|b| i64::from_le_bytes(b.try_into().unwrap()))
        .collect())
}

// ── Writer ────────────────────────────────────────────────────────────────

/// Minimal safetensors writer handling F64, I32, I64 and U8 tensors.
pub struct SafetensorsWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
}

impl Default for SafetensorsWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetensorsWriter {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_f64_arr2(&mut self, name: &str, arr: &Array2<f64>) {
        let data: Vec<f64> = arr.iter().copied().collect();
        self.add_f64(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_i64(&mut self, name: &str, data: &[i64], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I64", shape.to_vec()));
    }

    /// UTF-8 payloads (e.g. newline-joined channel labels) stored as a U8
    /// byte tensor.
    pub fn add_utf8(&mut self, name: &str, text: &str) {
        let bytes = text.as_bytes().to_vec();
        let n = bytes.len();
        self.entries.push((name.to_string(), bytes, "U8", vec![n]));
    }

    /// Write the file atomically: a `.tmp` sibling is written and renamed
    /// into place, so readers never observe a half-written file.
    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(
                name.clone(),
                serde_json::json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes
            .into_iter()
            .chain(std::iter::repeat(b' ').take(pad))
            .collect();

        let tmp = path.with_extension("safetensors.tmp");
        {
            let mut f = std::fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(&(padded.len() as u64).to_le_bytes())?;
            f.write_all(&padded)?;
            for (_, data, _, _) in &self.entries {
                f.write_all(data)?;
            }
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("renaming into {}", path.display()))?;
        Ok(())
    }
}

// ── SignalStore load/save ─────────────────────────────────────────────────

/// File path for a `(subject_id, dataset_name)` pair under `dir`.
pub fn store_path(dir: &Path, subject_id: &str, dataset_name: &str) -> PathBuf {
    dir.join(format!("{subject_id}_{dataset_name}.safetensors"))
}

/// Persist every field of `store` losslessly.
///
/// Tensor keys: `samples` (F64 `[C, T]`), `sample_rate` (F64 `[1]`),
/// `channel_labels` (U8, newline-joined UTF-8), `event_types` (I32),
/// `event_latencies` (I64), `ur_event_codes` (I32), `ur_event_latencies`
/// (I64).
pub fn save_store(
    store: &SignalStore,
    subject_id: &str,
    dataset_name: &str,
    dir: &Path,
) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating output directory {}", dir.display()))?;

    let mut w = SafetensorsWriter::new();
    w.add_f64_arr2("samples", &store.samples);
    w.add_f64("sample_rate", &[store.sample_rate], &[1]);
    w.add_utf8("channel_labels", &store.channel_labels.join("\n"));
    w.add_i32("event_types", &store.event_types, &[store.event_types.len()]);
    let latencies: Vec<i64> = store.event_latencies.iter().map(|&l| l as i64).collect();
    w.add_i64("event_latencies", &latencies, &[latencies.len()]);
    let ur_codes: Vec<i32> = store.ur_events.iter().map(|u| u.code).collect();
    let ur_lat: Vec<i64> = store.ur_events.iter().map(|u| u.latency).collect();
    w.add_i32("ur_event_codes", &ur_codes, &[ur_codes.len()]);
    w.add_i64("ur_event_latencies", &ur_lat, &[ur_lat.len()]);

    let path = store_path(dir, subject_id, dataset_name);
    w.write(&path)
        .with_context(|| format!("writing {subject_id}/{dataset_name}"))
}

/// Load and validate a store written by [`save_store`].
pub fn load_store(subject_id: &str, dataset_name: &str, dir: &Path) -> Result<SignalStore> {
    let path = store_path(dir, subject_id, dataset_name);
    let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let entry = header.get("samples").context("missing 'samples' tensor")?;
    let shape = shape_of(entry)?;
    if shape.len() != 2 {
        bail!("'samples' must be 2-D, got shape {shape:?}");
    }
    let samples = Array2::from_shape_vec(
        (shape[0], shape[1]),
        read_f64_tensor(&bytes, data_start, entry)?,
    )
    .context("'samples' data does not match its shape")?;

    let entry = header.get("sample_rate").context("missing 'sample_rate'")?;
    let sample_rate = *read_f64_tensor(&bytes, data_start, entry)?
        .first()
        .context("'sample_rate' tensor is empty")?;

    let entry = header
        .get("channel_labels")
        .context("missing 'channel_labels'")?;
    let raw = raw_bytes(&bytes, data_start, entry)?;
    let channel_labels: Vec<String> = std::str::from_utf8(raw)
        .context("channel labels are not UTF-8")?
        .split('\n')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();

    let event_types = match header.get("event_types") {
        Some(e) => read_i32_tensor(&bytes, data_start, e)?,
        None => vec![],
    };
    let event_latencies: Vec<usize> = match header.get("event_latencies") {
        Some(e) => read_i64_tensor(&bytes, data_start, e)?
            .into_iter()
            .map(|l| {
                usize::try_from(l).map_err(|_| anyhow::anyhow!("negative event latency {l}"))
            })
            .collect::<Result<_>>()?,
        None => vec![],
    };

    let ur_codes = match header.get("ur_event_codes") {
        Some(e) => read_i32_tensor(&bytes, data_start, e)?,
        None => vec![],
    };
    let ur_lat = match header.get("ur_event_latencies") {
        Some(e) => read_i64_tensor(&bytes, data_start, e)?,
        None => vec![],
    };
    if ur_codes.len() != ur_lat.len() {
        bail!(
            "{} ur_event_codes but {} ur_event_latencies",
            ur_codes.len(),
            ur_lat.len()
        );
    }
    let ur_events = ur_codes
        .into_iter()
        .zip(ur_lat)
        .map(|(code, latency)| UrEvent { code, latency })
        .collect();

    let store = SignalStore {
        samples,
        sample_rate,
        channel_labels,
        event_types,
        event_latencies,
        ur_events,
    };
    store
        .validate()
        .with_context(|| format!("{} failed validation after load", path.display()))?;
    Ok(store)
}
