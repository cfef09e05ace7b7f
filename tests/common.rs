/// Shared synthetic-signal builders: known independent sources mixed
/// through a known invertible matrix, plus small numeric helpers.
use ndarray::{array, Array1, Array2, Axis};
use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
use rand_isaac::Isaac64Rng;

use eegica::{BlinkEvents, PipelineConfig, SignalStore, UrEvent};

pub const FS: f64 = 250.0;
pub const N: usize = 10_000;
pub const BLINK_AMP: f64 = 5.0;
/// Gaussian pulse width (sigma) in samples — roughly a 50 ms half-width.
pub const BLINK_SIGMA: f64 = 12.0;
/// Irregular spacing so no sinusoid can phase-lock to the blink times.
pub const BLINK_PEAKS: &[usize] = &[
    400, 1150, 1900, 2780, 3500, 4420, 5300, 6050, 6900, 7760, 8500, 9300,
];
/// 0.4 s → 100 samples at 250 Hz.
pub const EPOCH_DUR: f64 = 0.4;
pub const EPOCH_SAMPLES: usize = 100;

#[allow(unused)]
pub fn test_cfg() -> PipelineConfig {
    PipelineConfig {
        blink_epoch_dur: EPOCH_DUR,
        ..PipelineConfig::default()
    }
}

pub fn sine_source(freq: f64) -> Array1<f64> {
    Array1::from_shape_fn(N, |i| (2.0 * std::f64::consts::PI * freq * i as f64 / FS).sin())
}

/// Train of Gaussian-shaped pulses at [`BLINK_PEAKS`].
pub fn blink_source() -> Array1<f64> {
    let mut x = Array1::<f64>::zeros(N);
    let support = (6.0 * BLINK_SIGMA) as usize;
    for &p in BLINK_PEAKS {
        let lo = p.saturating_sub(support);
        let hi = (p + support + 1).min(N);
        for i in lo..hi {
            let d = i as f64 - p as f64;
            x[i] += BLINK_AMP * (-d * d / (2.0 * BLINK_SIGMA * BLINK_SIGMA)).exp();
        }
    }
    x
}

/// Four sources: two sinusoids, the blink train, and a weak uniform-noise
/// source that keeps the mixture full rank.
pub fn sources() -> Array2<f64> {
    let mut s = Array2::<f64>::zeros((4, N));
    s.row_mut(0).assign(&sine_source(7.0));
    s.row_mut(1).assign(&sine_source(13.0));
    s.row_mut(2).assign(&blink_source());
    let mut rng = Isaac64Rng::seed_from_u64(7);
    let noise: Array1<f64> = Array1::random_using(N, Uniform::new(-1.0, 1.0), &mut rng);
    s.row_mut(3).assign(&(&noise * 0.05));
    s
}

/// Known, strictly diagonally dominant (hence invertible) mixing matrix.
pub fn mixing_matrix() -> Array2<f64> {
    array![
        [1.0, 0.5, 0.3, 0.1],
        [0.4, 1.0, 0.2, 0.3],
        [0.3, 0.2, 1.0, 0.4],
        [0.1, 0.3, 0.5, 1.0],
    ]
}

/// The mixed 4-channel "EEG", with events attached to exercise metadata
/// pass-through.
pub fn eeg_store() -> SignalStore {
    let samples = mixing_matrix().dot(&sources());
    let labels = ["FZ", "CZ", "PZ", "OZ"].iter().map(|s| s.to_string()).collect();
    let mut store = SignalStore::new(samples, FS, labels).unwrap();
    store.event_types = vec![1, 2, 1];
    store.event_latencies = vec![1000, 4000, 8000];
    store.ur_events = vec![
        UrEvent { code: 1, latency: 1000 },
        UrEvent { code: 2, latency: 4000 },
        UrEvent { code: 1, latency: 8000 },
    ];
    store
}

/// Single-channel "EOG": the blink train plus a little measurement noise.
#[allow(unused)]
pub fn eog_store() -> SignalStore {
    let mut rng = Isaac64Rng::seed_from_u64(11);
    let noise: Array1<f64> = Array1::random_using(N, Uniform::new(-1.0, 1.0), &mut rng);
    let row = blink_source() + &noise * 0.02;
    SignalStore::new(row.insert_axis(Axis(0)), FS, vec!["EOG".to_string()]).unwrap()
}

/// Ground-truth blink events (peak positions known exactly).
#[allow(unused)]
pub fn known_blinks() -> BlinkEvents {
    let half = EPOCH_SAMPLES / 2;
    BlinkEvents {
        epochs: BLINK_PEAKS
            .iter()
            .map(|&p| (p - half, (p + half).min(N)))
            .collect(),
        peaks: BLINK_PEAKS.to_vec(),
    }
}

/// Pearson correlation between two equal-length signals.
#[allow(unused)]
pub fn corr(a: ndarray::ArrayView1<f64>, b: ndarray::ArrayView1<f64>) -> f64 {
    let n = a.len() as f64;
    let ma = a.sum() / n;
    let mb = b.sum() / n;
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        cov += (x - ma) * (y - mb);
        va += (x - ma) * (x - ma);
        vb += (y - mb) * (y - mb);
    }
    cov / (va.sqrt() * vb.sqrt()).max(f64::MIN_POSITIVE)
}

/// Least-squares coefficient of `template` in `x` (`x ≈ coef · template`).
#[allow(unused)]
pub fn proj_coef(x: ndarray::ArrayView1<f64>, template: &Array1<f64>) -> f64 {
    x.dot(template) / template.dot(template)
}
