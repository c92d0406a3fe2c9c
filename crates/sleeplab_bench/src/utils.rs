//! Benchmark utilities.

use rand::Rng;
use sleeplab_protocol::{CalculatedData, CpapPressure, Timestamp};
use std::f64::consts::PI;
use std::fmt::Write as _;

/// Sinusoidal breathing at `bpm` with uniform noise of `noise` peak.
pub fn noisy_breathing(samples: usize, interval_secs: f64, bpm: f64, noise: f64) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    let freq = bpm / 60.0;
    (0..samples)
        .map(|i| {
            let t = i as f64 * interval_secs;
            (2.0 * PI * freq * t).sin() + rng.gen_range(-noise..=noise)
        })
        .collect()
}

/// Breathing with a flat pause every `period` samples, lasting `pause`
/// samples.
pub fn breathing_with_pauses(samples: usize, interval_secs: f64, period: usize, pause: usize) -> Vec<f64> {
    let mut values = noisy_breathing(samples, interval_secs, 15.0, 0.05);
    for (i, v) in values.iter_mut().enumerate() {
        if i % period < pause {
            *v = 0.0;
        }
    }
    values
}

/// Renders values as a bare-sample flow file.
pub fn as_samples_text(values: &[f64]) -> String {
    let mut text = String::with_capacity(values.len() * 10);
    for v in values {
        let _ = writeln!(text, "{:.6}", v);
    }
    text
}

/// Generate random image bytes of the specified size.
pub fn random_image(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// An analysis result at `seq` seconds after a fixed start.
pub fn calculated_data(seq: usize, image: &[u8]) -> CalculatedData {
    let ts = Timestamp::parse("2024-11-23T20:00:00")
        .expect("valid timestamp")
        .plus_seconds(seq as i64)
        .expect("timestamp in range");
    CalculatedData::new(
        CpapPressure::new(10).expect("in range"),
        14.2,
        (seq % 4) as u32,
        image,
        ts,
    )
}
