//! Synthetic flow recordings and temporary flow files.
//!
//! Recordings are built from segments of sinusoidal breathing and flat
//! pauses, so the expected breath count and apnea count are known.

use sleeplab_analysis::FlowFormat;
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds a flow recording segment by segment.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    interval_secs: f64,
    amplitude: f64,
    values: Vec<f64>,
}

impl FlowBuilder {
    /// Starts an empty recording sampled every `interval_secs`.
    pub fn new(interval_secs: f64) -> Self {
        Self {
            interval_secs,
            amplitude: 1.0,
            values: Vec::new(),
        }
    }

    /// Sets the peak flow of following breathing segments.
    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Appends `secs` of sinusoidal breathing at `bpm`.
    ///
    /// Each segment starts at zero phase, so segments join without a jump.
    pub fn breathe(mut self, secs: f64, bpm: f64) -> Self {
        let n = self.samples_for(secs);
        let freq = bpm / 60.0;
        self.values.extend((0..n).map(|i| {
            self.amplitude * (2.0 * PI * freq * i as f64 * self.interval_secs).sin()
        }));
        self
    }

    /// Appends `secs` of zero flow.
    pub fn pause(mut self, secs: f64) -> Self {
        let n = self.samples_for(secs);
        self.values.extend(std::iter::repeat(0.0).take(n));
        self
    }

    /// Appends `secs` of shallow breathing that never reaches `ceiling`.
    pub fn shallow(mut self, secs: f64, bpm: f64, ceiling: f64) -> Self {
        let n = self.samples_for(secs);
        let freq = bpm / 60.0;
        let peak = ceiling * 0.5;
        self.values.extend(
            (0..n).map(|i| peak * (2.0 * PI * freq * i as f64 * self.interval_secs).sin()),
        );
        self
    }

    /// Sample interval of the recording.
    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    /// The samples so far.
    pub fn build(self) -> Vec<f64> {
        self.values
    }

    fn samples_for(&self, secs: f64) -> usize {
        (secs / self.interval_secs).round() as usize
    }
}

/// Renders values as a bare-value flow file.
pub fn samples_text(values: &[f64]) -> String {
    let mut text = String::with_capacity(values.len() * 8);
    for value in values {
        let _ = writeln!(text, "{:.6}", value);
    }
    text
}

/// Renders values as a seven-column Venturi log with a header row.
///
/// Positive flow raises the inspiratory channel, negative flow the
/// expiratory one. Magnitudes are encoded as ADC counts over the throat
/// reading, so only the sign and ordering of values survive exactly.
pub fn venturi_text(values: &[f64], interval_secs: f64) -> String {
    const THROAT: i64 = 1700;
    const COUNTS_PER_UNIT: f64 = 400.0;

    let mut text = String::from("time,p2,p1_ins,p1_exp,temp,humidity,pump\n");
    for (i, value) in values.iter().enumerate() {
        let counts = (value.abs() * COUNTS_PER_UNIT).round() as i64;
        let (ins, exp) = if *value >= 0.0 {
            (THROAT + counts, THROAT)
        } else {
            (THROAT, THROAT + counts)
        };
        let _ = writeln!(
            text,
            "{:.3},{},{},{},0,0,0",
            i as f64 * interval_secs,
            THROAT,
            ins,
            exp
        );
    }
    text
}

/// A temporary directory holding flow files.
pub struct FlowFiles {
    dir: TempDir,
}

impl FlowFiles {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp directory"),
        }
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes raw text under `name`.
    pub fn write_text(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, text).expect("failed to write flow file");
        path
    }

    /// Writes `values` in `format` under `name`.
    pub fn write(&self, name: &str, values: &[f64], format: FlowFormat, interval_secs: f64) -> PathBuf {
        let text = match format {
            FlowFormat::Samples => samples_text(values),
            FlowFormat::Venturi => venturi_text(values, interval_secs),
        };
        self.write_text(name, &text)
    }
}

impl Default for FlowFiles {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` with a temporary flow file holding `values` as bare samples.
pub fn with_flow_file<F, R>(values: &[f64], f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let files = FlowFiles::new();
    let path = files.write("flow.txt", values, FlowFormat::Samples, 0.0);
    f(&path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_lengths() {
        let values = FlowBuilder::new(0.1).breathe(10.0, 12.0).pause(5.0).build();
        assert_eq!(values.len(), 150);
        assert!(values[100..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shallow_stays_under_ceiling() {
        let values = FlowBuilder::new(0.1).shallow(20.0, 15.0, 0.4).build();
        assert!(values.iter().all(|v| v.abs() < 0.4));
    }

    #[test]
    fn samples_text_one_per_line() {
        assert_eq!(samples_text(&[0.0, 1.5, -2.0]), "0.000000\n1.500000\n-2.000000\n");
    }

    #[test]
    fn venturi_rows() {
        let text = venturi_text(&[0.5, -0.25, 0.0], 0.01);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "0.000,1700,1900,1700,0,0,0");
        assert_eq!(lines[2], "0.010,1700,1700,1800,0,0,0");
        assert_eq!(lines[3], "0.020,1700,1700,1700,0,0,0");
    }

    #[test]
    fn files_live_in_temp_dir() {
        let files = FlowFiles::new();
        let path = files.write("a.csv", &[1.0, -1.0], FlowFormat::Samples, 0.1);
        assert!(path.starts_with(files.path()));
        assert_eq!(fs::read_to_string(path).unwrap(), "1.000000\n-1.000000\n");
    }
}
