//! Breath-cycle detection by baseline crossings.
//!
//! Each sample is reduced to its deviation from the baseline. A crossing is
//! emitted whenever the sign of the deviation changes; a breath cycle spans
//! two consecutive rising crossings.
//!
//! Samples sitting exactly on the baseline keep the sign of the sample
//! before them, so a crossing through baseline samples is placed at the last
//! baseline sample. Crossings between two samples of opposite sign are
//! linearly interpolated.

use crate::config::Baseline;
use crate::parser::{FlowSample, FlowSeries};
use std::cmp::Ordering;

/// Direction of a baseline crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From below the baseline to above it.
    Rising,
    /// From above the baseline to below it.
    Falling,
}

impl Direction {
    fn entering(sign: Ordering) -> Self {
        if sign == Ordering::Greater {
            Direction::Rising
        } else {
            Direction::Falling
        }
    }
}

/// A point where the flow passes through the baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    /// Offset of the crossing in seconds.
    pub offset_secs: f64,
    /// Crossing direction.
    pub direction: Direction,
}

/// One inhale-exhale period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreathCycle {
    /// Offset of the opening rising crossing.
    pub start_secs: f64,
    /// Offset of the closing rising crossing.
    pub end_secs: f64,
    /// Largest absolute deviation from baseline inside the cycle.
    pub peak_amplitude: f64,
}

impl BreathCycle {
    /// Length of the cycle in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Detects crossings and cycles in one series.
#[derive(Debug, Clone)]
pub struct BreathDetector<'a> {
    series: &'a FlowSeries,
    deviations: Vec<f64>,
}

impl<'a> BreathDetector<'a> {
    /// Prepares detection against the given baseline.
    pub fn new(series: &'a FlowSeries, baseline: Baseline) -> Self {
        let values: Vec<f64> = series.values().collect();
        let deviations = match baseline {
            Baseline::Zero => values,
            Baseline::RollingMean { window } => rolling_deviations(&values, window.max(1)),
        };
        Self { series, deviations }
    }

    /// The series under analysis.
    pub fn series(&self) -> &'a FlowSeries {
        self.series
    }

    /// Deviation of each sample from the baseline.
    pub fn deviations(&self) -> &[f64] {
        &self.deviations
    }

    /// Iterates over every crossing. Each call starts from the beginning.
    pub fn crossings(&self) -> Crossings<'_> {
        Crossings {
            samples: self.series.samples(),
            deviations: &self.deviations,
            pos: 0,
            last: None,
            done: false,
        }
    }

    /// Breath cycles between consecutive rising crossings.
    ///
    /// A trailing partial cycle is discarded.
    pub fn cycles(&self) -> Vec<BreathCycle> {
        let rising: Vec<f64> = self
            .crossings()
            .filter(|c| c.direction == Direction::Rising)
            .map(|c| c.offset_secs)
            .collect();

        rising
            .windows(2)
            .map(|pair| BreathCycle {
                start_secs: pair[0],
                end_secs: pair[1],
                peak_amplitude: self.peak_between(pair[0], pair[1]),
            })
            .collect()
    }

    fn peak_between(&self, start: f64, end: f64) -> f64 {
        let samples = self.series.samples();
        let from = samples.partition_point(|s| s.offset_secs < start);
        let to = samples.partition_point(|s| s.offset_secs <= end);
        self.deviations[from..to]
            .iter()
            .fold(0.0_f64, |peak, d| peak.max(d.abs()))
    }
}

fn rolling_deviations(values: &[f64], window: usize) -> Vec<f64> {
    let mut sum = 0.0;
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            sum += v;
            if i >= window {
                sum -= values[i - window];
            }
            let count = (i + 1).min(window) as f64;
            v - sum / count
        })
        .collect()
}

/// Iterator over the baseline crossings of a series.
#[derive(Debug, Clone)]
pub struct Crossings<'a> {
    samples: &'a [FlowSample],
    deviations: &'a [f64],
    pos: usize,
    last: Option<(Ordering, usize)>,
    done: bool,
}

impl Crossings<'_> {
    fn interpolate(&self, j: usize, i: usize) -> f64 {
        let (tj, ti) = (self.samples[j].offset_secs, self.samples[i].offset_secs);
        let (dj, di) = (self.deviations[j], self.deviations[i]);
        tj + (ti - tj) * dj / (dj - di)
    }
}

impl Iterator for Crossings<'_> {
    type Item = Crossing;

    fn next(&mut self) -> Option<Crossing> {
        while self.pos < self.deviations.len() {
            let i = self.pos;
            self.pos += 1;

            let sign = match self.deviations[i].partial_cmp(&0.0) {
                Some(Ordering::Equal) | None => continue,
                Some(sign) => sign,
            };

            let previous = self.last.replace((sign, i));
            match previous {
                None if i > 0 => {
                    return Some(Crossing {
                        offset_secs: self.samples[i - 1].offset_secs,
                        direction: Direction::entering(sign),
                    });
                }
                Some((prev_sign, j)) if prev_sign != sign => {
                    let offset_secs = if i - j > 1 {
                        self.samples[i - 1].offset_secs
                    } else {
                        self.interpolate(j, i)
                    };
                    return Some(Crossing {
                        offset_secs,
                        direction: Direction::entering(sign),
                    });
                }
                _ => {}
            }
        }

        if self.done {
            return None;
        }
        self.done = true;

        // Trailing baseline samples close the last run.
        let (sign, j) = self.last?;
        let last = self.samples.len().checked_sub(1)?;
        (j < last).then(|| Crossing {
            offset_secs: self.samples[last].offset_secs,
            direction: Direction::entering(sign.reverse()),
        })
    }
}
