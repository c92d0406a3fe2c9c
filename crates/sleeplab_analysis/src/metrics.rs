//! Breathing rate, apnea and leakage metrics.

use crate::config::ApneaPolicy;
use crate::detector::{BreathCycle, BreathDetector};
use crate::parser::FlowSeries;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A pause in breathing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApneaSpan {
    /// Offset of the first quiet sample.
    pub start_secs: f64,
    /// Offset of the last quiet sample.
    pub end_secs: f64,
}

impl ApneaSpan {
    /// Length of the span in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Metrics for one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowMetrics {
    /// Recording length in seconds.
    pub duration_secs: f64,
    /// Number of valid breath cycles.
    pub breaths: usize,
    /// Breaths per minute, rounded to one decimal.
    pub breath_rate_bpm: f64,
    /// Start offset of each valid breath.
    pub breath_times: Vec<f64>,
    /// Number of apnea spans.
    pub apnea_count: u32,
    /// Integrated flow, in litres when flow is in m³/s.
    pub leakage: f64,
}

impl FlowMetrics {
    /// Returns true when the apnea count warrants attention.
    pub fn needs_attention(&self) -> bool {
        self.apnea_count >= 2
    }
}

/// Rounds to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Left Riemann sum of flow over time, scaled by 1000.
pub fn leakage(series: &FlowSeries) -> f64 {
    series
        .samples()
        .windows(2)
        .map(|pair| pair[0].value * (pair[1].offset_secs - pair[0].offset_secs))
        .sum::<f64>()
        * 1000.0
}

/// Derives metrics from detected cycles.
#[derive(Debug, Clone, Copy)]
pub struct MetricCalculator {
    policy: ApneaPolicy,
}

impl MetricCalculator {
    /// Creates a calculator for the given thresholds.
    pub fn new(policy: ApneaPolicy) -> Self {
        Self { policy }
    }

    /// The thresholds in use.
    pub fn policy(&self) -> &ApneaPolicy {
        &self.policy
    }

    /// Returns true if the cycle counts as a breath.
    pub fn is_valid_cycle(&self, cycle: &BreathCycle) -> bool {
        cycle.peak_amplitude >= self.policy.amplitude
            && cycle.duration_secs() <= self.policy.min_duration_secs
    }

    /// Breaths per minute over the given duration.
    pub fn breathing_rate(&self, breaths: usize, duration_secs: f64) -> f64 {
        if breaths == 0 || duration_secs <= 0.0 {
            return 0.0;
        }
        round_to_tenth(breaths as f64 / (duration_secs / 60.0))
    }

    /// Quiet runs longer than the minimum apnea duration.
    pub fn apnea_spans(&self, series: &FlowSeries, deviations: &[f64]) -> Vec<ApneaSpan> {
        let samples = series.samples();
        let mut spans = Vec::new();
        let mut run_start: Option<usize> = None;

        for i in 0..=deviations.len() {
            let quiet = deviations
                .get(i)
                .is_some_and(|d| d.abs() < self.policy.amplitude);
            match (quiet, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    run_start = None;
                    let span = ApneaSpan {
                        start_secs: samples[start].offset_secs,
                        end_secs: samples[i - 1].offset_secs,
                    };
                    if span.duration_secs() > self.policy.min_duration_secs {
                        spans.push(span);
                    }
                }
                _ => {}
            }
        }
        spans
    }

    /// Computes every metric from the detector's series and the cycles it
    /// already yielded, returning the apnea spans alongside.
    pub fn calculate(
        &self,
        detector: &BreathDetector<'_>,
        cycles: &[BreathCycle],
    ) -> (FlowMetrics, Vec<ApneaSpan>) {
        let series = detector.series();
        let breath_times: Vec<f64> = cycles
            .iter()
            .filter(|c| self.is_valid_cycle(c))
            .map(|c| c.start_secs)
            .collect();
        let duration_secs = series.duration_secs();
        let spans = self.apnea_spans(series, detector.deviations());

        let leakage = leakage(series);
        if leakage < 0.0 {
            warn!(leakage, "negative leakage, check sensor orientation");
        }
        debug!(
            cycles = cycles.len(),
            valid = breath_times.len(),
            apneas = spans.len(),
            "metrics calculated"
        );

        let metrics = FlowMetrics {
            duration_secs,
            breaths: breath_times.len(),
            breath_rate_bpm: self.breathing_rate(breath_times.len(), duration_secs),
            breath_times,
            apnea_count: u32::try_from(spans.len()).unwrap_or(u32::MAX),
            leakage,
        };
        (metrics, spans)
    }
}
