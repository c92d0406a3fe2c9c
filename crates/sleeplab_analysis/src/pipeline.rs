//! End-to-end analysis of one recording.

use crate::config::AnalysisConfig;
use crate::detector::{BreathCycle, BreathDetector};
use crate::error::AnalysisResult;
use crate::metrics::{ApneaSpan, FlowMetrics, MetricCalculator};
use crate::parser::{parse_flow, read_flow_file, FlowSeries};
use crate::render::{FlowImage, WaveformRenderer};
use sleeplab_protocol::{CalculatedData, CpapPressure, Timestamp};
use std::path::Path;
use tracing::info;

/// Everything produced by one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// The parsed recording.
    pub series: FlowSeries,
    /// Every detected cycle, valid or not.
    pub cycles: Vec<BreathCycle>,
    /// Detected apnea spans.
    pub apnea_spans: Vec<ApneaSpan>,
    /// Derived metrics.
    pub metrics: FlowMetrics,
    /// Rendered waveform.
    pub image: FlowImage,
}

impl AnalysisReport {
    /// Builds the record uploaded to the store.
    pub fn to_calculated(&self, cpap_pressure: CpapPressure, timestamp: Timestamp) -> CalculatedData {
        CalculatedData::new(
            cpap_pressure,
            self.metrics.breath_rate_bpm,
            self.metrics.apnea_count,
            self.image.png(),
            timestamp,
        )
    }

    /// Metrics as pretty-printed JSON.
    pub fn metrics_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.metrics)
    }
}

/// Runs parsing, detection, metrics and rendering with one configuration.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    /// Creates an analyzer, rejecting an invalid configuration.
    pub fn new(config: AnalysisConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration in use.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyzes flow text.
    pub fn analyze_text(&self, text: &str) -> AnalysisResult<AnalysisReport> {
        let series = parse_flow(text, self.config.format, self.config.sample_interval_secs)?;
        self.analyze_series(series)
    }

    /// Reads and analyzes a flow file.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> AnalysisResult<AnalysisReport> {
        let path = path.as_ref();
        info!(path = %path.display(), format = %self.config.format, "analyzing flow file");
        let series = read_flow_file(path, self.config.format, self.config.sample_interval_secs)?;
        self.analyze_series(series)
    }

    /// Analyzes an already parsed series.
    pub fn analyze_series(&self, series: FlowSeries) -> AnalysisResult<AnalysisReport> {
        let detector = BreathDetector::new(&series, self.config.baseline);
        let cycles = detector.cycles();
        let (metrics, apnea_spans) =
            MetricCalculator::new(self.config.apnea).calculate(&detector, &cycles);
        let image = WaveformRenderer::new(self.config.render).render(&series, &apnea_spans)?;

        info!(
            samples = series.len(),
            duration_secs = metrics.duration_secs,
            breath_rate_bpm = metrics.breath_rate_bpm,
            apnea_count = metrics.apnea_count,
            "analysis complete"
        );

        Ok(AnalysisReport {
            series,
            cycles,
            apnea_spans,
            metrics,
            image,
        })
    }
}
