//! Analyze command implementation.

use super::CliError;
use clap::{Args, ValueEnum};
use serde::Serialize;
use sleeplab_analysis::{AnalysisConfig, AnalysisReport, Analyzer, ApneaPolicy, Baseline, FlowFormat};
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    Text,
    /// Pretty-printed JSON.
    Json,
}

/// Analysis thresholds shared by `analyze` and `simulate`.
#[derive(Debug, Clone, Default, Args)]
pub struct AnalysisArgs {
    /// Time between samples in milliseconds
    #[arg(long)]
    pub sample_interval_ms: Option<f64>,

    /// Flow deviation below which breathing counts as quiet
    #[arg(long)]
    pub apnea_amplitude: Option<f64>,

    /// Quiet span length that counts as apnea, in seconds
    #[arg(long)]
    pub apnea_secs: Option<f64>,

    /// Crossing baseline (zero, rolling:<samples>)
    #[arg(long)]
    pub baseline: Option<String>,

    /// Input layout (samples, venturi)
    #[arg(long)]
    pub format: Option<String>,

    /// JSON file with an analysis configuration; flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl AnalysisArgs {
    /// Builds the analysis configuration from the config file and flags.
    pub fn to_config(&self) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
            None => {
                let interval_ms = self
                    .sample_interval_ms
                    .ok_or(CliError::MissingOption("sample-interval-ms"))?;
                let amplitude = self
                    .apnea_amplitude
                    .ok_or(CliError::MissingOption("apnea-amplitude"))?;
                AnalysisConfig::new(interval_ms / 1000.0, ApneaPolicy::new(amplitude))
            }
        };

        if let Some(interval_ms) = self.sample_interval_ms {
            config.sample_interval_secs = interval_ms / 1000.0;
        }
        if let Some(amplitude) = self.apnea_amplitude {
            config.apnea.amplitude = amplitude;
        }
        if let Some(secs) = self.apnea_secs {
            config.apnea.min_duration_secs = secs;
        }
        if let Some(baseline) = &self.baseline {
            config.baseline = baseline.parse::<Baseline>().map_err(|e| CliError::InvalidOption {
                option: "baseline",
                message: e.to_string(),
            })?;
        }
        if let Some(format) = &self.format {
            config.format = format.parse::<FlowFormat>().map_err(|e| CliError::InvalidOption {
                option: "format",
                message: e.to_string(),
            })?;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Printed result of one analysis.
#[derive(Debug, Serialize)]
pub struct AnalyzeSummary {
    /// Analyzed file.
    pub file: String,
    /// Number of samples.
    pub samples: usize,
    /// Recording length in seconds.
    pub duration_secs: f64,
    /// Valid breath cycles.
    pub breaths: usize,
    /// Breaths per minute.
    pub breath_rate_bpm: f64,
    /// Apnea events.
    pub apnea_count: u32,
    /// Start and end of each apnea, in seconds.
    pub apnea_spans: Vec<(f64, f64)>,
    /// Integrated flow.
    pub leakage: f64,
}

impl AnalyzeSummary {
    fn new(file: &Path, report: &AnalysisReport) -> Self {
        Self {
            file: file.display().to_string(),
            samples: report.series.len(),
            duration_secs: report.metrics.duration_secs,
            breaths: report.metrics.breaths,
            breath_rate_bpm: report.metrics.breath_rate_bpm,
            apnea_count: report.metrics.apnea_count,
            apnea_spans: report
                .apnea_spans
                .iter()
                .map(|s| (s.start_secs, s.end_secs))
                .collect(),
            leakage: report.metrics.leakage,
        }
    }
}

impl fmt::Display for AnalyzeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "File:        {}", self.file)?;
        writeln!(f, "Samples:     {}", self.samples)?;
        writeln!(f, "Duration:    {:.1} s", self.duration_secs)?;
        writeln!(f, "Breaths:     {}", self.breaths)?;
        writeln!(f, "Rate:        {:.1} breaths/min", self.breath_rate_bpm)?;
        writeln!(f, "Apneas:      {}", self.apnea_count)?;
        for (start, end) in &self.apnea_spans {
            writeln!(f, "  {:>8.1} s - {:>8.1} s ({:.1} s)", start, end, end - start)?;
        }
        writeln!(f, "Leakage:     {:.4}", self.leakage)
    }
}

/// Runs the analyze command and returns what to print.
pub fn run(
    file: &Path,
    args: &AnalysisArgs,
    output: OutputFormat,
    image: Option<&Path>,
    metrics: Option<&Path>,
) -> Result<String, Box<dyn std::error::Error>> {
    let analyzer = Analyzer::new(args.to_config()?)?;
    let report = analyzer.analyze_file(file)?;

    if let Some(path) = image {
        fs::write(path, report.image.png())?;
        info!(path = %path.display(), "waveform image written");
    }
    if let Some(path) = metrics {
        fs::write(path, report.metrics_json()?)?;
        info!(path = %path.display(), "metrics written");
    }

    let summary = AnalyzeSummary::new(file, &report);
    Ok(match output {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => summary.to_string(),
    })
}
