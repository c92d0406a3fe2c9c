//! Analysis configuration.
//!
//! Clinical thresholds are configuration, not constants. Only the apnea
//! minimum duration has a default; the amplitude threshold and the sample
//! interval must be supplied by the caller.

use crate::error::{AnalysisError, AnalysisResult};
use crate::parser::FlowFormat;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reference level that flow is compared against when detecting crossings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Baseline {
    /// Fixed zero flow.
    #[default]
    Zero,
    /// Mean of the trailing `window` samples, including the current one.
    RollingMean {
        /// Window length in samples (at least 2).
        window: usize,
    },
}

impl FromStr for Baseline {
    type Err = AnalysisError;

    /// Parses `zero` or `rolling:<window>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(Baseline::Zero),
            other => other
                .strip_prefix("rolling:")
                .and_then(|w| w.parse().ok())
                .map(|window| Baseline::RollingMean { window })
                .ok_or_else(|| {
                    AnalysisError::InvalidConfig(format!(
                        "unknown baseline {:?}, expected zero or rolling:<samples>",
                        s
                    ))
                }),
        }
    }
}

/// Thresholds that separate normal breaths from apnea.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApneaPolicy {
    /// A quiet span must last longer than this to count as apnea.
    #[serde(default = "ApneaPolicy::default_min_duration_secs")]
    pub min_duration_secs: f64,
    /// Deviation from baseline below which flow counts as quiet.
    pub amplitude: f64,
}

impl ApneaPolicy {
    /// Default minimum apnea duration in seconds.
    pub const DEFAULT_MIN_DURATION_SECS: f64 = 10.0;

    /// Creates a policy with the default minimum duration.
    pub fn new(amplitude: f64) -> Self {
        Self {
            min_duration_secs: Self::DEFAULT_MIN_DURATION_SECS,
            amplitude,
        }
    }

    /// Sets the minimum apnea duration.
    #[must_use]
    pub fn with_min_duration_secs(mut self, secs: f64) -> Self {
        self.min_duration_secs = secs;
        self
    }

    fn default_min_duration_secs() -> f64 {
        Self::DEFAULT_MIN_DURATION_SECS
    }

    fn validate(&self) -> AnalysisResult<()> {
        if !(self.min_duration_secs.is_finite() && self.min_duration_secs > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "apnea minimum duration must be positive, got {}",
                self.min_duration_secs
            )));
        }
        if !(self.amplitude.is_finite() && self.amplitude > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "apnea amplitude threshold must be positive, got {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}

/// Output size of the waveform image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl RenderConfig {
    /// Blank border around the plot area, in pixels.
    pub const MARGIN: u32 = 20;

    /// Creates a render configuration.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn validate(&self) -> AnalysisResult<()> {
        let min = 2 * Self::MARGIN + 2;
        if self.width < min || self.height < min {
            return Err(AnalysisError::InvalidConfig(format!(
                "image must be at least {}x{} pixels, got {}x{}",
                min, min, self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::new(900, 400)
    }
}

/// Configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Time between consecutive samples when lines carry no offset.
    pub sample_interval_secs: f64,
    /// Apnea thresholds.
    pub apnea: ApneaPolicy,
    /// Crossing reference.
    #[serde(default)]
    pub baseline: Baseline,
    /// Input file layout.
    #[serde(default)]
    pub format: FlowFormat,
    /// Waveform image size.
    #[serde(default)]
    pub render: RenderConfig,
}

impl AnalysisConfig {
    /// Creates a configuration with a zero baseline and plain sample input.
    pub fn new(sample_interval_secs: f64, apnea: ApneaPolicy) -> Self {
        Self {
            sample_interval_secs,
            apnea,
            baseline: Baseline::Zero,
            format: FlowFormat::Samples,
            render: RenderConfig::default(),
        }
    }

    /// Parses a configuration from JSON.
    pub fn from_json(text: &str) -> AnalysisResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the baseline.
    #[must_use]
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    /// Sets the input format.
    #[must_use]
    pub fn with_format(mut self, format: FlowFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the image size.
    #[must_use]
    pub fn with_render(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Checks every threshold.
    pub fn validate(&self) -> AnalysisResult<()> {
        if !(self.sample_interval_secs.is_finite() && self.sample_interval_secs > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "sample interval must be positive, got {}",
                self.sample_interval_secs
            )));
        }
        if let Baseline::RollingMean { window } = self.baseline {
            if window < 2 {
                return Err(AnalysisError::InvalidConfig(format!(
                    "rolling baseline window must be at least 2 samples, got {}",
                    window
                )));
            }
        }
        self.apnea.validate()?;
        self.render.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_names() {
        assert_eq!("zero".parse::<Baseline>().unwrap(), Baseline::Zero);
        assert_eq!(
            "rolling:25".parse::<Baseline>().unwrap(),
            Baseline::RollingMean { window: 25 }
        );
        assert!("rolling:".parse::<Baseline>().is_err());
        assert!("mean".parse::<Baseline>().is_err());
    }

    #[test]
    fn builder() {
        let config = AnalysisConfig::new(0.02, ApneaPolicy::new(1e-4).with_min_duration_secs(8.0))
            .with_baseline(Baseline::RollingMean { window: 50 })
            .with_format(FlowFormat::Venturi)
            .with_render(RenderConfig::new(300, 120));

        assert_eq!(config.sample_interval_secs, 0.02);
        assert_eq!(config.apnea.min_duration_secs, 8.0);
        assert_eq!(config.baseline, Baseline::RollingMean { window: 50 });
        assert_eq!(config.format, FlowFormat::Venturi);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_thresholds() {
        assert!(AnalysisConfig::new(0.0, ApneaPolicy::new(0.1)).validate().is_err());
        assert!(AnalysisConfig::new(1.0, ApneaPolicy::new(0.0)).validate().is_err());
        assert!(AnalysisConfig::new(1.0, ApneaPolicy::new(0.1).with_min_duration_secs(-1.0))
            .validate()
            .is_err());
        assert!(AnalysisConfig::new(1.0, ApneaPolicy::new(0.1))
            .with_baseline(Baseline::RollingMean { window: 1 })
            .validate()
            .is_err());
        assert!(AnalysisConfig::new(1.0, ApneaPolicy::new(0.1))
            .with_render(RenderConfig::new(10, 10))
            .validate()
            .is_err());
    }

    #[test]
    fn json_requires_amplitude_and_interval() {
        let config = AnalysisConfig::from_json(
            r#"{"sample_interval_secs":0.01,"apnea":{"amplitude":0.0002}}"#,
        )
        .unwrap();
        assert_eq!(config.apnea.min_duration_secs, 10.0);
        assert_eq!(config.baseline, Baseline::Zero);
        assert_eq!(config.render, RenderConfig::default());

        assert!(AnalysisConfig::from_json(r#"{"sample_interval_secs":0.01,"apnea":{}}"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{"apnea":{"amplitude":0.1}}"#).is_err());
    }

    #[test]
    fn baseline_json_shape() {
        let config = AnalysisConfig::from_json(
            r#"{"sample_interval_secs":1,"apnea":{"amplitude":0.1},
                "baseline":{"kind":"rolling_mean","window":25}}"#,
        )
        .unwrap();
        assert_eq!(config.baseline, Baseline::RollingMean { window: 25 });
    }
}
