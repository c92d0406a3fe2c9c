//! # SleepLab Analysis
//!
//! Signal analysis for CPAP airflow recordings.
//!
//! This crate provides:
//! - Flow file parsing (plain sample lists and raw Venturi ADC exports)
//! - Breath-cycle detection by baseline crossings
//! - Breathing rate, apnea and leakage metrics
//! - Deterministic PNG rendering of the flow waveform
//!
//! ## Pipeline
//!
//! ```text
//! raw text -> FlowSeries -> BreathCycle* -> FlowMetrics + ApneaSpan*
//!                 \______________________________/
//!                                 |
//!                             FlowImage
//! ```
//!
//! [`Analyzer`] runs every stage and returns an [`AnalysisReport`], which
//! converts into the `CalculatedData` record uploaded to the store.
//!
//! ## Invariants
//!
//! - A malformed file is rejected as a whole; no partial series is analyzed
//! - The same series and configuration always yield the same metrics and
//!   byte-identical PNG output
//! - Breathing rate and apnea count are never negative

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod detector;
mod error;
mod metrics;
mod parser;
mod pipeline;
mod render;

pub use config::{AnalysisConfig, ApneaPolicy, Baseline, RenderConfig};
pub use detector::{BreathCycle, BreathDetector, Crossing, Crossings, Direction};
pub use error::{AnalysisError, AnalysisResult};
pub use metrics::{leakage, round_to_tenth, ApneaSpan, FlowMetrics, MetricCalculator};
pub use parser::{parse_flow, read_flow_file, FlowFormat, FlowSample, FlowSeries};
pub use pipeline::{AnalysisReport, Analyzer};
pub use render::{FlowImage, WaveformRenderer};
