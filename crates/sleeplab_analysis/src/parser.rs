//! Flow file parsing.
//!
//! Two layouts are accepted:
//!
//! - [`FlowFormat::Samples`]: one sample per line, either a bare value
//!   (offset taken from the sample interval) or `offset,value`
//! - [`FlowFormat::Venturi`]: a header line, then seven comma-separated
//!   columns of raw sensor readings converted to volumetric flow
//!
//! A file is accepted or rejected as a whole.

use crate::error::{AnalysisError, AnalysisResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// One flow reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlowSample {
    /// Seconds since the start of the recording.
    pub offset_secs: f64,
    /// Signed flow; positive is inspiration.
    pub value: f64,
}

impl FlowSample {
    /// Creates a sample.
    pub fn new(offset_secs: f64, value: f64) -> Self {
        Self { offset_secs, value }
    }
}

/// An ordered flow recording.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowSeries {
    samples: Vec<FlowSample>,
    sample_interval_secs: f64,
}

impl FlowSeries {
    /// Builds a series, checking order and finiteness.
    pub fn from_samples(
        samples: Vec<FlowSample>,
        sample_interval_secs: f64,
    ) -> AnalysisResult<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        for (i, sample) in samples.iter().enumerate() {
            if !sample.offset_secs.is_finite() || !sample.value.is_finite() {
                return Err(AnalysisError::malformed(i + 1, "non-finite sample"));
            }
            if i > 0 && sample.offset_secs <= samples[i - 1].offset_secs {
                return Err(AnalysisError::malformed(
                    i + 1,
                    "sample offsets must be strictly increasing",
                ));
            }
        }
        Ok(Self {
            samples,
            sample_interval_secs,
        })
    }

    /// Builds a series from evenly spaced values starting at offset zero.
    pub fn from_values(values: &[f64], sample_interval_secs: f64) -> AnalysisResult<Self> {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &v)| FlowSample::new(i as f64 * sample_interval_secs, v))
            .collect();
        Self::from_samples(samples, sample_interval_secs)
    }

    /// The samples in offset order.
    pub fn samples(&self) -> &[FlowSample] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; an empty series cannot be built.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The interval the series was parsed with.
    pub fn sample_interval_secs(&self) -> f64 {
        self.sample_interval_secs
    }

    /// Offset of the first sample.
    pub fn start_secs(&self) -> f64 {
        self.samples.first().map_or(0.0, |s| s.offset_secs)
    }

    /// Offset of the last sample.
    pub fn end_secs(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.offset_secs)
    }

    /// Time between the first and last sample.
    pub fn duration_secs(&self) -> f64 {
        self.end_secs() - self.start_secs()
    }

    /// Flow values in order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Sample offsets in order.
    pub fn offsets(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.offset_secs)
    }
}

/// Layout of a flow file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowFormat {
    /// One value or `offset,value` pair per line.
    #[default]
    Samples,
    /// Header plus seven columns of raw Venturi sensor readings.
    Venturi,
}

impl fmt::Display for FlowFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowFormat::Samples => f.write_str("samples"),
            FlowFormat::Venturi => f.write_str("venturi"),
        }
    }
}

impl FromStr for FlowFormat {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "samples" => Ok(FlowFormat::Samples),
            "venturi" => Ok(FlowFormat::Venturi),
            other => Err(AnalysisError::InvalidConfig(format!(
                "unknown flow format: {}",
                other
            ))),
        }
    }
}

/// Parses flow text in the given layout.
pub fn parse_flow(
    text: &str,
    format: FlowFormat,
    sample_interval_secs: f64,
) -> AnalysisResult<FlowSeries> {
    let samples = match format {
        FlowFormat::Samples => parse_samples(text, sample_interval_secs)?,
        FlowFormat::Venturi => parse_venturi(text)?,
    };
    FlowSeries::from_samples(samples, sample_interval_secs)
}

/// Reads and parses a flow file.
pub fn read_flow_file(
    path: impl AsRef<Path>,
    format: FlowFormat,
    sample_interval_secs: f64,
) -> AnalysisResult<FlowSeries> {
    let text = std::fs::read_to_string(path)?;
    parse_flow(&text, format, sample_interval_secs)
}

fn parse_number(line: usize, field: &str) -> AnalysisResult<f64> {
    let value: f64 = field
        .parse()
        .map_err(|_| AnalysisError::malformed(line, format!("non-numeric value {:?}", field)))?;
    if !value.is_finite() {
        return Err(AnalysisError::malformed(
            line,
            format!("non-finite value {:?}", field),
        ));
    }
    Ok(value)
}

fn parse_samples(text: &str, interval: f64) -> AnalysisResult<Vec<FlowSample>> {
    let mut samples: Vec<FlowSample> = Vec::new();
    let mut shape: Option<usize> = None;

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let fields: Vec<&str> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        if fields.len() > 2 {
            return Err(AnalysisError::malformed(
                line,
                format!("expected 1 or 2 fields, found {}", fields.len()),
            ));
        }
        match shape {
            None => shape = Some(fields.len()),
            Some(n) if n != fields.len() => {
                return Err(AnalysisError::malformed(
                    line,
                    format!("expected {} fields like the first line, found {}", n, fields.len()),
                ));
            }
            Some(_) => {}
        }

        let sample = match fields.as_slice() {
            [value] => FlowSample::new(samples.len() as f64 * interval, parse_number(line, value)?),
            [offset, value] => {
                FlowSample::new(parse_number(line, offset)?, parse_number(line, value)?)
            }
            _ => return Err(AnalysisError::malformed(line, "empty line")),
        };

        if let Some(prev) = samples.last() {
            if sample.offset_secs <= prev.offset_secs {
                return Err(AnalysisError::malformed(
                    line,
                    format!(
                        "offset {} does not follow {}",
                        sample.offset_secs, prev.offset_secs
                    ),
                ));
            }
        }
        samples.push(sample);
    }

    if samples.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(samples)
}

const VENTURI_COLUMNS: usize = 7;
const AIR_DENSITY: f64 = 1.199;
const UPSTREAM_DIAMETER_M: f64 = 15e-3;
const THROAT_DIAMETER_M: f64 = 12e-3;

/// Converts a raw ADC pressure reading to pascal.
fn adc_to_pascal(adc: i64) -> f64 {
    let cm_h2o = (25.4 / (14745.0 - 1638.0)) * (adc as f64 - 1638.0);
    98.0665 * cm_h2o
}

/// Volumetric flow in m³/s through the Venturi tube. A non-positive
/// differential gives zero flow.
fn venturi_flow(p1: f64, p2: f64) -> f64 {
    let a1 = PI * (UPSTREAM_DIAMETER_M / 2.0).powi(2);
    let a2 = PI * (THROAT_DIAMETER_M / 2.0).powi(2);
    let differential = p1 - p2;
    if differential <= 0.0 {
        return 0.0;
    }
    a1 * ((2.0 / AIR_DENSITY) * differential / ((a1 / a2).powi(2) - 1.0)).sqrt()
}

fn parse_adc(line: usize, field: &str) -> AnalysisResult<i64> {
    field
        .parse()
        .map_err(|_| AnalysisError::malformed(line, format!("non-integer ADC reading {:?}", field)))
}

fn parse_venturi(text: &str) -> AnalysisResult<Vec<FlowSample>> {
    let mut samples: Vec<FlowSample> = Vec::new();
    let mut lines = text.lines().enumerate();
    // header
    lines.next();

    for (i, raw) in lines {
        let line = i + 1;
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        let fields: Vec<&str> = raw.split(',').map(str::trim).collect();
        if fields.len() != VENTURI_COLUMNS {
            return Err(AnalysisError::malformed(
                line,
                format!(
                    "expected {} columns, found {}",
                    VENTURI_COLUMNS,
                    fields.len()
                ),
            ));
        }
        for field in &fields {
            parse_number(line, field)?;
        }

        let time = parse_number(line, fields[0])?;
        let p2 = adc_to_pascal(parse_adc(line, fields[1])?);
        let p1_ins = adc_to_pascal(parse_adc(line, fields[2])?);
        let p1_exp = adc_to_pascal(parse_adc(line, fields[3])?);
        let flow = if p1_ins >= p1_exp {
            venturi_flow(p1_ins, p2)
        } else {
            -venturi_flow(p1_exp, p2)
        };

        if let Some(prev) = samples.last() {
            if time <= prev.offset_secs {
                return Err(AnalysisError::malformed(
                    line,
                    format!("time {} does not follow {}", time, prev.offset_secs),
                ));
            }
        }
        samples.push(FlowSample::new(time, flow));
    }

    if samples.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(samples)
}
