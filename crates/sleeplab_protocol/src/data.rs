//! The record produced by one analysis run.

use crate::error::{ProtocolError, ProtocolResult};
use crate::pressure::CpapPressure;
use crate::timestamp::Timestamp;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Metrics derived from one flow recording, together with the rendered
/// waveform and the pressure setting in effect.
///
/// A `CalculatedData` is never edited after creation. A newer analysis run
/// produces a new record that supersedes this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedData {
    /// Pressure setting during the recording.
    pub cpap_pressure: CpapPressure,
    /// Breaths per minute, rounded to one decimal.
    pub breathing_rate: f64,
    /// Number of apnea events.
    pub apnea_count: u32,
    /// Base64-encoded PNG of the flow waveform. May be empty.
    #[serde(rename = "flow_image_base64")]
    pub flow_image: String,
    /// When the analysis ran.
    pub timestamp: Timestamp,
}

impl CalculatedData {
    /// Creates a record from raw PNG bytes.
    pub fn new(
        cpap_pressure: CpapPressure,
        breathing_rate: f64,
        apnea_count: u32,
        png: &[u8],
        timestamp: Timestamp,
    ) -> Self {
        Self {
            cpap_pressure,
            breathing_rate,
            apnea_count,
            flow_image: base64::engine::general_purpose::STANDARD.encode(png),
            timestamp,
        }
    }

    /// Checks the metric ranges and the image encoding.
    pub fn validate(&self) -> ProtocolResult<()> {
        if !self.breathing_rate.is_finite() || self.breathing_rate < 0.0 {
            return Err(ProtocolError::Validation(format!(
                "breathing rate must be a non-negative number, got {}",
                self.breathing_rate
            )));
        }
        self.decode_image().map(|_| ())
    }

    /// Decodes the embedded image into PNG bytes.
    pub fn decode_image(&self) -> ProtocolResult<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.flow_image)
            .map_err(|e| ProtocolError::Validation(format!("flow image is not base64: {}", e)))
    }

    /// Returns true if the apnea count warrants attention on a display.
    pub fn needs_attention(&self) -> bool {
        self.apnea_count >= 2
    }

    /// Returns the metrics without the timestamp, for comparing two runs.
    pub fn same_analysis(&self, other: &CalculatedData) -> bool {
        self.cpap_pressure == other.cpap_pressure
            && self.breathing_rate.to_bits() == other.breathing_rate.to_bits()
            && self.apnea_count == other.apnea_count
            && self.flow_image == other.flow_image
    }
}
