//! Request and response bodies for store operations.

use crate::data::CalculatedData;
use crate::error::{ProtocolError, ProtocolResult};
use crate::pressure::CpapPressure;
use crate::timestamp::Timestamp;
use crate::update::FieldUpdate;
use serde::{Deserialize, Serialize};

/// Create-or-merge request for a patient record.
///
/// `mrn` and `room` identify the record and are required. Every other field
/// is updated only when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientUpsert {
    /// Medical record number.
    pub mrn: u64,
    /// Room number.
    pub room: u32,
    /// Patient name.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_absent")]
    pub name: FieldUpdate<String>,
    /// Current pressure setting.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_absent")]
    pub cpap_pressure: FieldUpdate<CpapPressure>,
    /// A new analysis result to append.
    #[serde(default, skip_serializing_if = "FieldUpdate::is_absent")]
    pub data: FieldUpdate<CalculatedData>,
}

impl PatientUpsert {
    /// Creates an upsert that only names the record.
    pub fn new(mrn: u64, room: u32) -> Self {
        Self {
            mrn,
            room,
            name: FieldUpdate::Absent,
            cpap_pressure: FieldUpdate::Absent,
            data: FieldUpdate::Absent,
        }
    }

    /// Sets the name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = FieldUpdate::Present(name.into());
        self
    }

    /// Sets the pressure.
    pub fn with_cpap_pressure(mut self, pressure: CpapPressure) -> Self {
        self.cpap_pressure = FieldUpdate::Present(pressure);
        self
    }

    /// Attaches an analysis result.
    pub fn with_data(mut self, data: CalculatedData) -> Self {
        self.data = FieldUpdate::Present(data);
        self
    }

    /// Checks every present field.
    pub fn validate(&self) -> ProtocolResult<()> {
        if let FieldUpdate::Present(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ProtocolError::validation("name must not be blank"));
            }
        }
        if let FieldUpdate::Present(data) = &self.data {
            data.validate()?;
        }
        Ok(())
    }
}

/// Acknowledgement of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertAck {
    /// True if a new record was created.
    pub created: bool,
    /// Record revision after the write.
    pub revision: u64,
}

/// Current pressure for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureReading {
    /// Pressure setting.
    pub cpap_pressure: CpapPressure,
}

/// Rooms with a registered patient.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomList {
    /// Room numbers in ascending order.
    pub rooms: Vec<u32>,
}

/// Identity of the patient in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientInfo {
    /// Patient name, if known.
    pub name: Option<String>,
    /// Medical record number.
    pub mrn: u64,
}

/// Timestamps of every analysis result stored for a room.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimestampList {
    /// Timestamps in ascending order.
    pub timestamps: Vec<Timestamp>,
}

/// A stored waveform image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Base64-encoded PNG.
    pub flow_image_base64: String,
}

/// Pressure change requested by the monitoring station.
///
/// The value is carried unvalidated so the store can report range errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureUpdate {
    /// Requested pressure setting.
    pub cpap_pressure: i64,
}

/// Confirmation of a pressure change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureUpdated {
    /// Room that was updated.
    pub room: u32,
    /// New pressure setting.
    pub cpap_pressure: CpapPressure,
}

/// Error category carried in error bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was malformed or out of range.
    Validation,
    /// The request tried to change a write-once field.
    ImmutableField,
    /// The room, patient or image does not exist.
    NotFound,
    /// The store failed.
    Internal,
}

impl ErrorKind {
    /// HTTP status code for this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::ImmutableField => 409,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Error category.
    pub kind: ErrorKind,
}

impl ErrorBody {
    /// Creates an error body.
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::{from_json, to_json};

    #[test]
    fn minimal_upsert_omits_optional_fields() {
        let upsert = PatientUpsert::new(1, 101);
        let json = String::from_utf8(to_json(&upsert).unwrap()).unwrap();
        assert_eq!(json, r#"{"mrn":1,"room":101}"#);
    }

    #[test]
    fn upsert_requires_identity() {
        assert!(from_json::<PatientUpsert>(br#"{"room":101}"#).is_err());
        assert!(from_json::<PatientUpsert>(br#"{"mrn":1}"#).is_err());
        assert!(from_json::<PatientUpsert>(br#"{"mrn":-1,"room":101}"#).is_err());
    }

    #[test]
    fn upsert_rejects_null_fields() {
        let body = br#"{"mrn":1,"room":101,"cpap_pressure":null}"#;
        assert!(from_json::<PatientUpsert>(body).is_err());
    }

    #[test]
    fn upsert_validation() {
        let upsert = PatientUpsert::new(1, 101).with_name("   ");
        assert!(upsert.validate().is_err());

        let upsert = PatientUpsert::new(1, 101)
            .with_name("Ann Lee")
            .with_cpap_pressure(CpapPressure::new(10).unwrap());
        assert!(upsert.validate().is_ok());
    }

    #[test]
    fn error_kind_status() {
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::ImmutableField.status_code(), 409);
        assert_eq!(ErrorKind::NotFound.status_code(), 404);
        let body = ErrorBody::new(ErrorKind::NotFound, "no patient in room 7");
        let json = String::from_utf8(to_json(&body).unwrap()).unwrap();
        assert!(json.contains(r#""kind":"not_found""#));
    }
}
