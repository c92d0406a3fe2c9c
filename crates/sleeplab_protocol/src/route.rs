//! Route table for store operations.

use crate::error::{ProtocolError, ProtocolResult};
use crate::json::{from_json, to_json};
use crate::messages::{PatientUpsert, PressureUpdate};
use crate::timestamp::Timestamp;
use std::fmt;

/// HTTP method of a store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Read-only request.
    Get,
    /// Write request with a JSON body.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// Status and JSON body returned by a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Anything that can answer store requests in-process.
pub trait HttpHandler: Send + Sync {
    /// Handles one request.
    fn handle(&self, method: HttpMethod, path: &str, body: &[u8]) -> HttpResponse;
}

impl<H: HttpHandler + ?Sized> HttpHandler for std::sync::Arc<H> {
    fn handle(&self, method: HttpMethod, path: &str, body: &[u8]) -> HttpResponse {
        (**self).handle(method, path, body)
    }
}

/// One store operation with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    /// `POST /upload_patient`
    UpsertPatient(PatientUpsert),
    /// `GET /room/{room}/cpap_pressure`
    GetCpapPressure {
        /// Room number.
        room: u32,
    },
    /// `GET /rooms`
    GetRooms,
    /// `GET /room/{room}/patient_info`
    GetPatientInfo {
        /// Room number.
        room: u32,
    },
    /// `GET /room/{room}/patient_data`
    GetLatestData {
        /// Room number.
        room: u32,
    },
    /// `GET /room/{room}/timestamps`
    GetTimestamps {
        /// Room number.
        room: u32,
    },
    /// `GET /room/{room}/image/{timestamp}`
    GetImage {
        /// Room number.
        room: u32,
        /// Timestamp of the analysis result.
        timestamp: Timestamp,
    },
    /// `POST /room/{room}/update_cpap`
    UpdateCpapPressure {
        /// Room number.
        room: u32,
        /// Requested change.
        update: PressureUpdate,
    },
}

impl StoreRequest {
    /// Short operation name, used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            StoreRequest::UpsertPatient(_) => "upsert_patient",
            StoreRequest::GetCpapPressure { .. } => "get_cpap_pressure",
            StoreRequest::GetRooms => "get_rooms",
            StoreRequest::GetPatientInfo { .. } => "get_patient_info",
            StoreRequest::GetLatestData { .. } => "get_latest_data",
            StoreRequest::GetTimestamps { .. } => "get_timestamps",
            StoreRequest::GetImage { .. } => "get_image",
            StoreRequest::UpdateCpapPressure { .. } => "update_cpap_pressure",
        }
    }

    /// HTTP method of the operation.
    pub fn method(&self) -> HttpMethod {
        match self {
            StoreRequest::UpsertPatient(_) | StoreRequest::UpdateCpapPressure { .. } => {
                HttpMethod::Post
            }
            _ => HttpMethod::Get,
        }
    }

    /// Request path of the operation.
    pub fn path(&self) -> String {
        match self {
            StoreRequest::UpsertPatient(_) => "/upload_patient".into(),
            StoreRequest::GetCpapPressure { room } => format!("/room/{}/cpap_pressure", room),
            StoreRequest::GetRooms => "/rooms".into(),
            StoreRequest::GetPatientInfo { room } => format!("/room/{}/patient_info", room),
            StoreRequest::GetLatestData { room } => format!("/room/{}/patient_data", room),
            StoreRequest::GetTimestamps { room } => format!("/room/{}/timestamps", room),
            StoreRequest::GetImage { room, timestamp } => {
                format!("/room/{}/image/{}", room, timestamp)
            }
            StoreRequest::UpdateCpapPressure { room, .. } => format!("/room/{}/update_cpap", room),
        }
    }

    /// JSON body of the operation (empty for reads).
    pub fn body(&self) -> ProtocolResult<Vec<u8>> {
        match self {
            StoreRequest::UpsertPatient(upsert) => to_json(upsert),
            StoreRequest::UpdateCpapPressure { update, .. } => to_json(update),
            _ => Ok(Vec::new()),
        }
    }

    /// Resolves a method, path and body into an operation.
    pub fn parse(method: HttpMethod, path: &str, body: &[u8]) -> ProtocolResult<Self> {
        let unknown = || ProtocolError::UnknownRoute {
            method: method.to_string(),
            path: path.to_string(),
        };

        let path = path.split('?').next().unwrap_or(path);
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

        match (method, segments.as_slice()) {
            (HttpMethod::Post, ["upload_patient"]) => {
                Ok(StoreRequest::UpsertPatient(from_json(body)?))
            }
            (HttpMethod::Get, ["rooms"]) => Ok(StoreRequest::GetRooms),
            (_, ["room", room, rest @ ..]) => {
                let room: u32 = room.parse().map_err(|_| unknown())?;
                match (method, rest) {
                    (HttpMethod::Get, ["cpap_pressure"]) => {
                        Ok(StoreRequest::GetCpapPressure { room })
                    }
                    (HttpMethod::Get, ["patient_info"]) => Ok(StoreRequest::GetPatientInfo { room }),
                    (HttpMethod::Get, ["patient_data"]) => Ok(StoreRequest::GetLatestData { room }),
                    (HttpMethod::Get, ["timestamps"]) => Ok(StoreRequest::GetTimestamps { room }),
                    (HttpMethod::Get, ["image", timestamp]) => Ok(StoreRequest::GetImage {
                        room,
                        timestamp: Timestamp::parse(timestamp)?,
                    }),
                    (HttpMethod::Post, ["update_cpap"]) => Ok(StoreRequest::UpdateCpapPressure {
                        room,
                        update: from_json(body)?,
                    }),
                    _ => Err(unknown()),
                }
            }
            _ => Err(unknown()),
        }
    }
}
