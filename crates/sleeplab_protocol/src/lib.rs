//! # SleepLab Protocol
//!
//! Wire types shared by the SleepLab store and its clients.
//!
//! This crate provides:
//! - Validated value types (`CpapPressure`, `Timestamp`)
//! - The `CalculatedData` record produced by one analysis run
//! - Explicit optional-field updates (`FieldUpdate`)
//! - Request and response bodies for every store operation
//! - The route table (`StoreRequest`) and the `HttpHandler` exchange trait
//!
//! All bodies are JSON. Timestamps are ISO-8601 without offset
//! (`YYYY-MM-DDTHH:MM:SS`) and images travel as base64-encoded PNG.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod data;
mod error;
mod json;
mod messages;
mod pressure;
mod route;
mod timestamp;
mod update;

pub use data::CalculatedData;
pub use error::{ProtocolError, ProtocolResult};
pub use json::{from_json, to_json};
pub use messages::{
    ErrorBody, ErrorKind, ImagePayload, PatientInfo, PatientUpsert, PressureReading,
    PressureUpdate, PressureUpdated, RoomList, TimestampList, UpsertAck,
};
pub use pressure::CpapPressure;
pub use route::{HttpHandler, HttpMethod, HttpResponse, StoreRequest};
pub use timestamp::Timestamp;
pub use update::FieldUpdate;
