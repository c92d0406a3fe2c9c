//! Per-station local caches.
//!
//! A cache is refreshed only by a poll or an explicit pull, never by the
//! store reaching out.

use sleeplab_protocol::{CalculatedData, CpapPressure, PatientInfo, Timestamp};

/// What the patient station knows about its patient.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientView {
    /// Medical record number.
    pub mrn: u64,
    /// Room number.
    pub room: u32,
    /// Patient name, if uploaded.
    pub name: Option<String>,
    /// Latest known pressure setting.
    pub cpap_pressure: Option<CpapPressure>,
    /// Timestamp of the last uploaded analysis result.
    pub last_upload: Option<Timestamp>,
    /// Store revision after the last accepted upload.
    pub revision: u64,
}

impl PatientView {
    /// Creates a view for a newly identified patient.
    pub fn new(mrn: u64, room: u32) -> Self {
        Self {
            mrn,
            room,
            name: None,
            cpap_pressure: None,
            last_upload: None,
            revision: 0,
        }
    }
}

/// What the monitoring station shows for one room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    /// Room number.
    pub room: u32,
    /// Occupant identity.
    pub patient: Option<PatientInfo>,
    /// Current pressure setting.
    pub cpap_pressure: Option<CpapPressure>,
    /// Most recent analysis result.
    pub latest: Option<CalculatedData>,
    /// Timestamps of every stored result.
    pub timestamps: Vec<Timestamp>,
}

impl RoomView {
    /// Creates an empty view.
    pub fn empty(room: u32) -> Self {
        Self {
            room,
            patient: None,
            cpap_pressure: None,
            latest: None,
            timestamps: Vec::new(),
        }
    }

    /// Returns true if the latest result shows enough apneas to flag.
    pub fn needs_attention(&self) -> bool {
        self.latest.as_ref().is_some_and(CalculatedData::needs_attention)
    }
}
