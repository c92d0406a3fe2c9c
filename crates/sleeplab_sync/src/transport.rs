//! Transport layer abstraction for store operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use sleeplab_protocol::{
    CalculatedData, CpapPressure, PatientInfo, PatientUpsert, Timestamp, UpsertAck,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A store transport carries station requests to the patient store.
///
/// Every call is a blocking request/response exchange. Implementations
/// must not retry on their own.
pub trait StoreTransport: Send + Sync {
    /// Creates or updates a patient record.
    fn upsert_patient(&self, request: &PatientUpsert) -> SyncResult<UpsertAck>;

    /// Current pressure setting of the room's occupant.
    fn cpap_pressure(&self, room: u32) -> SyncResult<CpapPressure>;

    /// Occupied rooms, ascending.
    fn rooms(&self) -> SyncResult<Vec<u32>>;

    /// Identity of the room's occupant.
    fn patient_info(&self, room: u32) -> SyncResult<PatientInfo>;

    /// Most recent analysis result for the room.
    fn latest_data(&self, room: u32) -> SyncResult<CalculatedData>;

    /// Timestamps of every stored result for the room.
    fn timestamps(&self, room: u32) -> SyncResult<Vec<Timestamp>>;

    /// Base64 PNG stored at `timestamp`.
    fn image(&self, room: u32, timestamp: Timestamp) -> SyncResult<String>;

    /// Changes the room occupant's pressure setting.
    fn update_cpap_pressure(&self, room: u32, cpap_pressure: i64) -> SyncResult<CpapPressure>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;
}

impl<T: StoreTransport + ?Sized> StoreTransport for Arc<T> {
    fn upsert_patient(&self, request: &PatientUpsert) -> SyncResult<UpsertAck> {
        (**self).upsert_patient(request)
    }

    fn cpap_pressure(&self, room: u32) -> SyncResult<CpapPressure> {
        (**self).cpap_pressure(room)
    }

    fn rooms(&self) -> SyncResult<Vec<u32>> {
        (**self).rooms()
    }

    fn patient_info(&self, room: u32) -> SyncResult<PatientInfo> {
        (**self).patient_info(room)
    }

    fn latest_data(&self, room: u32) -> SyncResult<CalculatedData> {
        (**self).latest_data(room)
    }

    fn timestamps(&self, room: u32) -> SyncResult<Vec<Timestamp>> {
        (**self).timestamps(room)
    }

    fn image(&self, room: u32, timestamp: Timestamp) -> SyncResult<String> {
        (**self).image(room, timestamp)
    }

    fn update_cpap_pressure(&self, room: u32, cpap_pressure: i64) -> SyncResult<CpapPressure> {
        (**self).update_cpap_pressure(room, cpap_pressure)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn close(&self) -> SyncResult<()> {
        (**self).close()
    }
}

#[derive(Debug, Default)]
struct MockState {
    failure: Option<SyncError>,
    ack: Option<UpsertAck>,
    pressures: HashMap<u32, CpapPressure>,
    patients: HashMap<u32, PatientInfo>,
    latest: HashMap<u32, CalculatedData>,
    timestamps: HashMap<u32, Vec<Timestamp>>,
    images: HashMap<(u32, Timestamp), String>,
    upserts: Vec<PatientUpsert>,
    pressure_updates: Vec<(u32, i64)>,
}

/// A mock transport for testing.
///
/// Answers from canned per-room values and records every write.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    calls: AtomicUsize,
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Sets the connection state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes every following call fail with `error`, or clears it.
    pub fn set_failure(&self, error: Option<SyncError>) {
        self.state.lock().failure = error;
    }

    /// Sets the acknowledgement returned for uploads.
    pub fn set_upsert_ack(&self, ack: UpsertAck) {
        self.state.lock().ack = Some(ack);
    }

    /// Sets the pressure reported for a room.
    pub fn set_cpap_pressure(&self, room: u32, pressure: CpapPressure) {
        self.state.lock().pressures.insert(room, pressure);
    }

    /// Sets the occupant of a room.
    pub fn set_patient(&self, room: u32, info: PatientInfo) {
        self.state.lock().patients.insert(room, info);
    }

    /// Adds an analysis result to a room. It becomes the latest.
    pub fn push_data(&self, room: u32, data: CalculatedData) {
        let mut state = self.state.lock();
        state.timestamps.entry(room).or_default().push(data.timestamp);
        state
            .images
            .insert((room, data.timestamp), data.flow_image.clone());
        state.latest.insert(room, data);
    }

    /// Uploads received so far.
    pub fn upserts(&self) -> Vec<PatientUpsert> {
        self.state.lock().upserts.clone()
    }

    /// Pressure changes received so far.
    pub fn pressure_updates(&self) -> Vec<(u32, i64)> {
        self.state.lock().pressure_updates.clone()
    }

    /// Number of transport calls made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self) -> SyncResult<parking_lot::MutexGuard<'_, MockState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let state = self.state.lock();
        if let Some(err) = state.failure.clone() {
            return Err(err);
        }
        Ok(state)
    }
}

fn missing(what: &str, room: u32) -> SyncError {
    SyncError::NotFound(format!("no {} for room {}", what, room))
}

impl StoreTransport for MockTransport {
    fn upsert_patient(&self, request: &PatientUpsert) -> SyncResult<UpsertAck> {
        let mut state = self.begin()?;
        state.upserts.push(request.clone());
        let count = state.upserts.len();
        let ack = state.ack.unwrap_or(UpsertAck {
            created: count == 1,
            revision: count as u64,
        });
        Ok(ack)
    }

    fn cpap_pressure(&self, room: u32) -> SyncResult<CpapPressure> {
        let state = self.begin()?;
        state
            .pressures
            .get(&room)
            .copied()
            .ok_or_else(|| missing("pressure", room))
    }

    fn rooms(&self) -> SyncResult<Vec<u32>> {
        let state = self.begin()?;
        let mut rooms: Vec<u32> = state.patients.keys().copied().collect();
        rooms.sort_unstable();
        Ok(rooms)
    }

    fn patient_info(&self, room: u32) -> SyncResult<PatientInfo> {
        let state = self.begin()?;
        state
            .patients
            .get(&room)
            .cloned()
            .ok_or_else(|| missing("patient", room))
    }

    fn latest_data(&self, room: u32) -> SyncResult<CalculatedData> {
        let state = self.begin()?;
        state
            .latest
            .get(&room)
            .cloned()
            .ok_or_else(|| missing("data", room))
    }

    fn timestamps(&self, room: u32) -> SyncResult<Vec<Timestamp>> {
        let state = self.begin()?;
        state
            .timestamps
            .get(&room)
            .cloned()
            .ok_or_else(|| missing("data", room))
    }

    fn image(&self, room: u32, timestamp: Timestamp) -> SyncResult<String> {
        let state = self.begin()?;
        state
            .images
            .get(&(room, timestamp))
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("no image at {}", timestamp)))
    }

    fn update_cpap_pressure(&self, room: u32, cpap_pressure: i64) -> SyncResult<CpapPressure> {
        let mut state = self.begin()?;
        let pressure = CpapPressure::new(cpap_pressure)?;
        if !state.patients.contains_key(&room) {
            return Err(missing("patient", room));
        }
        state.pressure_updates.push((room, cpap_pressure));
        state.pressures.insert(room, pressure);
        Ok(pressure)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
