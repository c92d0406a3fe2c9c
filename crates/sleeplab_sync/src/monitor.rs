//! Monitoring station: watches one room and adjusts its pressure.

use crate::cache::RoomView;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::MonitorState;
use crate::transport::StoreTransport;
use base64::Engine;
use parking_lot::RwLock;
use sleeplab_protocol::{CpapPressure, Timestamp};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns a not-found answer into an empty value.
fn optional<T>(result: SyncResult<T>) -> SyncResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(SyncError::NotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// The nurse station that displays a selected room.
pub struct MonitorStation<T: StoreTransport> {
    config: SyncConfig,
    transport: Arc<T>,
    state: RwLock<MonitorState>,
    selected: RwLock<Option<u32>>,
    rooms: RwLock<Vec<u32>>,
    view: RwLock<Option<RoomView>>,
}

impl<T: StoreTransport> MonitorStation<T> {
    /// Creates a station with no room selected.
    pub fn new(config: SyncConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            state: RwLock::new(MonitorState::Idle),
            selected: RwLock::new(None),
            rooms: RwLock::new(Vec::new()),
            view: RwLock::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> MonitorState {
        *self.state.read()
    }

    /// Returns the selected room.
    pub fn room(&self) -> Option<u32> {
        *self.selected.read()
    }

    /// Occupied rooms as of the last poll.
    pub fn rooms(&self) -> Vec<u32> {
        self.rooms.read().clone()
    }

    /// Returns the displayed room view.
    pub fn view(&self) -> Option<RoomView> {
        self.view.read().clone()
    }

    /// Switches the display to another room. The view stays empty until
    /// the next pull.
    pub fn select_room(&self, room: u32) {
        *self.selected.write() = Some(room);
        *self.view.write() = None;
        *self.state.write() = MonitorState::Idle;
        debug!(room, "room selected");
    }

    /// Refreshes the room list and, if a room is selected, its view.
    pub fn poll(&self) -> SyncResult<()> {
        let rooms = self.transport.rooms()?;
        *self.rooms.write() = rooms;
        match self.room() {
            Some(room) => self.pull(room),
            None => Ok(()),
        }
    }

    /// Pulls the full view of `room` from the store.
    pub fn pull(&self, room: u32) -> SyncResult<()> {
        {
            let mut state = self.state.write();
            if !state.can_pull() {
                return Err(SyncError::InvalidStateTransition {
                    from: state.to_string(),
                    to: MonitorState::PendingPull.to_string(),
                });
            }
            *state = MonitorState::PendingPull;
        }

        let fetched = self.fetch(room);
        let mut view = self.view.write();
        let mut state = self.state.write();

        if self.room() != Some(room) {
            debug!(room, "discarding pull for deselected room");
            *state = MonitorState::Idle;
            return Ok(());
        }

        match fetched {
            Ok(fresh) => {
                debug!(
                    room,
                    results = fresh.timestamps.len(),
                    occupied = fresh.patient.is_some(),
                    "room refreshed"
                );
                *view = Some(fresh);
                *state = MonitorState::Displayed;
                Ok(())
            }
            Err(err) => {
                *state = if view.is_some() {
                    MonitorState::Displayed
                } else {
                    MonitorState::Idle
                };
                Err(err)
            }
        }
    }

    fn fetch(&self, room: u32) -> SyncResult<RoomView> {
        Ok(RoomView {
            room,
            patient: optional(self.transport.patient_info(room))?,
            cpap_pressure: optional(self.transport.cpap_pressure(room))?,
            latest: optional(self.transport.latest_data(room))?,
            timestamps: optional(self.transport.timestamps(room))?.unwrap_or_default(),
        })
    }

    /// Changes the pressure setting of the selected room.
    pub fn set_cpap_pressure(&self, value: i64) -> SyncResult<CpapPressure> {
        let room = self.room().ok_or(SyncError::NoRoomSelected)?;
        CpapPressure::new(value)?;

        let pressure = self.transport.update_cpap_pressure(room, value)?;
        info!(room, cpap_pressure = %pressure, "pressure updated");

        if let Some(view) = self.view.write().as_mut().filter(|v| v.room == room) {
            view.cpap_pressure = Some(pressure);
        }
        Ok(pressure)
    }

    /// Fetches and decodes the PNG stored for the selected room at
    /// `timestamp`.
    pub fn image_at(&self, timestamp: Timestamp) -> SyncResult<Vec<u8>> {
        let room = self.room().ok_or(SyncError::NoRoomSelected)?;
        let encoded = self.transport.image(room, timestamp)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SyncError::Protocol(format!("image is not base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use sleeplab_protocol::{CalculatedData, PatientInfo};

    fn station() -> (MonitorStation<MockTransport>, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::new());
        (
            MonitorStation::new(SyncConfig::default(), Arc::clone(&transport)),
            transport,
        )
    }

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse(text).unwrap()
    }

    fn occupy(transport: &MockTransport, room: u32) {
        transport.set_patient(
            room,
            PatientInfo {
                name: Some("Ada".into()),
                mrn: 7,
            },
        );
        transport.set_cpap_pressure(room, CpapPressure::new(10).unwrap());
        transport.push_data(
            room,
            CalculatedData::new(
                CpapPressure::new(10).unwrap(),
                15.0,
                3,
                b"\x89PNG",
                ts("2024-11-23T22:00:00"),
            ),
        );
    }

    #[test]
    fn poll_without_room_lists_rooms() {
        let (station, transport) = station();
        occupy(&transport, 101);
        occupy(&transport, 103);

        station.poll().unwrap();
        assert_eq!(station.rooms(), vec![101, 103]);
        assert_eq!(station.state(), MonitorState::Idle);
        assert!(station.view().is_none());
    }

    #[test]
    fn poll_displays_selected_room() {
        let (station, transport) = station();
        occupy(&transport, 101);
        station.select_room(101);

        station.poll().unwrap();
        assert_eq!(station.state(), MonitorState::Displayed);
        let view = station.view().unwrap();
        assert_eq!(view.patient.unwrap().mrn, 7);
        assert_eq!(view.timestamps, vec![ts("2024-11-23T22:00:00")]);
        assert!(view.latest.is_some());
    }

    #[test]
    fn empty_room_is_displayed_empty() {
        let (station, _) = station();
        station.select_room(110);
        station.poll().unwrap();

        let view = station.view().unwrap();
        assert_eq!(view, RoomView::empty(110));
        assert!(!view.needs_attention());
    }

    #[test]
    fn failed_pull_keeps_previous_view() {
        let (station, transport) = station();
        occupy(&transport, 101);
        station.select_room(101);
        station.poll().unwrap();

        transport.set_failure(Some(SyncError::transport_retryable("down")));
        assert!(station.poll().is_err());
        assert_eq!(station.state(), MonitorState::Displayed);
        assert!(station.view().is_some());
    }

    #[test]
    fn pressure_change_validated_locally() {
        let (station, transport) = station();
        assert!(matches!(
            station.set_cpap_pressure(10),
            Err(SyncError::NoRoomSelected)
        ));

        occupy(&transport, 101);
        station.select_room(101);
        assert!(matches!(
            station.set_cpap_pressure(26),
            Err(SyncError::Validation(_))
        ));
        assert!(transport.pressure_updates().is_empty());

        station.poll().unwrap();
        let set = station.set_cpap_pressure(18).unwrap();
        assert_eq!(set.value(), 18);
        assert_eq!(station.view().unwrap().cpap_pressure, Some(set));
    }

    #[test]
    fn historical_image_decoded() {
        let (station, transport) = station();
        occupy(&transport, 101);
        station.select_room(101);

        assert_eq!(station.image_at(ts("2024-11-23T22:00:00")).unwrap(), b"\x89PNG");
        assert!(matches!(
            station.image_at(ts("2024-11-23T23:00:00")),
            Err(SyncError::NotFound(_))
        ));
    }
}
