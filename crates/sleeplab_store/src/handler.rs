//! Request handlers for store operations.

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::store::PatientStore;
use sleeplab_protocol::{
    to_json, CalculatedData, ImagePayload, PatientInfo, PatientUpsert, PressureReading,
    PressureUpdate, PressureUpdated, RoomList, StoreRequest, Timestamp, TimestampList, UpsertAck,
};
use std::sync::Arc;

/// Context for request handling.
pub struct HandlerContext {
    /// The store (shared across all handlers).
    pub store: Arc<PatientStore>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(store: Arc<PatientStore>) -> Self {
        Self { store }
    }

    /// Configuration of the underlying store.
    pub fn config(&self) -> &StoreConfig {
        self.store.config()
    }
}

/// Handler for store requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    fn store(&self) -> &PatientStore {
        &self.context.store
    }

    /// Handles an upsert.
    pub fn handle_upsert(&self, upsert: PatientUpsert) -> StoreResult<UpsertAck> {
        self.store().upsert(upsert)
    }

    /// Handles a pressure read.
    pub fn handle_cpap_pressure(&self, room: u32) -> StoreResult<PressureReading> {
        Ok(PressureReading {
            cpap_pressure: self.store().cpap_pressure(room)?,
        })
    }

    /// Handles a room listing.
    pub fn handle_rooms(&self) -> RoomList {
        RoomList {
            rooms: self.store().rooms(),
        }
    }

    /// Handles a patient info read.
    pub fn handle_patient_info(&self, room: u32) -> StoreResult<PatientInfo> {
        self.store().patient_info(room)
    }

    /// Handles a latest-result read.
    pub fn handle_latest_data(&self, room: u32) -> StoreResult<CalculatedData> {
        self.store().latest_data(room)
    }

    /// Handles a history listing.
    pub fn handle_timestamps(&self, room: u32) -> StoreResult<TimestampList> {
        Ok(TimestampList {
            timestamps: self.store().timestamps(room)?,
        })
    }

    /// Handles an image read.
    pub fn handle_image(&self, room: u32, timestamp: Timestamp) -> StoreResult<ImagePayload> {
        Ok(ImagePayload {
            flow_image_base64: self.store().image(room, timestamp)?,
        })
    }

    /// Handles a pressure change from the monitoring station.
    pub fn handle_update_cpap(
        &self,
        room: u32,
        update: PressureUpdate,
    ) -> StoreResult<PressureUpdated> {
        let cpap_pressure = self.store().update_cpap_pressure(room, update.cpap_pressure)?;
        Ok(PressureUpdated {
            room,
            cpap_pressure,
        })
    }

    /// Runs any request and encodes the success body.
    pub fn handle(&self, request: StoreRequest) -> StoreResult<Vec<u8>> {
        let body = match request {
            StoreRequest::UpsertPatient(upsert) => to_json(&self.handle_upsert(upsert)?),
            StoreRequest::GetCpapPressure { room } => to_json(&self.handle_cpap_pressure(room)?),
            StoreRequest::GetRooms => to_json(&self.handle_rooms()),
            StoreRequest::GetPatientInfo { room } => to_json(&self.handle_patient_info(room)?),
            StoreRequest::GetLatestData { room } => to_json(&self.handle_latest_data(room)?),
            StoreRequest::GetTimestamps { room } => to_json(&self.handle_timestamps(room)?),
            StoreRequest::GetImage { room, timestamp } => {
                to_json(&self.handle_image(room, timestamp)?)
            }
            StoreRequest::UpdateCpapPressure { room, update } => {
                to_json(&self.handle_update_cpap(room, update)?)
            }
        };
        Ok(body?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use sleeplab_protocol::{from_json, CpapPressure};

    fn create_handler() -> RequestHandler {
        let store = Arc::new(PatientStore::new(StoreConfig::default()));
        let context = Arc::new(HandlerContext::new(store));
        RequestHandler::new(context)
    }

    #[test]
    fn upsert_and_read_back() {
        let handler = create_handler();
        let ack = handler
            .handle_upsert(
                PatientUpsert::new(5, 12)
                    .with_name("Cy")
                    .with_cpap_pressure(CpapPressure::new(7).unwrap()),
            )
            .unwrap();
        assert!(ack.created);

        assert_eq!(handler.handle_rooms().rooms, vec![12]);
        assert_eq!(
            handler.handle_cpap_pressure(12).unwrap().cpap_pressure.value(),
            7
        );
        let info = handler.handle_patient_info(12).unwrap();
        assert_eq!(info.mrn, 5);
        assert_eq!(info.name.as_deref(), Some("Cy"));
    }

    #[test]
    fn update_cpap_reports_room() {
        let handler = create_handler();
        handler.handle_upsert(PatientUpsert::new(5, 12)).unwrap();
        let updated = handler
            .handle_update_cpap(12, PressureUpdate { cpap_pressure: 15 })
            .unwrap();
        assert_eq!(updated.room, 12);
        assert_eq!(updated.cpap_pressure.value(), 15);

        let err = handler
            .handle_update_cpap(12, PressureUpdate { cpap_pressure: 30 })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn dispatch_encodes_json() {
        let handler = create_handler();
        handler.handle_upsert(PatientUpsert::new(5, 12)).unwrap();
        let body = handler.handle(StoreRequest::GetRooms).unwrap();
        let rooms: RoomList = from_json(&body).unwrap();
        assert_eq!(rooms.rooms, vec![12]);

        let err = handler
            .handle(StoreRequest::GetLatestData { room: 12 })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
