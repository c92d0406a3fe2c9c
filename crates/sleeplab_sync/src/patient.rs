//! Patient station: uploads results and follows pressure changes.

use crate::cache::PatientView;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::state::PatientState;
use crate::transport::StoreTransport;
use parking_lot::RwLock;
use sleeplab_protocol::{CpapPressure, FieldUpdate, PatientUpsert, UpsertAck};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The bedside station for one patient.
///
/// Uploads are user-triggered and never retried automatically. A failed
/// upload is kept so the user can retry it with [`PatientStation::retry`].
pub struct PatientStation<T: StoreTransport> {
    config: SyncConfig,
    transport: Arc<T>,
    state: RwLock<PatientState>,
    view: RwLock<Option<PatientView>>,
    failed: RwLock<Option<PatientUpsert>>,
}

impl<T: StoreTransport> PatientStation<T> {
    /// Creates a station with nothing uploaded yet.
    pub fn new(config: SyncConfig, transport: Arc<T>) -> Self {
        Self {
            config,
            transport,
            state: RwLock::new(PatientState::Idle),
            view: RwLock::new(None),
            failed: RwLock::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Returns the current state.
    pub fn state(&self) -> PatientState {
        *self.state.read()
    }

    /// Returns the cached patient view.
    pub fn view(&self) -> Option<PatientView> {
        self.view.read().clone()
    }

    /// Returns the upload waiting for a manual retry.
    pub fn failed_upload(&self) -> Option<PatientUpsert> {
        self.failed.read().clone()
    }

    /// Uploads an upsert to the store.
    pub fn upload(&self, request: PatientUpsert) -> SyncResult<UpsertAck> {
        request.validate()?;
        if let Some(view) = self.view.read().as_ref() {
            if view.mrn == request.mrn && view.room != request.room {
                return Err(SyncError::ImmutableField(format!(
                    "patient {} is registered in room {}",
                    view.mrn, view.room
                )));
            }
        }

        {
            let mut state = self.state.write();
            if !state.can_push() {
                return Err(SyncError::InvalidStateTransition {
                    from: state.to_string(),
                    to: PatientState::PendingPush.to_string(),
                });
            }
            *state = PatientState::PendingPush;
        }

        match self.transport.upsert_patient(&request) {
            Ok(ack) => {
                info!(
                    mrn = request.mrn,
                    room = request.room,
                    created = ack.created,
                    revision = ack.revision,
                    "patient upload accepted"
                );
                self.merge(request, ack);
                *self.failed.write() = None;
                *self.state.write() = PatientState::Synced;
                Ok(ack)
            }
            Err(err) => {
                warn!(mrn = request.mrn, room = request.room, error = %err, "patient upload failed");
                *self.failed.write() = Some(request);
                *self.state.write() = PatientState::Idle;
                Err(err)
            }
        }
    }

    /// Re-sends the last failed upload.
    pub fn retry(&self) -> SyncResult<UpsertAck> {
        let request = self.failed.write().take().ok_or(SyncError::NothingToRetry)?;
        self.upload(request)
    }

    /// Re-pulls the pressure setting for the station's room.
    ///
    /// Returns `None` before the first successful upload or while the store
    /// has no pressure for the room.
    pub fn poll(&self) -> SyncResult<Option<CpapPressure>> {
        let Some(room) = self.view.read().as_ref().map(|v| v.room) else {
            return Ok(None);
        };

        let pressure = match self.transport.cpap_pressure(room) {
            Ok(pressure) => Some(pressure),
            Err(SyncError::NotFound(_)) => None,
            Err(err) => return Err(err),
        };
        debug!(room, ?pressure, "polled pressure");

        if let (Some(view), Some(pressure)) = (self.view.write().as_mut(), pressure) {
            view.cpap_pressure = Some(pressure);
        }
        Ok(pressure)
    }

    fn merge(&self, request: PatientUpsert, ack: UpsertAck) {
        let mut slot = self.view.write();
        if slot.as_ref().map_or(true, |v| v.mrn != request.mrn) {
            *slot = Some(PatientView::new(request.mrn, request.room));
        }
        let Some(view) = slot.as_mut() else {
            return;
        };

        if let FieldUpdate::Present(data) = &request.data {
            view.cpap_pressure = Some(data.cpap_pressure);
            view.last_upload = Some(data.timestamp);
        }
        request.name.apply_to(&mut view.name);
        request.cpap_pressure.apply_to(&mut view.cpap_pressure);
        view.revision = ack.revision;
    }
}
