//! The patient document store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::record::{DataEntry, ImageDigest, PatientRecord};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use sleeplab_protocol::{
    CalculatedData, CpapPressure, FieldUpdate, PatientInfo, PatientUpsert, Timestamp, UpsertAck,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Default)]
struct StoreState {
    records: HashMap<u64, PatientRecord>,
    /// room -> mrn of the occupant
    rooms: BTreeMap<u32, u64>,
    /// digest -> base64 PNG
    images: HashMap<ImageDigest, String>,
}

impl StoreState {
    fn occupant(&self, room: u32) -> StoreResult<&PatientRecord> {
        self.rooms
            .get(&room)
            .and_then(|mrn| self.records.get(mrn))
            .ok_or_else(|| StoreError::NotFound(format!("no patient in room {}", room)))
    }

    fn occupant_mut(&mut self, room: u32) -> StoreResult<&mut PatientRecord> {
        let mrn = *self
            .rooms
            .get(&room)
            .ok_or_else(|| StoreError::NotFound(format!("no patient in room {}", room)))?;
        self.records
            .get_mut(&mrn)
            .ok_or_else(|| StoreError::Internal(format!("room {} indexes missing mrn {}", room, mrn)))
    }

    fn image(&self, digest: &ImageDigest) -> StoreResult<&String> {
        self.images
            .get(digest)
            .ok_or_else(|| StoreError::Internal(format!("image {:?} missing from cache", digest)))
    }

    fn discharge(&mut self, mrn: u64) {
        let Some(record) = self.records.remove(&mrn) else {
            return;
        };
        self.rooms.remove(&record.room());

        let released: HashSet<ImageDigest> = record.data().iter().map(|d| d.image).collect();
        let still_used: HashSet<ImageDigest> = self
            .records
            .values()
            .flat_map(|r| r.data().iter().map(|d| d.image))
            .filter(|d| released.contains(d))
            .collect();
        for digest in released.difference(&still_used) {
            self.images.remove(digest);
        }
    }
}

fn digest(encoded_image: &str) -> ImageDigest {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(encoded_image.as_bytes()));
    ImageDigest(out)
}

/// In-memory store of patient records, one per room.
///
/// All state sits behind a single lock; every operation either reads a
/// consistent snapshot or applies its whole write.
pub struct PatientStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl PatientStore {
    /// Creates an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: RwLock::new(StoreState::default()),
        }
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Creates a record or merges present fields into an existing one.
    ///
    /// A present `data` entry is appended; name and pressure overwrite.
    /// Appending data also sets the current pressure, unless the request
    /// carries its own pressure.
    pub fn upsert(&self, upsert: PatientUpsert) -> StoreResult<UpsertAck> {
        upsert.validate()?;
        let PatientUpsert {
            mrn,
            room,
            name,
            cpap_pressure,
            data,
        } = upsert;

        let mut state = self.state.write();

        let registered_room = state.records.get(&mrn).map(PatientRecord::room);
        let created = match registered_room {
            Some(existing) if existing != room => {
                return Err(StoreError::ImmutableField {
                    field: "room",
                    message: format!(
                        "patient {} is registered in room {}, not {}",
                        mrn, existing, room
                    ),
                });
            }
            Some(_) => false,
            None => {
                let occupant = state.rooms.get(&room).copied();
                if let Some(occupant) = occupant {
                    if !self.config.discharge_on_admit {
                        return Err(StoreError::Validation(format!(
                            "room {} is occupied by patient {}",
                            room, occupant
                        )));
                    }
                    warn!(room, discharged = occupant, admitted = mrn, "discharging previous occupant");
                    state.discharge(occupant);
                }
                state.records.insert(mrn, PatientRecord::new(mrn, room));
                state.rooms.insert(room, mrn);
                true
            }
        };

        let mut new_image = None;
        let record = state
            .records
            .get_mut(&mrn)
            .ok_or_else(|| StoreError::Internal(format!("record {} vanished", mrn)))?;

        if let FieldUpdate::Present(data) = data {
            let timestamp = record.next_timestamp(data.timestamp)?;
            if timestamp != data.timestamp {
                debug!(mrn, requested = %data.timestamp, stored = %timestamp, "timestamp bumped");
            }
            let image = digest(&data.flow_image);
            record.push_entry(DataEntry {
                cpap_pressure: data.cpap_pressure,
                breathing_rate: data.breathing_rate,
                apnea_count: data.apnea_count,
                image,
                timestamp,
            });
            record.cpap_pressure = Some(data.cpap_pressure);
            new_image = Some((image, data.flow_image));
        }
        name.apply_to(&mut record.name);
        cpap_pressure.apply_to(&mut record.cpap_pressure);
        let revision = record.bump_revision();

        if let Some((key, encoded)) = new_image {
            state.images.entry(key).or_insert(encoded);
        }

        info!(mrn, room, created, revision, "patient upserted");
        Ok(UpsertAck { created, revision })
    }

    /// Current pressure for a room.
    pub fn cpap_pressure(&self, room: u32) -> StoreResult<CpapPressure> {
        let state = self.state.read();
        state
            .occupant(room)?
            .cpap_pressure
            .ok_or_else(|| StoreError::NotFound(format!("no pressure set for room {}", room)))
    }

    /// Occupied rooms, ascending.
    pub fn rooms(&self) -> Vec<u32> {
        self.state.read().rooms.keys().copied().collect()
    }

    /// Identity of a room's occupant.
    pub fn patient_info(&self, room: u32) -> StoreResult<PatientInfo> {
        Ok(self.state.read().occupant(room)?.info())
    }

    /// Most recent analysis result for a room.
    pub fn latest_data(&self, room: u32) -> StoreResult<CalculatedData> {
        let state = self.state.read();
        let entry = state
            .occupant(room)?
            .latest()
            .ok_or_else(|| StoreError::NotFound(format!("no analysis data for room {}", room)))?;
        Ok(CalculatedData {
            cpap_pressure: entry.cpap_pressure,
            breathing_rate: entry.breathing_rate,
            apnea_count: entry.apnea_count,
            flow_image: state.image(&entry.image)?.clone(),
            timestamp: entry.timestamp,
        })
    }

    /// Timestamps of every result stored for a room.
    pub fn timestamps(&self, room: u32) -> StoreResult<Vec<Timestamp>> {
        let state = self.state.read();
        let timestamps = state.occupant(room)?.timestamps();
        if timestamps.is_empty() {
            return Err(StoreError::NotFound(format!("no analysis data for room {}", room)));
        }
        Ok(timestamps)
    }

    /// Base64 PNG of the result recorded at `timestamp`.
    pub fn image(&self, room: u32, timestamp: Timestamp) -> StoreResult<String> {
        let state = self.state.read();
        let entry = state.occupant(room)?.entry_at(timestamp).ok_or_else(|| {
            StoreError::NotFound(format!("no image for room {} at {}", room, timestamp))
        })?;
        state.image(&entry.image).cloned()
    }

    /// Sets a room's pressure. Only the pressure field is touched.
    pub fn update_cpap_pressure(&self, room: u32, value: i64) -> StoreResult<CpapPressure> {
        let pressure = CpapPressure::new(value)?;
        let mut state = self.state.write();
        let record = state.occupant_mut(room)?;
        record.cpap_pressure = Some(pressure);
        let revision = record.bump_revision();
        info!(room, cpap_pressure = %pressure, revision, "pressure updated");
        Ok(pressure)
    }

    /// Snapshot of a record by mrn.
    pub fn record(&self, mrn: u64) -> Option<PatientRecord> {
        self.state.read().records.get(&mrn).cloned()
    }

    /// Number of registered patients.
    pub fn patient_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Number of distinct cached images.
    pub fn image_count(&self) -> usize {
        self.state.read().images.len()
    }
}

impl Default for PatientStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse(text).unwrap()
    }

    fn pressure(v: i64) -> CpapPressure {
        CpapPressure::new(v).unwrap()
    }

    fn result(p: i64, at: &str, png: &[u8]) -> CalculatedData {
        CalculatedData::new(pressure(p), 15.2, 1, png, ts(at))
    }

    #[test]
    fn create_then_merge() {
        let store = PatientStore::default();
        let ack = store.upsert(PatientUpsert::new(1, 101).with_name("Ann")).unwrap();
        assert!(ack.created);
        assert_eq!(ack.revision, 1);

        let ack = store
            .upsert(PatientUpsert::new(1, 101).with_cpap_pressure(pressure(9)))
            .unwrap();
        assert!(!ack.created);
        assert_eq!(ack.revision, 2);

        let record = store.record(1).unwrap();
        assert_eq!(record.name.as_deref(), Some("Ann"));
        assert_eq!(record.cpap_pressure, Some(pressure(9)));
        assert_eq!(store.patient_count(), 1);
    }

    #[test]
    fn room_is_write_once() {
        let store = PatientStore::default();
        store.upsert(PatientUpsert::new(1, 101)).unwrap();
        let err = store.upsert(PatientUpsert::new(1, 102).with_name("Moved")).unwrap_err();
        assert!(matches!(err, StoreError::ImmutableField { field: "room", .. }));

        // nothing was applied
        let record = store.record(1).unwrap();
        assert_eq!(record.name, None);
        assert_eq!(record.revision(), 1);
        assert_eq!(store.rooms(), vec![101]);
    }

    #[test]
    fn data_appends_and_sets_pressure() {
        let store = PatientStore::default();
        store
            .upsert(PatientUpsert::new(1, 101).with_data(result(8, "2024-11-23T12:00:00", b"a")))
            .unwrap();
        store
            .upsert(PatientUpsert::new(1, 101).with_data(result(11, "2024-11-23T12:10:00", b"b")))
            .unwrap();

        assert_eq!(store.cpap_pressure(101).unwrap(), pressure(11));
        let latest = store.latest_data(101).unwrap();
        assert_eq!(latest.timestamp, ts("2024-11-23T12:10:00"));
        assert_eq!(latest.decode_image().unwrap(), b"b");
        assert_eq!(store.timestamps(101).unwrap().len(), 2);
    }

    #[test]
    fn explicit_pressure_wins_over_data() {
        let store = PatientStore::default();
        store
            .upsert(
                PatientUpsert::new(1, 101)
                    .with_cpap_pressure(pressure(20))
                    .with_data(result(8, "2024-11-23T12:00:00", b"a")),
            )
            .unwrap();
        assert_eq!(store.cpap_pressure(101).unwrap(), pressure(20));
    }

    #[test]
    fn duplicate_timestamp_is_bumped() {
        let store = PatientStore::default();
        for _ in 0..3 {
            store
                .upsert(PatientUpsert::new(1, 101).with_data(result(8, "2024-11-23T12:00:00", b"a")))
                .unwrap();
        }
        let timestamps = store.timestamps(101).unwrap();
        assert_eq!(
            timestamps,
            vec![
                ts("2024-11-23T12:00:00"),
                ts("2024-11-23T12:00:01"),
                ts("2024-11-23T12:00:02"),
            ]
        );
        // identical images share one cache slot
        assert_eq!(store.image_count(), 1);
        assert!(store.image(101, ts("2024-11-23T12:00:02")).is_ok());
    }

    #[test]
    fn new_admission_discharges_occupant() {
        let store = PatientStore::default();
        store
            .upsert(PatientUpsert::new(1, 101).with_data(result(8, "2024-11-23T12:00:00", b"a")))
            .unwrap();
        store.upsert(PatientUpsert::new(2, 101).with_name("Bo")).unwrap();

        assert!(store.record(1).is_none());
        assert_eq!(store.patient_info(101).unwrap().mrn, 2);
        assert_eq!(store.image_count(), 0);
        assert!(matches!(store.latest_data(101), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn occupied_room_rejected_when_configured() {
        let store = PatientStore::new(StoreConfig::new().with_discharge_on_admit(false));
        store.upsert(PatientUpsert::new(1, 101)).unwrap();
        let err = store.upsert(PatientUpsert::new(2, 101)).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.patient_info(101).unwrap().mrn, 1);
    }

    #[test]
    fn pressure_update_bounds() {
        let store = PatientStore::default();
        store.upsert(PatientUpsert::new(1, 101)).unwrap();

        for bad in [3, 26] {
            assert!(matches!(
                store.update_cpap_pressure(101, bad),
                Err(StoreError::Validation(_))
            ));
        }
        assert_eq!(store.update_cpap_pressure(101, 4).unwrap(), pressure(4));
        assert_eq!(store.update_cpap_pressure(101, 25).unwrap(), pressure(25));
        assert_eq!(store.cpap_pressure(101).unwrap(), pressure(25));
        assert!(store.record(1).unwrap().data().is_empty());
    }

    #[test]
    fn missing_things_are_not_found() {
        let store = PatientStore::default();
        assert!(matches!(store.cpap_pressure(9), Err(StoreError::NotFound(_))));
        assert!(matches!(store.patient_info(9), Err(StoreError::NotFound(_))));
        assert!(matches!(store.update_cpap_pressure(9, 10), Err(StoreError::NotFound(_))));

        store.upsert(PatientUpsert::new(1, 9)).unwrap();
        assert!(matches!(store.cpap_pressure(9), Err(StoreError::NotFound(_))));
        assert!(matches!(store.timestamps(9), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.image(9, ts("2024-01-01T00:00:00")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_upsert_is_rejected() {
        let store = PatientStore::default();
        let err = store.upsert(PatientUpsert::new(1, 101).with_name("  ")).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.patient_count(), 0);
    }

    #[test]
    fn rooms_are_sorted() {
        let store = PatientStore::default();
        for (mrn, room) in [(1, 30), (2, 10), (3, 20)] {
            store.upsert(PatientUpsert::new(mrn, room)).unwrap();
        }
        assert_eq!(store.rooms(), vec![10, 20, 30]);
    }
}
