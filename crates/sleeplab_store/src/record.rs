//! Patient record aggregate.

use sleeplab_protocol::{CpapPressure, PatientInfo, ProtocolResult, Timestamp};
use std::fmt;

/// SHA-256 of an encoded flow image.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageDigest(pub [u8; 32]);

impl fmt::Debug for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..6] {
            write!(f, "{:02x}", byte)?;
        }
        f.write_str("..")
    }
}

/// One stored analysis result. The image lives in the store's image cache.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEntry {
    /// Pressure setting during the recording.
    pub cpap_pressure: CpapPressure,
    /// Breaths per minute.
    pub breathing_rate: f64,
    /// Number of apnea events.
    pub apnea_count: u32,
    /// Key of the image in the cache.
    pub image: ImageDigest,
    /// Unique, strictly ascending within a record.
    pub timestamp: Timestamp,
}

/// Everything the store knows about one patient.
///
/// `mrn` and `room` never change after creation and `data` only grows.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    mrn: u64,
    room: u32,
    /// Patient name.
    pub name: Option<String>,
    /// Current pressure setting.
    pub cpap_pressure: Option<CpapPressure>,
    data: Vec<DataEntry>,
    revision: u64,
}

impl PatientRecord {
    /// Creates an empty record.
    pub fn new(mrn: u64, room: u32) -> Self {
        Self {
            mrn,
            room,
            name: None,
            cpap_pressure: None,
            data: Vec::new(),
            revision: 0,
        }
    }

    /// Medical record number.
    pub fn mrn(&self) -> u64 {
        self.mrn
    }

    /// Room number.
    pub fn room(&self) -> u32 {
        self.room
    }

    /// Number of writes applied to this record.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Stored results, oldest first.
    pub fn data(&self) -> &[DataEntry] {
        &self.data
    }

    /// Most recent result.
    pub fn latest(&self) -> Option<&DataEntry> {
        self.data.last()
    }

    /// Timestamps of every result, ascending.
    pub fn timestamps(&self) -> Vec<Timestamp> {
        self.data.iter().map(|d| d.timestamp).collect()
    }

    /// Result recorded at exactly `timestamp`.
    pub fn entry_at(&self, timestamp: Timestamp) -> Option<&DataEntry> {
        self.data
            .binary_search_by(|d| d.timestamp.cmp(&timestamp))
            .ok()
            .map(|i| &self.data[i])
    }

    /// Timestamp to store a result under: the requested one, or one second
    /// after the latest entry if the request would not sort last.
    ///
    /// Fails when the latest entry is already at the last representable
    /// second.
    pub fn next_timestamp(&self, requested: Timestamp) -> ProtocolResult<Timestamp> {
        match self.data.last() {
            Some(last) if requested <= last.timestamp => last.timestamp.plus_seconds(1),
            _ => Ok(requested),
        }
    }

    /// Appends a result. Its timestamp must sort after every stored one.
    pub(crate) fn push_entry(&mut self, entry: DataEntry) {
        debug_assert!(self.latest().map_or(true, |l| l.timestamp < entry.timestamp));
        self.data.push(entry);
    }

    /// Identity as returned to clients.
    pub fn info(&self) -> PatientInfo {
        PatientInfo {
            name: self.name.clone(),
            mrn: self.mrn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> Timestamp {
        Timestamp::parse(text).unwrap()
    }

    fn entry(at: &str) -> DataEntry {
        DataEntry {
            cpap_pressure: CpapPressure::new(10).unwrap(),
            breathing_rate: 14.0,
            apnea_count: 0,
            image: ImageDigest([7; 32]),
            timestamp: ts(at),
        }
    }

    #[test]
    fn new_record() {
        let record = PatientRecord::new(42, 101);
        assert_eq!(record.mrn(), 42);
        assert_eq!(record.room(), 101);
        assert_eq!(record.revision(), 0);
        assert!(record.latest().is_none());
        assert_eq!(record.info().name, None);
    }

    #[test]
    fn timestamp_bump() {
        let mut record = PatientRecord::new(1, 1);
        let t0 = ts("2024-11-23T12:00:00");
        assert_eq!(record.next_timestamp(t0).unwrap(), t0);

        record.push_entry(entry("2024-11-23T12:00:00"));
        assert_eq!(record.next_timestamp(t0).unwrap(), ts("2024-11-23T12:00:01"));
        assert_eq!(
            record.next_timestamp(ts("2024-11-23T11:00:00")).unwrap(),
            ts("2024-11-23T12:00:01")
        );
        assert_eq!(
            record.next_timestamp(ts("2024-11-23T12:05:00")).unwrap(),
            ts("2024-11-23T12:05:00")
        );
    }

    #[test]
    fn no_bump_past_last_second() {
        let mut record = PatientRecord::new(1, 1);
        let last = ts("9999-12-31T23:59:59");
        record.push_entry(entry("9999-12-31T23:59:59"));
        assert!(record.next_timestamp(last).is_err());
    }

    #[test]
    fn lookup_by_timestamp() {
        let mut record = PatientRecord::new(1, 1);
        record.push_entry(entry("2024-11-23T12:00:00"));
        record.push_entry(entry("2024-11-23T12:10:00"));

        assert!(record.entry_at(ts("2024-11-23T12:10:00")).is_some());
        assert!(record.entry_at(ts("2024-11-23T12:05:00")).is_none());
        assert_eq!(record.timestamps().len(), 2);
        assert_eq!(record.latest().unwrap().timestamp, ts("2024-11-23T12:10:00"));
    }

    #[test]
    fn digest_debug_is_short() {
        assert_eq!(format!("{:?}", ImageDigest([0xab; 32])), "abababababab..");
    }
}
