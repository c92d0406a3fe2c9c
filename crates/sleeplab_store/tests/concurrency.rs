//! Concurrent access to a shared store.

use sleeplab_protocol::{CalculatedData, CpapPressure, PatientUpsert, Timestamp};
use sleeplab_store::{PatientStore, StoreError};
use std::sync::Arc;
use std::thread;

fn result(minute: u32) -> CalculatedData {
    CalculatedData::new(
        CpapPressure::new(10).unwrap(),
        14.0,
        0,
        format!("image-{}", minute).as_bytes(),
        Timestamp::parse(&format!("2024-11-23T22:{:02}:00", minute)).unwrap(),
    )
}

#[test]
fn concurrent_appends_keep_every_entry() {
    let store = Arc::new(PatientStore::default());
    store.upsert(PatientUpsert::new(1, 101)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..5 {
                    store
                        .upsert(PatientUpsert::new(1, 101).with_data(result(t * 5 + i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let record = store.record(1).unwrap();
    assert_eq!(record.data().len(), 40);
    assert_eq!(record.revision(), 41);

    let timestamps = store.timestamps(101).unwrap();
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(store.image_count(), 40);
}

#[test]
fn concurrent_identity_conflicts_leave_one_record() {
    let store = Arc::new(PatientStore::default());

    let handles: Vec<_> = (0..4u32)
        .map(|room| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.upsert(PatientUpsert::new(9, 200 + room)))
        })
        .collect();
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = outcomes.iter().filter(|o| matches!(o, Ok(ack) if ack.created)).count();
    let conflicts = outcomes
        .iter()
        .filter(|o| matches!(o, Err(StoreError::ImmutableField { .. })))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);
    assert_eq!(store.patient_count(), 1);
    assert_eq!(store.rooms().len(), 1);
}
