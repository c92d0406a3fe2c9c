//! Integration tests: stations talking to an in-process store over the
//! loopback HTTP client.

use sleeplab_protocol::{CalculatedData, CpapPressure, PatientUpsert, Timestamp};
use sleeplab_store::{StoreConfig, StoreServer};
use sleeplab_sync::{
    HttpTransport, LoopbackClient, MonitorStation, MonitorState, PatientState, PatientStation,
    SyncConfig, SyncError, SyncService,
};
use std::sync::Arc;
use std::time::Duration;

type Transport = HttpTransport<LoopbackClient<Arc<StoreServer>>>;

struct Lab {
    server: Arc<StoreServer>,
    patient: Arc<PatientStation<Transport>>,
    patient_link: Arc<Transport>,
    monitor: Arc<MonitorStation<Transport>>,
}

fn lab() -> Lab {
    let server = Arc::new(StoreServer::new(StoreConfig::default()));
    let config = SyncConfig::default();
    let link = || {
        Arc::new(HttpTransport::new(
            config.server_url.clone(),
            LoopbackClient::new(Arc::clone(&server)),
        ))
    };
    let patient_link = link();
    Lab {
        patient: Arc::new(PatientStation::new(config.clone(), Arc::clone(&patient_link))),
        monitor: Arc::new(MonitorStation::new(config.clone(), link())),
        patient_link,
        server,
    }
}

fn pressure(value: i64) -> CpapPressure {
    CpapPressure::new(value).unwrap()
}

fn result(at: &str, apneas: u32) -> CalculatedData {
    CalculatedData::new(
        pressure(10),
        14.5,
        apneas,
        format!("png-{}", at).as_bytes(),
        Timestamp::parse(at).unwrap(),
    )
}

#[test]
fn upload_then_monitor_sees_room() {
    let lab = lab();
    lab.patient
        .upload(
            PatientUpsert::new(1001, 12)
                .with_name("Ada Lovelace")
                .with_data(result("2024-11-23T22:00:00", 3)),
        )
        .unwrap();

    lab.monitor.select_room(12);
    lab.monitor.poll().unwrap();

    assert_eq!(lab.monitor.rooms(), vec![12]);
    assert_eq!(lab.monitor.state(), MonitorState::Displayed);
    let view = lab.monitor.view().unwrap();
    let info = view.patient.clone().unwrap();
    assert_eq!(info.mrn, 1001);
    assert_eq!(info.name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(view.cpap_pressure, Some(pressure(10)));
    assert!(view.needs_attention());

    let ts = Timestamp::parse("2024-11-23T22:00:00").unwrap();
    assert_eq!(lab.monitor.image_at(ts).unwrap(), b"png-2024-11-23T22:00:00");
}

#[test]
fn monitor_pressure_reaches_patient_on_poll() {
    let lab = lab();
    lab.patient
        .upload(PatientUpsert::new(1001, 12).with_cpap_pressure(pressure(8)))
        .unwrap();
    lab.monitor.select_room(12);

    for rejected in [3, 26] {
        assert!(matches!(
            lab.monitor.set_cpap_pressure(rejected),
            Err(SyncError::Validation(_))
        ));
    }
    for accepted in [4, 25] {
        assert_eq!(lab.monitor.set_cpap_pressure(accepted).unwrap().value() as i64, accepted);
    }

    assert_eq!(lab.patient.view().unwrap().cpap_pressure, Some(pressure(8)));
    assert_eq!(lab.patient.poll().unwrap(), Some(pressure(25)));
    assert_eq!(lab.patient.view().unwrap().cpap_pressure, Some(pressure(25)));
}

#[test]
fn store_rejects_room_change_from_fresh_station() {
    let lab = lab();
    lab.patient.upload(PatientUpsert::new(1001, 12)).unwrap();

    // A second station has no cached identity, so only the store can refuse.
    let other = PatientStation::new(SyncConfig::default(), Arc::clone(&lab.patient_link));
    let err = other.upload(PatientUpsert::new(1001, 14)).unwrap_err();
    assert!(matches!(err, SyncError::ImmutableField(_)));
    assert_eq!(other.state(), PatientState::Idle);
    assert!(other.failed_upload().is_some());
    assert_eq!(lab.server.store().rooms(), vec![12]);
}

#[test]
fn offline_upload_kept_for_manual_retry() {
    let lab = lab();
    lab.patient_link.client().set_online(false);

    let err = lab
        .patient
        .upload(PatientUpsert::new(1001, 12).with_data(result("2024-11-23T22:00:00", 0)))
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(lab.patient.state(), PatientState::Idle);
    assert_eq!(lab.server.store().patient_count(), 0);

    lab.patient_link.client().set_online(true);
    let ack = lab.patient.retry().unwrap();
    assert!(ack.created);
    assert_eq!(lab.patient.state(), PatientState::Synced);
    assert_eq!(lab.server.store().timestamps(12).unwrap().len(), 1);
}

#[test]
fn repeated_uploads_append_results() {
    let lab = lab();
    for (i, at) in ["2024-11-23T22:00:00", "2024-11-23T22:10:00", "2024-11-23T22:10:00"]
        .iter()
        .enumerate()
    {
        let ack = lab
            .patient
            .upload(PatientUpsert::new(1001, 12).with_data(result(at, i as u32)))
            .unwrap();
        assert_eq!(ack.created, i == 0);
    }

    lab.monitor.select_room(12);
    lab.monitor.poll().unwrap();
    let view = lab.monitor.view().unwrap();
    assert_eq!(view.timestamps.len(), 3);
    assert_eq!(
        view.timestamps[2],
        Timestamp::parse("2024-11-23T22:10:01").unwrap()
    );
    assert_eq!(view.latest.unwrap().apnea_count, 2);
}

#[tokio::test]
async fn services_poll_and_push_through_dispatcher() {
    let lab = lab();
    let patient = SyncService::spawn(Arc::clone(&lab.patient), Duration::from_millis(10));
    lab.monitor.select_room(12);
    let monitor = SyncService::spawn(Arc::clone(&lab.monitor), Duration::from_millis(10));

    patient
        .push(PatientUpsert::new(1001, 12).with_data(result("2024-11-23T22:00:00", 1)))
        .await
        .unwrap();
    let set = monitor.push(16).await.unwrap();
    assert_eq!(set, pressure(16));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(lab.patient.view().unwrap().cpap_pressure, Some(pressure(16)));
    let view = lab.monitor.view().unwrap();
    assert_eq!(view.patient.unwrap().mrn, 1001);

    let patient_stats = patient.shutdown().await;
    let monitor_stats = monitor.shutdown().await;
    assert_eq!(patient_stats.pushes_completed, 1);
    assert_eq!(monitor_stats.pushes_completed, 1);
    assert!(monitor_stats.polls_completed >= 1);
}

#[tokio::test]
async fn network_loss_during_polls_is_survived() {
    let lab = lab();
    lab.patient.upload(PatientUpsert::new(1001, 12)).unwrap();
    let service = SyncService::spawn(Arc::clone(&lab.patient), Duration::from_millis(10));

    lab.patient_link.client().set_online(false);
    tokio::time::sleep(Duration::from_millis(35)).await;
    lab.patient_link.client().set_online(true);
    lab.server.store().update_cpap_pressure(12, 20).unwrap();
    tokio::time::sleep(Duration::from_millis(35)).await;

    let stats = service.shutdown().await;
    assert!(stats.polls_failed >= 1, "{:?}", stats);
    assert!(stats.polls_completed >= 1, "{:?}", stats);
    assert_eq!(lab.patient.view().unwrap().cpap_pressure, Some(pressure(20)));
}
