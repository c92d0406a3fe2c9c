//! Simulate command implementation.
//!
//! Runs an in-process store with a patient station and a monitoring
//! station, both driven by their own scheduler, and reports what each
//! station ends up showing.

use super::analyze::AnalysisArgs;
use sleeplab_analysis::Analyzer;
use sleeplab_protocol::{CpapPressure, PatientUpsert, Timestamp};
use sleeplab_store::{StoreConfig, StoreServer};
use sleeplab_sync::{
    DispatchStats, HttpTransport, LoopbackClient, MonitorStation, PatientStation, PatientView,
    RoomView, SyncConfig, SyncService,
};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

type LoopbackTransport = HttpTransport<LoopbackClient<Arc<StoreServer>>>;

/// Arguments of one simulation.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Flow file.
    pub file: PathBuf,
    /// Analysis thresholds.
    pub analysis: AnalysisArgs,
    /// Medical record number.
    pub mrn: u64,
    /// Room number.
    pub room: u32,
    /// Patient name.
    pub name: Option<String>,
    /// Pressure during the recording.
    pub cpap: i64,
    /// Pressure set by the monitoring station afterwards.
    pub set_pressure: Option<i64>,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Poll intervals to wait before reporting.
    pub polls: u32,
}

/// What both stations show when the simulation ends.
#[derive(Debug)]
pub struct SimulationOutcome {
    /// Patient station cache.
    pub patient: Option<PatientView>,
    /// Monitoring station cache.
    pub room: Option<RoomView>,
    /// Occupied rooms seen by the monitoring station.
    pub rooms: Vec<u32>,
    /// Patient dispatcher counters.
    pub patient_stats: DispatchStats,
    /// Monitor dispatcher counters.
    pub monitor_stats: DispatchStats,
}

impl fmt::Display for SimulationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Patient station")?;
        match &self.patient {
            Some(view) => {
                writeln!(f, "  mrn:        {}", view.mrn)?;
                writeln!(f, "  room:       {}", view.room)?;
                writeln!(f, "  name:       {}", view.name.as_deref().unwrap_or("-"))?;
                writeln!(f, "  pressure:   {}", display(view.cpap_pressure))?;
                writeln!(f, "  revision:   {}", view.revision)?;
            }
            None => writeln!(f, "  (nothing uploaded)")?,
        }

        writeln!(f, "Monitoring station")?;
        writeln!(f, "  rooms:      {:?}", self.rooms)?;
        match &self.room {
            Some(view) => {
                let patient = view
                    .patient
                    .as_ref()
                    .map(|p| format!("{} ({})", p.name.as_deref().unwrap_or("-"), p.mrn))
                    .unwrap_or_else(|| "-".into());
                writeln!(f, "  room:       {}", view.room)?;
                writeln!(f, "  patient:    {}", patient)?;
                writeln!(f, "  pressure:   {}", display(view.cpap_pressure))?;
                if let Some(latest) = &view.latest {
                    writeln!(f, "  latest:     {}", latest.timestamp)?;
                    writeln!(f, "  rate:       {:.1} breaths/min", latest.breathing_rate)?;
                    let flag = if latest.needs_attention() { "  (!)" } else { "" };
                    writeln!(f, "  apneas:     {}{}", latest.apnea_count, flag)?;
                }
                writeln!(f, "  results:    {}", view.timestamps.len())?;
            }
            None => writeln!(f, "  (no room displayed)")?,
        }

        writeln!(
            f,
            "Polls:        patient {} ok / {} failed, monitor {} ok / {} failed",
            self.patient_stats.polls_completed,
            self.patient_stats.polls_failed,
            self.monitor_stats.polls_completed,
            self.monitor_stats.polls_failed
        )
    }
}

fn display(pressure: Option<CpapPressure>) -> String {
    pressure.map_or_else(|| "-".into(), |p| p.to_string())
}

/// Runs the simulation to completion.
pub fn run(options: &SimulateOptions) -> Result<SimulationOutcome, Box<dyn std::error::Error>> {
    let analyzer = Analyzer::new(options.analysis.to_config()?)?;
    let report = analyzer.analyze_file(&options.file)?;
    let pressure = CpapPressure::new(options.cpap)?;

    let mut upsert = PatientUpsert::new(options.mrn, options.room)
        .with_data(report.to_calculated(pressure, Timestamp::now()));
    if let Some(name) = &options.name {
        upsert = upsert.with_name(name.clone());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    runtime.block_on(simulate(options, upsert))
}

async fn simulate(
    options: &SimulateOptions,
    upsert: PatientUpsert,
) -> Result<SimulationOutcome, Box<dyn std::error::Error>> {
    let server = Arc::new(StoreServer::new(StoreConfig::default()));
    let config = SyncConfig::default()
        .with_poll_interval(Duration::from_millis(options.poll_interval_ms.max(1)));
    let link = || -> Arc<LoopbackTransport> {
        Arc::new(HttpTransport::new(
            config.server_url.clone(),
            LoopbackClient::new(Arc::clone(&server)),
        ))
    };

    let patient = Arc::new(PatientStation::new(config.clone(), link()));
    let monitor = Arc::new(MonitorStation::new(config.clone(), link()));
    monitor.select_room(options.room);

    let patient_service = SyncService::spawn(Arc::clone(&patient), config.poll_interval);
    let monitor_service = SyncService::spawn(Arc::clone(&monitor), config.poll_interval);

    let ack = patient_service.push(upsert).await?;
    info!(revision = ack.revision, "recording uploaded");

    if let Some(value) = options.set_pressure {
        let set = monitor_service.push(value).await?;
        info!(cpap_pressure = %set, "monitor changed pressure");
    }

    tokio::time::sleep(config.poll_interval * options.polls.max(1)).await;

    let patient_stats = patient_service.shutdown().await;
    let monitor_stats = monitor_service.shutdown().await;

    Ok(SimulationOutcome {
        patient: patient.view(),
        room: monitor.view(),
        rooms: monitor.rooms(),
        patient_stats,
        monitor_stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn recording(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("flow.txt");
        let mut text = String::new();
        for i in 0..600 {
            let v = (2.0 * std::f64::consts::PI * 0.25 * i as f64 * 0.1).sin();
            text.push_str(&format!("{:.5}\n", v));
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn options(file: PathBuf) -> SimulateOptions {
        SimulateOptions {
            file,
            analysis: AnalysisArgs {
                sample_interval_ms: Some(100.0),
                apnea_amplitude: Some(0.2),
                ..AnalysisArgs::default()
            },
            mrn: 1001,
            room: 12,
            name: Some("Ada".into()),
            cpap: 10,
            set_pressure: Some(14),
            poll_interval_ms: 10,
            polls: 4,
        }
    }

    #[test]
    fn stations_converge() {
        let dir = TempDir::new().unwrap();
        let outcome = run(&options(recording(&dir))).unwrap();

        let patient = outcome.patient.as_ref().unwrap();
        assert_eq!(patient.cpap_pressure.map(|p| p.value()), Some(14));
        let room = outcome.room.as_ref().unwrap();
        assert_eq!(room.patient.as_ref().unwrap().mrn, 1001);
        assert_eq!(room.timestamps.len(), 1);
        assert_eq!(outcome.rooms, vec![12]);
        assert_eq!(outcome.patient_stats.pushes_completed, 1);

        let text = outcome.to_string();
        assert!(text.contains("Ada (1001)"));
        assert!(text.contains("14 cmH2O"));
    }

    #[test]
    fn out_of_range_pressure_rejected_before_upload() {
        let dir = TempDir::new().unwrap();
        let mut options = options(recording(&dir));
        options.cpap = 30;
        assert!(run(&options).is_err());
    }
}
