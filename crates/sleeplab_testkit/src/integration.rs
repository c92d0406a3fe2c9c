//! Cross-crate integration helpers.
//!
//! A [`TestLab`] wires an in-process store to a patient station and a
//! monitoring station through the loopback HTTP client.

use sleeplab_analysis::{AnalysisConfig, AnalysisReport, Analyzer, ApneaPolicy, FlowSeries, RenderConfig};
use sleeplab_protocol::{CpapPressure, PatientUpsert, Timestamp, UpsertAck};
use sleeplab_store::{PatientStore, StoreConfig, StoreServer};
use sleeplab_sync::{
    HttpTransport, LoopbackClient, MonitorStation, PatientStation, SyncConfig, SyncResult,
};
use std::sync::Arc;

/// Transport used by lab stations.
pub type LabTransport = HttpTransport<LoopbackClient<Arc<StoreServer>>>;

/// A store with one patient station and one monitoring station.
pub struct TestLab {
    /// The in-process store.
    pub server: Arc<StoreServer>,
    /// Bedside station.
    pub patient: Arc<PatientStation<LabTransport>>,
    /// Nurse station.
    pub monitor: Arc<MonitorStation<LabTransport>>,
    analyzer: Analyzer,
}

impl TestLab {
    /// Creates a lab with default configuration and the default analyzer.
    pub fn new() -> Self {
        Self::with_store_config(StoreConfig::default())
    }

    /// Creates a lab whose store uses `config`.
    pub fn with_store_config(config: StoreConfig) -> Self {
        let server = Arc::new(StoreServer::new(config));
        let sync = SyncConfig::default();
        let transport = || {
            Arc::new(HttpTransport::new(
                sync.server_url.clone(),
                LoopbackClient::new(Arc::clone(&server)),
            ))
        };
        let patient = Arc::new(PatientStation::new(sync.clone(), transport()));
        let monitor = Arc::new(MonitorStation::new(sync.clone(), transport()));
        Self {
            server,
            patient,
            monitor,
            analyzer: default_analyzer(),
        }
    }

    /// Replaces the analyzer used by [`TestLab::upload_recording`].
    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// The shared store behind the server.
    pub fn store(&self) -> &Arc<PatientStore> {
        self.server.store()
    }

    /// Analyzes `values` and uploads the result for `mrn` in `room`.
    pub fn upload_recording(
        &self,
        values: &[f64],
        mrn: u64,
        room: u32,
    ) -> SyncResult<(AnalysisReport, UpsertAck)> {
        let interval = self.analyzer.config().sample_interval_secs;
        let series = FlowSeries::from_values(values, interval).expect("non-empty recording");
        let report = self.analyzer.analyze_series(series).expect("analysis succeeds");
        let pressure = CpapPressure::new(10).expect("in range");
        let data = report.to_calculated(pressure, Timestamp::now());
        let ack = self
            .patient
            .upload(PatientUpsert::new(mrn, room).with_data(data))?;
        Ok((report, ack))
    }
}

impl Default for TestLab {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyzer sampling every 0.1 s with a 0.2 amplitude threshold and a
/// small image.
pub fn default_analyzer() -> Analyzer {
    Analyzer::new(
        AnalysisConfig::new(0.1, ApneaPolicy::new(0.2)).with_render(RenderConfig::new(200, 100)),
    )
    .expect("valid analyzer config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FlowBuilder;

    #[test]
    fn lab_round_trip() {
        let lab = TestLab::new();
        let values = FlowBuilder::new(0.1).breathe(30.0, 12.0).build();
        let (report, ack) = lab.upload_recording(&values, 5, 3).unwrap();
        assert!(ack.created);
        assert_eq!(report.metrics.apnea_count, 0);
        assert_eq!(lab.store().rooms(), vec![3]);
    }
}
