//! Stress runs against the store.
//!
//! These verify behavior under concurrent uploads and reads through the
//! HTTP-shaped handler.

use sleeplab_protocol::{
    CalculatedData, CpapPressure, HttpHandler, HttpMethod, PatientUpsert, StoreRequest,
    Timestamp,
};
use sleeplab_store::StoreServer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Uploads per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of the fake image in bytes.
    pub image_size: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            image_size: 2048,
        }
    }
}

fn upload_body(mrn: u64, room: u32, seq: usize, image: &[u8]) -> Vec<u8> {
    let ts = Timestamp::parse("2024-11-23T20:00:00")
        .expect("valid timestamp")
        .plus_seconds(seq as i64)
        .expect("timestamp in range");
    let data = CalculatedData::new(
        CpapPressure::new(10).expect("in range"),
        14.0,
        (seq % 5) as u32,
        image,
        ts,
    );
    let request = StoreRequest::UpsertPatient(PatientUpsert::new(mrn, room).with_data(data));
    request.body().expect("encodable upsert")
}

/// Each thread uploads to its own patient. Every upload should succeed.
pub fn stress_concurrent_uploads(server: Arc<StoreServer>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let server = Arc::clone(&server);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();
            thread::spawn(move || {
                let image: Vec<u8> = (0..config.image_size).map(|i| (i + t) as u8).collect();
                for seq in 0..config.operations {
                    let body = upload_body(t as u64 + 1, t as u32 + 100, seq, &image);
                    let response = server.handle(HttpMethod::Post, "/upload_patient", &body);
                    if response.is_success() {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("upload thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// One writer thread uploads while the others poll the room the way a
/// monitoring station does. Reads of an empty room count as successful.
pub fn stress_polling_readers(server: Arc<StoreServer>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let writer = {
        let server = Arc::clone(&server);
        let config = config.clone();
        thread::spawn(move || {
            let image = vec![0xAB; config.image_size];
            let mut ok = 0usize;
            for seq in 0..config.operations {
                let body = upload_body(1, 1, seq, &image);
                if server.handle(HttpMethod::Post, "/upload_patient", &body).is_success() {
                    ok += 1;
                }
            }
            ok
        })
    };

    let readers: Vec<_> = (1..config.threads.max(2))
        .map(|_| {
            let server = Arc::clone(&server);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations;
            thread::spawn(move || {
                for _ in 0..operations {
                    for path in ["/rooms", "/room/1/patient_data", "/room/1/timestamps"] {
                        let response = server.handle(HttpMethod::Get, path, &[]);
                        if response.is_success() || response.status == 404 {
                            successful.fetch_add(1, Ordering::Relaxed);
                        } else {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    let written = writer.join().expect("writer thread panicked");
    for reader in readers {
        reader.join().expect("reader thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed) + written,
        failed.load(Ordering::Relaxed) + (config.operations - written),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleeplab_store::StoreConfig;

    fn small() -> StressConfig {
        StressConfig {
            operations: 20,
            threads: 3,
            image_size: 64,
        }
    }

    #[test]
    fn concurrent_uploads_all_succeed() {
        let server = Arc::new(StoreServer::new(StoreConfig::default()));
        let result = stress_concurrent_uploads(Arc::clone(&server), &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 60);
        assert_eq!(server.store().patient_count(), 3);
        assert_eq!(server.store().timestamps(100).unwrap().len(), 20);
    }

    #[test]
    fn readers_never_see_errors() {
        let server = Arc::new(StoreServer::new(StoreConfig::default()));
        let result = stress_polling_readers(Arc::clone(&server), &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(server.store().timestamps(1).unwrap().len(), 20);
    }
}
