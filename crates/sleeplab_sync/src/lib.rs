//! # SleepLab Sync
//!
//! Polling sync coordinator for the patient and monitoring stations.
//!
//! This crate provides:
//! - Patient station state machine (idle → pending push → synced)
//! - Monitoring station state machine (idle → pending pull → displayed)
//! - Per-room local caches refreshed only by polls or explicit pulls
//! - Store transport abstraction (mock, HTTP client, in-process loopback)
//! - A cooperative poll scheduler feeding a single request dispatcher
//!
//! ## Architecture
//!
//! There is no push channel from the store. Each station re-pulls its
//! room on a fixed interval (30 s by default) and reconciles by last
//! writer wins:
//!
//! ```text
//! Scheduler --Poll--> [cap 1] --\
//!                                 Dispatcher --> Station --> StoreTransport --> store
//! caller ----Push---> [queue] --/     (one request at a time)
//! ```
//!
//! ## Key Invariants
//!
//! - Polls never overlap each other or a push
//! - A tick is skipped while the previous poll is still queued
//! - Poll failures are logged and dropped; the next tick tries again
//! - Push failures are returned to the caller and never retried automatically
//! - `mrn` and `room` are write-once for a patient

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod http;
mod monitor;
mod patient;
mod scheduler;
mod state;
mod transport;

pub use cache::{PatientView, RoomView};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient};
pub use monitor::MonitorStation;
pub use patient::PatientStation;
pub use scheduler::{DispatchStats, Dispatcher, Scheduler, Station, SyncHandle, SyncRequest, SyncService};
pub use state::{MonitorState, PatientState};
pub use transport::{MockTransport, StoreTransport};
