//! # SleepLab Store
//!
//! Central patient document store for the sleep lab.
//!
//! This crate provides:
//! - The `PatientRecord` aggregate with write-once identity fields
//! - Atomic create-or-merge upserts
//! - Room queries (pressure, patient info, latest result, history, images)
//! - A content-addressed image cache keyed by SHA-256
//! - An `HttpHandler` implementation that speaks the store's route table
//!
//! # Consistency
//!
//! The store is the only serialization point in the system. Every operation
//! runs under a single lock, so an upsert is applied entirely or not at all.
//! Clients never lock the store; they poll it.
//!
//! ```rust,ignore
//! use sleeplab_store::{StoreConfig, StoreServer};
//! use sleeplab_protocol::{HttpHandler, HttpMethod};
//!
//! let server = StoreServer::new(StoreConfig::default());
//! let response = server.handle(HttpMethod::Get, "/rooms", b"");
//! assert_eq!(response.status, 200);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod record;
mod server;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use handler::{HandlerContext, RequestHandler};
pub use record::{DataEntry, ImageDigest, PatientRecord};
pub use server::StoreServer;
pub use store::PatientStore;
