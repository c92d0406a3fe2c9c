//! # SleepLab Testkit
//!
//! Test utilities for SleepLab.
//!
//! This crate provides:
//! - Synthetic flow recordings and temporary flow files
//! - Property-based test generators using proptest
//! - An in-process lab (store plus stations) for cross-crate tests
//! - Concurrent upload stress runs against the store
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sleeplab_testkit::prelude::*;
//!
//! #[test]
//! fn analysis_flows_to_monitor() {
//!     let lab = TestLab::new();
//!     let recording = FlowBuilder::new(0.1).breathe(30.0, 15.0).pause(12.0).build();
//!     lab.upload_recording(&recording, 1001, 12).unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use stress::*;
