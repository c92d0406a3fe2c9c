//! Benchmarks for SleepLab.

#![warn(missing_docs)]

pub mod utils;
