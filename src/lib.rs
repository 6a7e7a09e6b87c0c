//! modebench - benchmark harness for comparing compiler optimization modes
//!
//! Runs an external probabilistic-program compiler over a directory of
//! benchmarks under a fixed set of flag combinations, scrapes the metrics it
//! prints, and accumulates them in a JSON document that survives restarts.

pub mod config;
pub mod error;
pub mod harness;
pub mod report;
pub mod signal;

pub use error::{HarnessError, Result};
