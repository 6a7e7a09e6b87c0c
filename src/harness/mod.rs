//! Mode-parameterized experiment harness
//!
//! Drives the compiler under test across benchmarks and optimization modes,
//! scrapes metrics from its output and keeps them in a resumable store.

pub mod discover;
pub mod extract;
pub mod field;
pub mod invoker;
pub mod mode;
pub mod problog;
pub mod runner;
pub mod store;

pub use discover::{benchmarks_in, Benchmark};
pub use field::Field;
pub use invoker::{Invoker, Outcome, ProcessInvoker};
pub use mode::Mode;
pub use runner::{ExperimentRunner, RunSummary, CNF_MODES};
pub use store::{Measurement, MetricValue, ResultDocument, ResultTable};
