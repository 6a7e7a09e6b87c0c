//! Reference-tool timing
//!
//! Runs a second inference tool once per benchmark purely to compare elapsed
//! time. Results live in their own flat document:
//! `file name -> seconds | null` (null on timeout or failure to start).

use super::discover::Benchmark;
use super::invoker::{Invoker, Outcome};
use crate::error::{HarnessError, Result};
use crate::signal::SignalHandler;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// `file name -> elapsed seconds`
pub type ReferenceTimes = BTreeMap<String, Option<f64>>;

pub struct ReferenceRunner<I> {
    invoker: I,
    tool: PathBuf,
    timeout: Option<Duration>,
    signals: SignalHandler,
}

impl<I: Invoker> ReferenceRunner<I> {
    pub fn new(invoker: I, tool: impl Into<PathBuf>, timeout: Option<Duration>, signals: SignalHandler) -> Self {
        Self {
            invoker,
            tool: tool.into(),
            timeout: timeout.filter(|t| !t.is_zero()),
            signals,
        }
    }

    /// Time each benchmark once; stops early when interrupted
    pub fn run(&mut self, benchmarks: &[Benchmark]) -> ReferenceTimes {
        let mut times = ReferenceTimes::new();
        for bench in benchmarks {
            if self.signals.should_shutdown() {
                warn!("interrupted");
                break;
            }
            info!(file = %bench.name, "measuring time elapsed");
            let args = vec![bench.path.to_string_lossy().into_owned()];
            let secs = match self.invoker.invoke(&self.tool, &args, &[], self.timeout) {
                Ok(Outcome::Completed { elapsed, .. }) => {
                    Some((elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0)
                }
                Ok(Outcome::TimedOut { .. }) => {
                    warn!(file = %bench.name, "timeout");
                    None
                }
                Err(e) => {
                    error!(file = %bench.name, code = e.error_code(), "{}", e);
                    None
                }
            };
            times.insert(bench.name.clone(), secs);
        }
        times
    }
}

pub fn save_times(path: &Path, times: &ReferenceTimes) -> Result<()> {
    let json = serde_json::to_string_pretty(times)?;
    fs::write(path, json + "\n").map_err(|e| HarnessError::store(path, e))
}
