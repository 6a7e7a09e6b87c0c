//! Experiment runner
//!
//! Walks benchmarks, field groups and modes strictly in sequence, decides
//! what still needs measuring, and writes outcomes back into the store.
//!
//! Skip rules:
//! - time is re-measured unless the stored value is a real measurement;
//! - the joint counting group is skipped for a mode as soon as *any* of the
//!   requested joint fields holds a real measurement. Siblings that are
//!   still unset stay unset; reports show them as "no data".
//!
//! Timeouts and spawn failures write nothing, so the next run retries them.
//! A completed counting invocation with none of the requested blocks marks
//! every requested joint field as failed.

use super::discover::Benchmark;
use super::extract::{self, as_count};
use super::field::{self, Field, CNF_DECISIONS};
use super::invoker::{Invoker, Outcome};
use super::mode::{self, Mode};
use super::store::{MetricValue, ResultDocument, ResultTable};
use crate::error::Result;
use crate::signal::SignalHandler;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// The only modes the CNF back end is compared under
pub const CNF_MODES: [Mode; 2] = [Mode::Det, Mode::Fh];

/// Counters for one harness run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub invocations: usize,
    pub skipped: usize,
    pub timeouts: usize,
    /// Completed invocations without the expected output
    pub failures: usize,
    /// Invocations that could not be started
    pub errors: usize,
    pub unknown_modes: usize,
    pub interrupted: bool,
}

pub struct ExperimentRunner<I> {
    invoker: I,
    compiler: PathBuf,
    timeout: Option<Duration>,
    signals: SignalHandler,
}

impl<I: Invoker> ExperimentRunner<I> {
    pub fn new(
        invoker: I,
        compiler: impl Into<PathBuf>,
        timeout: Option<Duration>,
        signals: SignalHandler,
    ) -> Self {
        Self {
            invoker,
            compiler: compiler.into(),
            timeout: timeout.filter(|t| !t.is_zero()),
            signals,
        }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Load the document at `store`, run, and save it again
    ///
    /// The save happens however the loop ends, including on interruption.
    pub fn run_to_store(
        &mut self,
        store: &Path,
        benchmarks: &[Benchmark],
        fields: &[Field],
        mode_ids: &[String],
    ) -> Result<RunSummary> {
        let mut document = ResultDocument::load(store)?;
        let summary = self.run(benchmarks, fields, mode_ids, &mut document);
        document.save(store)?;
        info!(path = %store.display(), "results saved");
        Ok(summary)
    }

    /// Measure `fields` under each requested mode for every benchmark
    ///
    /// Unknown mode identifiers are logged and skipped; nothing here aborts
    /// the batch.
    pub fn run(
        &mut self,
        benchmarks: &[Benchmark],
        fields: &[Field],
        mode_ids: &[String],
        document: &mut ResultDocument,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let known: Vec<Mode> = mode_ids
            .iter()
            .filter_map(|id| mode::lookup(id).ok())
            .collect();

        let timeout_secs = self.timeout.map(|t| t.as_secs());
        for mode in &known {
            document.record_timeout(*mode, timeout_secs);
        }

        let joint: Vec<Field> = fields.iter().copied().filter(|f| f.is_joint()).collect();

        for bench in benchmarks {
            if self.interrupted(&mut summary) {
                break;
            }
            info!(file = %bench.name, "benchmark");
            document.results.prepare(&bench.name, fields, &known);

            if fields.contains(&Field::Time) {
                info!("measuring time elapsed");
                self.measure_time(bench, mode_ids, &mut document.results, &mut summary);
            }
            if !joint.is_empty() {
                info!(fields = ?joint, "measuring counts");
                self.measure_joint(bench, &joint, mode_ids, &mut document.results, &mut summary);
            }
        }

        info!(?summary, "run finished");
        summary
    }

    /// Count CNF decisions under the two CNF modes
    ///
    /// Counts go into the size slot of `table`.
    pub fn run_cnf(&mut self, benchmarks: &[Benchmark], table: &mut ResultTable) -> RunSummary {
        let mut summary = RunSummary::default();
        let base: Vec<String> = field::cnf_flags().into_iter().map(String::from).collect();

        for bench in benchmarks {
            if self.interrupted(&mut summary) {
                break;
            }
            info!(file = %bench.name, "benchmark");
            table.prepare(&bench.name, &[Field::Size], &CNF_MODES);

            for mode in CNF_MODES {
                if self.interrupted(&mut summary) {
                    break;
                }
                if table.get(&bench.name, Field::Size, mode).is_valid() {
                    info!(%mode, "skip");
                    summary.skipped += 1;
                    continue;
                }
                info!(%mode, "mode");

                let Some(output) = self.completed_output(bench, &base, mode, &mut summary) else {
                    continue;
                };
                match extract::find(&output, CNF_DECISIONS) {
                    Some(decisions) => {
                        table.set(&bench.name, Field::Size, mode, MetricValue::count(as_count(decisions)));
                    }
                    None => {
                        summary.failures += 1;
                        table.set(&bench.name, Field::Size, mode, MetricValue::Failed);
                        error!(file = %bench.name, %mode, "no CNF decision count in output:\n{}", output);
                    }
                }
            }
        }

        info!(?summary, "CNF run finished");
        summary
    }

    fn measure_time(
        &mut self,
        bench: &Benchmark,
        mode_ids: &[String],
        table: &mut ResultTable,
        summary: &mut RunSummary,
    ) {
        let base = field::time_flags();

        for id in mode_ids {
            if self.interrupted(summary) {
                return;
            }
            let Some(mode) = resolve(id, summary) else {
                continue;
            };
            if table.get(&bench.name, Field::Time, mode).is_valid() {
                info!(%mode, "skip");
                summary.skipped += 1;
                continue;
            }
            info!(%mode, "mode");

            let args = fixed_args(bench, &base);
            summary.invocations += 1;
            match self.invoker.invoke(&self.compiler, &args, mode.flags(), self.timeout) {
                Ok(Outcome::Completed { elapsed, .. }) => {
                    let secs = round_secs(elapsed);
                    debug!(%mode, secs, "measured");
                    table.set(&bench.name, Field::Time, mode, MetricValue::seconds(secs));
                }
                Ok(Outcome::TimedOut { .. }) => {
                    summary.timeouts += 1;
                    warn!(file = %bench.name, %mode, "timeout");
                }
                Err(e) => {
                    summary.errors += 1;
                    error!(file = %bench.name, %mode, code = e.error_code(), "{}", e);
                }
            }
        }
    }

    fn measure_joint(
        &mut self,
        bench: &Benchmark,
        requested: &[Field],
        mode_ids: &[String],
        table: &mut ResultTable,
        summary: &mut RunSummary,
    ) {
        let base: Vec<String> = field::joint_flags(requested)
            .into_iter()
            .map(String::from)
            .collect();

        for id in mode_ids {
            if self.interrupted(summary) {
                return;
            }
            let Some(mode) = resolve(id, summary) else {
                continue;
            };
            // One valid sibling is enough to skip the whole group.
            if requested
                .iter()
                .any(|f| table.get(&bench.name, *f, mode).is_valid())
            {
                info!(%mode, "skip");
                summary.skipped += 1;
                continue;
            }
            info!(%mode, "mode");

            let Some(output) = self.completed_output(bench, &base, mode, summary) else {
                continue;
            };
            let found = extract::extract(&output);
            let hits: Vec<Field> = requested
                .iter()
                .copied()
                .filter(|f| found.contains_key(f))
                .collect();

            if hits.is_empty() {
                summary.failures += 1;
                for field in requested {
                    table.set(&bench.name, *field, mode, MetricValue::Failed);
                }
                error!(file = %bench.name, %mode, "no metrics in output:\n{}", output);
                continue;
            }
            for field in hits {
                let value = as_count(found[&field]);
                debug!(%mode, %field, value, "measured");
                table.set(&bench.name, field, mode, MetricValue::count(value));
            }
        }
    }

    /// Invoke and return the captured output if the process completed
    fn completed_output(
        &mut self,
        bench: &Benchmark,
        base: &[String],
        mode: Mode,
        summary: &mut RunSummary,
    ) -> Option<String> {
        let args = fixed_args(bench, base);
        summary.invocations += 1;
        match self.invoker.invoke(&self.compiler, &args, mode.flags(), self.timeout) {
            Ok(Outcome::Completed { output, .. }) => Some(output),
            Ok(Outcome::TimedOut { .. }) => {
                summary.timeouts += 1;
                warn!(file = %bench.name, %mode, "timeout");
                None
            }
            Err(e) => {
                summary.errors += 1;
                error!(file = %bench.name, %mode, code = e.error_code(), "{}", e);
                None
            }
        }
    }

    fn interrupted(&self, summary: &mut RunSummary) -> bool {
        if self.signals.should_shutdown() {
            summary.interrupted = true;
        }
        summary.interrupted
    }
}

fn resolve(id: &str, summary: &mut RunSummary) -> Option<Mode> {
    match mode::lookup(id) {
        Ok(mode) => Some(mode),
        Err(e) => {
            summary.unknown_modes += 1;
            warn!("{}", e);
            None
        }
    }
}

fn fixed_args<S: AsRef<str>>(bench: &Benchmark, base: &[S]) -> Vec<String> {
    std::iter::once(bench.path.to_string_lossy().into_owned())
        .chain(base.iter().map(|s| s.as_ref().to_string()))
        .collect()
}

/// Wall-clock seconds at 0.1ms resolution
fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 10_000.0).round() / 10_000.0
}
