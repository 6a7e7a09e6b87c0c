#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use modebench::config::{
    HarnessConfig, DEFAULT_CNF_OUTPUT, DEFAULT_COMPILER, DEFAULT_OUTPUT, DEFAULT_REFERENCE_OUTPUT,
};
use modebench::harness::problog::{self, ReferenceRunner};
use modebench::harness::{
    benchmarks_in, mode, ExperimentRunner, Field, Mode, ProcessInvoker, ResultDocument,
    ResultTable, RunSummary,
};
use modebench::report::{chart, latex};
use modebench::signal::SignalHandler;
use modebench::HarnessError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "modebench")]
#[command(about = "Benchmark a compiler across optimization modes")]
#[command(version)]
struct Cli {
    /// rc file to read instead of ./.modebenchrc or ~/.modebenchrc
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Measure the selected fields under the selected modes
    Run(RunArgs),
    /// Count CNF decisions under the det and fh modes
    Cnf(CnfArgs),
    /// Time the reference inference tool on each benchmark
    Problog(ProblogArgs),
    /// Print LaTeX tables from a result document
    Table(ReportArgs),
    /// Write SVG charts from a result document
    Plot(PlotArgs),
}

#[derive(Args)]
struct InputArgs {
    /// Directory containing the benchmarks
    #[arg(short, long)]
    input: PathBuf,

    /// Result document to update
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-invocation timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Compiler binary under test
    #[arg(short = 'd', long)]
    compiler: Option<PathBuf>,

    /// Measure wall-clock time
    #[arg(short = 't', long)]
    time: bool,

    /// Measure compiled BDD size
    #[arg(short = 's', long)]
    size: bool,

    /// Measure recursive calls
    #[arg(short = 'c', long)]
    calls: bool,

    /// Measure flips
    #[arg(short = 'f', long)]
    flips: bool,

    /// Measure parameter count
    #[arg(short = 'p', long)]
    params: bool,

    /// Measure distinct parameter count
    #[arg(long)]
    distinct: bool,

    /// Mode identifiers to run
    #[arg(long, num_args = 1..)]
    modes: Vec<String>,
}

impl RunArgs {
    fn fields(&self) -> Vec<Field> {
        [
            (self.time, Field::Time),
            (self.size, Field::Size),
            (self.calls, Field::Calls),
            (self.flips, Field::Flips),
            (self.params, Field::Params),
            (self.distinct, Field::Distinct),
        ]
        .into_iter()
        .filter_map(|(on, field)| on.then_some(field))
        .collect()
    }
}

#[derive(Args)]
struct CnfArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Compiler binary under test
    #[arg(short = 'd', long)]
    compiler: Option<PathBuf>,
}

#[derive(Args)]
struct ProblogArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Reference tool binary
    #[arg(long, default_value = "problog")]
    tool: PathBuf,
}

#[derive(Args)]
struct ReportArgs {
    /// Result document to read
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Modes to show as columns (default: all)
    #[arg(long, num_args = 1..)]
    columns: Vec<String>,
}

#[derive(Args)]
struct PlotArgs {
    #[command(flatten)]
    report: ReportArgs,

    /// Directory for the SVG files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match dispatch(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<HarnessError>()
                .map_or(1, HarnessError::exit_code);
            process::exit(code);
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn dispatch(cli: Cli) -> Result<i32> {
    let config = HarnessConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Run(args) => run_modes(args, &config),
        Commands::Cnf(args) => run_cnf(args, &config),
        Commands::Problog(args) => run_reference(args, &config),
        Commands::Table(args) => print_tables(args, &config),
        Commands::Plot(args) => write_charts(args, &config),
    }
}

fn run_modes(args: RunArgs, config: &HarnessConfig) -> Result<i32> {
    let fields = args.fields();
    if fields.is_empty() {
        return Err(HarnessError::MissingArgument("field selection (-t -s -c -f -p --distinct)").into());
    }
    let modes = if args.modes.is_empty() {
        config.modes.clone()
    } else {
        args.modes.clone()
    };
    if modes.is_empty() {
        return Err(HarnessError::MissingArgument("--modes").into());
    }

    let benchmarks = benchmarks_in(&args.input.input, "dice")?;
    let output = output_path(args.input.output.as_deref(), config, DEFAULT_OUTPUT);
    let compiler = compiler_path(args.compiler, config);
    let signals = install_signals()?;

    info!(benchmarks = benchmarks.len(), compiler = %compiler.display(), "starting run");
    let mut runner = ExperimentRunner::new(
        ProcessInvoker::with_signals(signals.clone()),
        compiler,
        config.timeout(args.input.timeout),
        signals.clone(),
    );
    let summary = runner
        .run_to_store(&output, &benchmarks, &fields, &modes)
        .with_context(|| format!("updating {}", output.display()))?;

    Ok(finish(&summary, &signals))
}

fn run_cnf(args: CnfArgs, config: &HarnessConfig) -> Result<i32> {
    let benchmarks = benchmarks_in(&args.input.input, "dice")?;
    let output = args
        .input
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CNF_OUTPUT));
    let compiler = compiler_path(args.compiler, config);

    let mut table = ResultTable::load(&output).with_context(|| format!("loading {}", output.display()))?;
    let signals = install_signals()?;
    let mut runner = ExperimentRunner::new(
        ProcessInvoker::with_signals(signals.clone()),
        compiler,
        config.timeout(args.input.timeout),
        signals.clone(),
    );
    let summary = runner.run_cnf(&benchmarks, &mut table);
    table.save(&output).with_context(|| format!("saving {}", output.display()))?;
    info!(path = %output.display(), "results saved");

    Ok(finish(&summary, &signals))
}

fn run_reference(args: ProblogArgs, config: &HarnessConfig) -> Result<i32> {
    let benchmarks = benchmarks_in(&args.input.input, "pl")?;
    let output = args
        .input
        .output
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_OUTPUT));

    let signals = install_signals()?;
    let mut runner = ReferenceRunner::new(
        ProcessInvoker::with_signals(signals.clone()),
        args.tool,
        config.timeout(args.input.timeout),
        signals.clone(),
    );
    let times = runner.run(&benchmarks);
    problog::save_times(&output, &times).with_context(|| format!("saving {}", output.display()))?;
    info!(path = %output.display(), "results saved");

    Ok(if signals.should_shutdown() { signals.exit_code() } else { 0 })
}

fn print_tables(args: ReportArgs, config: &HarnessConfig) -> Result<i32> {
    let modes = columns(&args.columns)?;
    let document = load_document(args.output.as_deref(), config)?;
    for table in latex::render_tables(&document.results, &modes)? {
        println!("{}\n", table);
    }
    Ok(0)
}

fn write_charts(args: PlotArgs, config: &HarnessConfig) -> Result<i32> {
    let modes = columns(&args.report.columns)?;
    let document = load_document(args.report.output.as_deref(), config)?;
    if document.results.is_empty() {
        return Err(HarnessError::NoResults.into());
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;
    let charts = [
        ("time_cactus.svg", chart::render_time_cactus(&document, &modes)),
        ("size_cactus.svg", chart::render_size_bars(&document, &modes)),
    ];
    for (name, svg) in charts {
        let path = args.out_dir.join(name);
        fs::write(&path, svg).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "chart written");
    }
    Ok(0)
}

fn install_signals() -> Result<SignalHandler> {
    let signals = SignalHandler::new();
    signals.setup().context("installing signal handlers")?;
    Ok(signals)
}

fn finish(summary: &RunSummary, signals: &SignalHandler) -> i32 {
    info!(
        invocations = summary.invocations,
        skipped = summary.skipped,
        timeouts = summary.timeouts,
        failures = summary.failures,
        errors = summary.errors,
        "done"
    );
    if summary.interrupted {
        signals.exit_code()
    } else {
        0
    }
}

fn columns(ids: &[String]) -> Result<Vec<Mode>> {
    if ids.is_empty() {
        return Ok(Mode::ALL.to_vec());
    }
    Ok(ids.iter().map(|id| mode::lookup(id)).collect::<modebench::Result<_>>()?)
}

fn load_document(cli: Option<&Path>, config: &HarnessConfig) -> Result<ResultDocument> {
    let path = output_path(cli, config, DEFAULT_OUTPUT);
    ResultDocument::load(&path).with_context(|| format!("loading {}", path.display()))
}

fn output_path(cli: Option<&Path>, config: &HarnessConfig, default: &str) -> PathBuf {
    cli.map(Path::to_path_buf)
        .or_else(|| config.output.clone())
        .unwrap_or_else(|| PathBuf::from(default))
}

fn compiler_path(cli: Option<PathBuf>, config: &HarnessConfig) -> PathBuf {
    cli.or_else(|| config.compiler.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER))
}
