#![warn(missing_docs)]
//! gilbench CLI Library
//!
//! This module provides the command-line front end of gilbench: it loads
//! `gilbench.toml`, runs the contention demo and the strategy comparisons,
//! and renders the resulting [`SuiteReport`].
//!
//! The same binary doubles as the worker process of the process-parallel
//! strategy; the hidden `--gil-worker` flag switches it into worker mode
//! before anything else is initialized.
//!
//! # Example
//!
//! ```ignore
//! fn main() {
//!     if let Err(e) = gilbench_cli::run() {
//!         eprintln!("Error: {e:#}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

mod config;
mod executor;
mod supervisor;

pub use config::*;
pub use executor::{
    Comparator, Runner, RunnerConfig, build_report_meta, format_comparison, format_contention,
    format_human_output, run_contention, speedup_ratio, system_info, workload_title,
};
pub use supervisor::*;

use clap::{Parser, Subcommand, ValueEnum};
use gilbench_core::{BUILTIN_UNITS, Payload, PrimeSum, TimedWait, WorkUnit, WorkerMain};
use gilbench_report::{
    ComparisonReport, ContentionReport, OutputFormat, SuiteReport, generate_json_report,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// gilbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "gilbench")]
#[command(
    author,
    version,
    about = "gilbench - sequential vs threads vs processes under an interpreter lock"
)]
pub struct Cli {
    /// Optional subcommand (Run, Contention, Units, Init); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Workload to compare
    #[arg(value_enum, default_value = "all")]
    pub workload: Workload,

    /// Worker counts to compare, comma separated (e.g. 1,2,4,8)
    #[arg(long, value_delimiter = ',')]
    pub workers: Vec<usize>,

    /// Output format: human, json (default from gilbench.toml)
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (discovered from the current directory if not specified)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run native threads without the simulated interpreter lock
    #[arg(long)]
    pub no_gil: bool,

    /// Skip the lock contention demo
    #[arg(long)]
    pub no_contention: bool,

    /// Per-item worker process timeout in seconds (0 disables it)
    #[arg(long)]
    pub worker_timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the process-parallel strategy)
    #[arg(long, hide = true)]
    pub gil_worker: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the contention demo and strategy comparisons (default)
    Run,
    /// Run only the lock contention demo
    Contention,
    /// List the work units available to worker processes
    Units,
    /// Write a default gilbench.toml to the current directory
    Init,
}

/// Built-in workloads selectable from the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// CPU-bound prime sum
    Cpu,
    /// I/O-bound timed wait
    Io,
    /// Both, CPU first
    All,
}

impl Workload {
    /// Workload labels covered by this selection, in run order
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Workload::Cpu => &["cpu"],
            Workload::Io => &["io"],
            Workload::All => &["cpu", "io"],
        }
    }
}

/// Run the gilbench CLI with the process arguments.
///
/// # Returns
/// Returns `Ok(())` on success, or an error if any run failed.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the gilbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if cli.gil_worker {
        return run_worker_mode();
    }

    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => GilbenchConfig::load(path)?,
        None => GilbenchConfig::discover()?.unwrap_or_default(),
    };
    apply_cli_overrides(&cli, &mut config);

    match cli.command {
        Some(Commands::Units) => list_units(),
        Some(Commands::Init) => init_config(Path::new(CONFIG_FILE)),
        Some(Commands::Contention) => run_suite(&cli, &config, SuiteScope::ContentionOnly),
        Some(Commands::Run) | None => run_suite(&cli, &config, SuiteScope::Full),
    }
}

/// Run as a worker process (IPC mode)
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

/// Logs go to stderr; stdout carries only the report.
fn init_logging(verbose: bool) {
    let default_directive = if verbose {
        "gilbench=debug"
    } else {
        "gilbench=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Layer CLI flags over the file configuration.
fn apply_cli_overrides(cli: &Cli, config: &mut GilbenchConfig) {
    if cli.no_gil {
        config.runner.gil = false;
    }
    if let Some(secs) = cli.worker_timeout {
        config.runner.worker_timeout = format!("{}s", secs);
    }
    if !cli.workers.is_empty() {
        config.runner.workers = cli.workers.clone();
    }
    if let Some(format) = &cli.format {
        config.output.format = format.clone();
    }
    if cli.no_contention {
        config.contention.enabled = false;
    }
}

/// A unit together with the argument batch it is compared on
struct WorkloadRun {
    label: &'static str,
    unit: Box<dyn WorkUnit>,
    batch: Vec<Payload>,
}

fn workload_runs(selection: Workload, config: &GilbenchConfig) -> Vec<WorkloadRun> {
    selection
        .labels()
        .iter()
        .map(|&label| match label {
            "io" => WorkloadRun {
                label,
                unit: Box::new(TimedWait),
                batch: config
                    .workloads
                    .io_args
                    .iter()
                    .map(|&s| Payload::Real(s))
                    .collect(),
            },
            _ => WorkloadRun {
                label,
                unit: Box::new(PrimeSum),
                batch: config
                    .workloads
                    .cpu_args
                    .iter()
                    .map(|&n| Payload::Integer(n))
                    .collect(),
            },
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SuiteScope {
    Full,
    ContentionOnly,
}

fn run_suite(cli: &Cli, config: &GilbenchConfig, scope: SuiteScope) -> anyhow::Result<()> {
    let gil = config.gil_settings()?;
    let format: OutputFormat = config
        .output
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let runner = Runner::new(RunnerConfig {
        gil,
        worker_binary: None,
        worker_timeout: config.worker_timeout()?,
    });

    let progress = spinner();
    let outcome = execute_suite(cli, config, scope, runner, &progress);
    progress.finish_and_clear();
    let (contention, comparisons) = outcome?;

    let report = SuiteReport {
        meta: build_report_meta(gil),
        contention,
        comparisons,
    };

    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };

    if let Some(ref path) = cli.output {
        std::fs::write(path, output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{}", output);
    }

    Ok(())
}

fn execute_suite(
    cli: &Cli,
    config: &GilbenchConfig,
    scope: SuiteScope,
    runner: Runner,
    progress: &ProgressBar,
) -> anyhow::Result<(Option<ContentionReport>, Vec<ComparisonReport>)> {
    let run_demo = scope == SuiteScope::ContentionOnly || config.contention.enabled;
    let contention = if run_demo {
        progress.set_message(format!(
            "contention demo ({} threads)",
            config.contention.threads
        ));
        Some(run_contention(
            config.contention.threads,
            config.contention.iterations,
            runner.config().gil,
        )?)
    } else {
        None
    };

    let mut comparisons = Vec::new();
    if scope == SuiteScope::Full {
        let worker_counts = config.worker_counts();
        let comparator = Comparator::new(runner).with_progress(progress.clone());
        for workload in workload_runs(cli.workload, config) {
            comparisons.extend(comparator.sweep(
                workload.label,
                workload.unit.as_ref(),
                &workload.batch,
                &worker_counts,
            )?);
        }
    }

    Ok((contention, comparisons))
}

/// Spinner on stderr; indicatif keeps it hidden when stderr is not a terminal.
fn spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn list_units() -> anyhow::Result<()> {
    println!("Registered work units:");
    let width = BUILTIN_UNITS
        .iter()
        .map(|def| def.name.len())
        .max()
        .unwrap_or(0);
    for def in BUILTIN_UNITS {
        println!("  {:<width$}  {}", def.name, def.description, width = width);
    }
    println!("{} units available to worker processes.", BUILTIN_UNITS.len());
    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    std::fs::write(path, GilbenchConfig::default_toml())?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["gilbench"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.workload, Workload::All);
        assert!(cli.workers.is_empty());
        assert!(!cli.gil_worker);
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "gilbench",
            "cpu",
            "--workers",
            "1,2,8",
            "--format",
            "json",
            "--no-gil",
            "--no-contention",
            "--worker-timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.workload, Workload::Cpu);
        assert_eq!(cli.workers, vec![1, 2, 8]);

        let mut config = GilbenchConfig::default();
        apply_cli_overrides(&cli, &mut config);
        assert!(!config.runner.gil);
        assert!(!config.contention.enabled);
        assert_eq!(config.worker_counts(), vec![1, 2, 8]);
        assert_eq!(config.output.format, "json");
        assert_eq!(
            config.worker_timeout().unwrap(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_overrides_leave_file_values_alone() {
        let cli = Cli::try_parse_from(["gilbench"]).unwrap();
        let mut config = GilbenchConfig::default();
        config.runner.workers = vec![3];
        config.output.format = "json".to_string();
        apply_cli_overrides(&cli, &mut config);
        assert_eq!(config.worker_counts(), vec![3]);
        assert_eq!(config.output.format, "json");
        assert!(config.runner.gil);
    }

    #[test]
    fn test_worker_flag_and_subcommands() {
        let cli = Cli::try_parse_from(["gilbench", "--gil-worker"]).unwrap();
        assert!(cli.gil_worker);

        let cli = Cli::try_parse_from(["gilbench", "contention"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Contention));

        assert!(Cli::try_parse_from(["gilbench", "disk"]).is_err());
    }

    #[test]
    fn test_workload_runs_follow_config() {
        let mut config = GilbenchConfig::default();
        config.workloads.cpu_args = vec![10, 20];
        config.workloads.io_args = vec![0.25];

        let runs = workload_runs(Workload::All, &config);
        assert_eq!(
            runs.iter().map(|r| r.label).collect::<Vec<_>>(),
            vec!["cpu", "io"]
        );
        assert_eq!(runs[0].unit.name(), PrimeSum::NAME);
        assert_eq!(
            runs[0].batch,
            vec![Payload::Integer(10), Payload::Integer(20)]
        );
        assert_eq!(runs[1].unit.name(), TimedWait::NAME);
        assert_eq!(runs[1].batch, vec![Payload::Real(0.25)]);

        assert_eq!(workload_runs(Workload::Io, &config).len(), 1);
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        init_config(&path).unwrap();
        let written = GilbenchConfig::load(&path).unwrap();
        assert_eq!(written, GilbenchConfig::default());
        assert!(init_config(&path).is_err());
    }
}
