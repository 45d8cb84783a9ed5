//! ---
//! lt_section: "05-command-line"
//! lt_subsection: "binary"
//! lt_type: "source"
//! lt_scope: "code"
//! lt_description: "Binary entrypoint for the load tester."
//! lt_version: "v0.0.0-prealpha"
//! lt_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lt_common::config::{AppType, LoadTesterConfig, LoadedConfig};
use lt_common::logging::init_tracing;
use lt_orchestrator::Orchestrator;
use lt_workload::{InMemoryStore, WorkloadKind};
use strum::IntoEnumIterator;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "loadtester.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Concurrent read/write load tester",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Workload to run (see --list-workloads)")]
    workload: Option<String>,

    #[arg(long, value_name = "TYPE", help = "Override the workload's app type (simple|concurrent)")]
    app_type: Option<AppType>,

    #[arg(long, value_name = "N", help = "Number of writer workers")]
    num_threads_write: Option<usize>,

    #[arg(long, value_name = "N", help = "Number of reader workers")]
    num_threads_read: Option<usize>,

    #[arg(long, help = "Reuse the existing schema instead of recreating it")]
    reuse_table: bool,

    #[arg(long, value_name = "N", help = "Stop after this many successful writes")]
    max_writes: Option<u64>,

    #[arg(long, value_name = "N", help = "Stop after this many successful reads")]
    max_reads: Option<u64>,

    #[arg(long, value_name = "SECS", help = "Stop after this many seconds")]
    run_time: Option<u64>,

    #[arg(long, help = "Ask workers to stop when the run is interrupted (Ctrl+C)")]
    stop_on_interrupt: bool,

    #[arg(long, value_name = "FILE", help = "Write the run report as JSON")]
    report_json: Option<PathBuf>,

    #[arg(long, help = "List available workloads and exit")]
    list_workloads: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut LoadTesterConfig) {
        if let Some(workload) = &self.workload {
            config.workload = workload.clone();
        }
        if let Some(app_type) = self.app_type {
            config.app_type = Some(app_type);
        }
        if let Some(writers) = self.num_threads_write {
            config.threads.writers = writers;
        }
        if let Some(readers) = self.num_threads_read {
            config.threads.readers = readers;
        }
        if self.reuse_table {
            config.reuse_existing_schema = true;
        }
        if self.stop_on_interrupt {
            config.stop_on_interrupt = true;
        }
        if let Some(max) = self.max_writes {
            config.limits.max_writes = Some(max);
        }
        if let Some(max) = self.max_reads {
            config.limits.max_reads = Some(max);
        }
        if let Some(secs) = self.run_time {
            config.limits.run_time = Some(Duration::from_secs(secs));
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if cli.list_workloads {
        for kind in WorkloadKind::iter() {
            println!("{:<12} {:<11} {}", kind, kind.app_type(), kind.description());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let loaded = load_config(cli.config.as_ref())?;
    let mut config = loaded.config;
    cli.apply_overrides(&mut config);
    config.validate()?;
    init_tracing("loadtester", &config.logging)?;
    info!(
        config_path = ?loaded.source,
        workload = %config.workload,
        writers = config.threads.writers,
        readers = config.threads.readers,
        "configuration loaded"
    );

    let kind = WorkloadKind::resolve(&config.workload)?;
    let factory = kind.factory(&config, InMemoryStore::new());
    let orchestrator = Orchestrator::new(config, factory);
    info!(
        stop_on_interrupt = orchestrator.config().stop_on_interrupt,
        bounded = orchestrator.config().limits.is_bounded(),
        "press Ctrl+C to interrupt the run"
    );

    match orchestrator.run_with_signal_handling().await {
        Ok(report) => {
            report.log_summary();
            if let Some(path) = &cli.report_json {
                let json = report.to_json().context("failed to render run report")?;
                std::fs::write(path, json)
                    .with_context(|| format!("unable to write report to {}", path.display()))?;
                info!(path = %path.display(), "run report written");
            }
            info!("load test finished");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!(stage = %err.stage(), error = %err, "load test failed");
            eprintln!("{}", err.summary());
            Ok(ExitCode::from(err.stage().exit_code()))
        }
    }
}

fn load_config(explicit: Option<&PathBuf>) -> Result<LoadedConfig> {
    match explicit {
        Some(path) => LoadTesterConfig::load_with_source(std::slice::from_ref(path)),
        None => LoadTesterConfig::load_or_default(&[PathBuf::from(DEFAULT_CONFIG_PATH)]),
    }
}
