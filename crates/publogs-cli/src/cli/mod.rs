//! CLI for publogs, the public contest log downloader.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use publogs_core::config;

use commands::{run_download, run_providers};

/// Exit status when the run finished but wrote nothing new.
pub const EXIT_NO_WORK: u8 = 2;

/// Ceiling for tokio's blocking pool. Every running download occupies one
/// blocking thread, and each server bucket may run `workers` of them at once.
pub const BLOCKING_THREADS: usize = 2048;

/// Multi-threaded runtime with a blocking pool large enough for many buckets.
pub fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(BLOCKING_THREADS)
        .thread_name("publogs-rt")
        .build()
}

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "publogs")]
#[command(about = "publogs: download public contest logs with per-server adaptive concurrency", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/publogs/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Discover logs from the selected providers and download them.
    Run(RunArgs),

    /// List the configured providers in selection order.
    Providers,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Extra manifest (path or http/https URL) to offer as a provider. Repeatable.
    #[arg(long = "manifest", value_name = "PATH")]
    pub manifests: Vec<String>,

    /// Providers to run, by number (e.g. "1,3" or "2-4"), or "all" (default).
    #[arg(long, value_name = "LIST")]
    pub select: Option<String>,

    /// Only the N most recent years, or "all" (default).
    #[arg(long, value_name = "N")]
    pub last: Option<String>,

    /// Worker pool size per server (overrides config).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Disable adaptive per-server concurrency.
    #[arg(long)]
    pub no_adaptive: bool,

    /// Lower bound for the adaptive limiter (overrides config).
    #[arg(long, value_name = "N")]
    pub min_workers: Option<usize>,

    /// Root directory for downloaded logs (overrides config).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write a JSON run summary to this file.
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Print the host -> address mapping and per-bucket breakdown.
    #[arg(long)]
    pub debug: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<ExitCode> {
        let cli = Cli::parse();
        let cfg = match &cli.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run(args) => run_download(&cfg, &args).await,
            CliCommand::Providers => {
                run_providers(&cfg);
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

#[cfg(test)]
mod tests;
