//! `publogs run` – discover, bucket and download.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use publogs_core::config::PublogsConfig;
use publogs_core::orchestrator::{
    Orchestrator, OrchestratorError, ProviderReport, RunOptions, RunPhase, RunSummary, TaskEvent,
};
use publogs_core::provider::{ManifestProvider, Provider};
use publogs_core::resolver::{PinnedResolver, StaticResolver, SystemResolver};

use super::select::{parse_recency, provider_entries, select_providers};
use crate::cli::{RunArgs, EXIT_NO_WORK};

/// Config with the command-line overrides applied, validated again.
pub(crate) fn effective_config(cfg: &PublogsConfig, args: &RunArgs) -> Result<PublogsConfig> {
    let mut cfg = cfg.clone();
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }
    if let Some(min_workers) = args.min_workers {
        cfg.min_workers = min_workers;
    }
    if args.no_adaptive {
        cfg.adaptive = false;
    }
    if let Some(dir) = &args.output_dir {
        cfg.output_dir = Some(dir.clone());
    }
    cfg.validate()?;
    Ok(cfg)
}

fn discovery_line(index: usize, report: &ProviderReport) -> String {
    match (&report.error, report.duplicates) {
        (Some(error), _) => format!("  {}) {} failed: {}", index + 1, report.name, error),
        (None, 0) => format!("  {}) {} queued {} downloads", index + 1, report.name, report.tasks),
        (None, dups) => format!(
            "  {}) {} queued {} downloads ({} duplicate destinations dropped)",
            index + 1,
            report.name,
            report.tasks,
            dups
        ),
    }
}

/// Progress printing between the run phases; `--debug` adds the bucket breakdown.
fn print_phase(phase: RunPhase<'_>, debug: bool) {
    match phase {
        RunPhase::Discovered(discovery) => {
            for (i, report) in discovery.reports.iter().enumerate() {
                println!("{}", discovery_line(i, report));
            }
        }
        RunPhase::Bucketed(buckets) => {
            println!(
                "Downloading {} logs from {} server(s)...",
                buckets.total_tasks(),
                buckets.len()
            );
            if debug {
                print!("{}", buckets.breakdown());
            }
        }
    }
}

fn write_report(path: &Path, summary: &RunSummary) -> Result<()> {
    let json = summary.to_json().context("serialise run summary")?;
    std::fs::write(path, json).with_context(|| format!("write report: {}", path.display()))?;
    tracing::info!(path = %path.display(), "run report written");
    Ok(())
}

pub async fn run_download(cfg: &PublogsConfig, args: &RunArgs) -> Result<ExitCode> {
    let cfg = effective_config(cfg, args)?;
    let menu = provider_entries(&cfg, &args.manifests);
    let selected = select_providers(&menu, args.select.as_deref())?;
    let recency = parse_recency(args.last.as_deref())?;
    if selected.is_empty() {
        return Err(OrchestratorError::NoProviders.into());
    }

    let providers: Vec<Arc<dyn Provider>> = selected
        .iter()
        .map(|entry| Arc::new(ManifestProvider::from_config(entry, &cfg)) as Arc<dyn Provider>)
        .collect();
    let resolver = PinnedResolver::new(StaticResolver::from_pins(&cfg.hosts), SystemResolver);

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<TaskEvent>(256);
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("{event}");
        }
    });

    let debug = args.debug;
    let orchestrator = Orchestrator::new(RunOptions::from_config(&cfg), Arc::new(resolver))
        .with_events(event_tx)
        .with_phase_hook(move |phase| print_phase(phase, debug));

    println!("Discovering logs from {} provider(s)...", providers.len());
    let result = orchestrator.run(&providers, recency).await;
    // Dropping the orchestrator closes the event channel so the printer can finish.
    drop(orchestrator);
    let _ = printer.await;
    let summary = result?;

    println!(
        "Done: {} written, {} skipped, {} failed ({} discovered).",
        summary.written, summary.skipped, summary.failed, summary.discovered
    );
    if let Some(path) = &args.report {
        write_report(path, &summary)?;
    }

    if summary.produced_output() {
        Ok(ExitCode::SUCCESS)
    } else {
        println!("No new logs were written.");
        Ok(ExitCode::from(EXIT_NO_WORK))
    }
}
