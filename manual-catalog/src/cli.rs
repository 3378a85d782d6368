///
/// This module implements the CLI interface for manual-catalog: command
/// parsing, user-visible output, and routing to the pipeline.
///
/// All domain logic (classification, link resolution, catalog persistence,
/// watching and publishing) lives in the `manual-catalog-core` crate.
///
/// ## How To Use
/// - Command line: `manual-catalog --help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::load_config::load_config;
use crate::pipeline::{run_catalog, PipelineRebuild};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manual_catalog_core::contract::{LinkValidator, Rebuild};
use manual_catalog_core::publish::GitPublisher;
use manual_catalog_core::validate::HttpLinkValidator;
use manual_catalog_core::watch::{ChangeWatcher, CommandRebuild, WatchLog};
use std::path::PathBuf;
use std::time::Duration;

/// CLI for manual-catalog: publish a catalog of vendor manuals with shareable links.
#[derive(Parser)]
#[clap(
    name = "manual-catalog",
    version,
    about = "Scan a Manufacturer/Model/File tree of manuals and publish a JSON catalog of shareable links"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the catalog once using the given config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Watch the scan root and rebuild and publish the catalog on change
    Watch {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Probe a single link the way the catalog build does
    CheckLink {
        url: String,
        #[clap(long, default_value_t = 10)]
        timeout_secs: u64,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "sync", "Starting catalog build");
            let report = run_catalog(&config).await?;

            println!(
                "Catalog written to {} ({} entries, previously {}).",
                config.catalog.output.display(),
                report.entries,
                report.previous_entries
            );
            if report.entries == 0 {
                println!("Warning: the catalog is empty.");
            }
            if !report.is_clean() {
                println!(
                    "{} not found remotely, {} failed, {} broken links skipped (see {}).",
                    report.not_found.len(),
                    report.failed.len(),
                    report.skipped_links.len(),
                    config.catalog.skipped_links_log.display()
                );
            }
            tracing::info!(command = "sync", ?report, "Catalog build complete");
            Ok(())
        }
        Commands::Watch { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "watch", "Starting change watcher");

            let rebuild: Box<dyn Rebuild> = match &config.watch.rebuild_command {
                Some(command) => Box::new(CommandRebuild::new(
                    command.clone(),
                    Some(config.watch.git.repo_dir.clone()),
                )),
                None => Box::new(PipelineRebuild::new(config.clone())),
            };
            let publisher = config.watch.git.enabled.then(|| {
                GitPublisher::new(config.watch.git.clone(), config.catalog.output.clone())
            });
            let watcher = ChangeWatcher::new(
                config.scan_root.clone(),
                config.watch.debounce(),
                WatchLog::new(config.watch.log_file.clone()),
                rebuild,
                publisher,
            )
            .ignore_paths(config.generated_paths());

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            watcher
                .run(shutdown)
                .await
                .context("Change watcher failed")?;
            Ok(())
        }
        Commands::CheckLink { url, timeout_secs } => {
            let validator = HttpLinkValidator::new(Duration::from_secs(timeout_secs))
                .context("Failed to build link validator")?;
            if validator.is_valid(&url).await {
                println!("valid: {url}");
                Ok(())
            } else {
                anyhow::bail!("link is not reachable: {url}")
            }
        }
    }
}
