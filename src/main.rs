//! practice-migrate - Legacy Practice-Management Data Migration
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use practice_migrate::config::{CliArgs, MigrateConfig, Stage};
use practice_migrate::pipeline::Pipeline;
use practice_migrate::progress::print_header;
use std::process::ExitCode;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                // Completed, but with failed batches or stale dates
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool> {
    // A .env file may carry DATABASE_URL
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = MigrateConfig::from_args(args).context("Invalid configuration")?;

    if config.show_progress {
        print_header(
            stage_name(config.stage),
            &config
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| config.export_dir.display().to_string()),
            &config
                .dest_url
                .as_ref()
                .map(|u| u.display())
                .unwrap_or_else(|| config.export_dir.display().to_string()),
        );
    }

    let pipeline = Pipeline::new(config);
    let outcome = pipeline.run().context("Migration failed")?;

    if !outcome.is_clean() {
        warn!("run completed with failures - inspect the summary above");
    }

    Ok(outcome.is_clean())
}

fn stage_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Extract => "extract",
        Stage::Load => "load",
        Stage::Verify => "verify",
        Stage::Run => "extract + load + verify",
    }
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("practice_migrate=debug,warn")
    } else {
        EnvFilter::new("practice_migrate=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}
