//! Junzi Ingest (junzi-ingest) - Main entry point

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use junzi_common::config::{locate_config_file, LoggingConfig, RootFolderResolver, TomlConfig};
use junzi_ingest::{run, Cli, IngestContext};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = locate_config_file(cli.config.as_deref());
    let config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;
    if let Some(path) = &config_path {
        debug!("Configuration file: {}", path.display());
    }

    let root_folder = RootFolderResolver::new(cli.root_folder.clone(), &config).resolve();
    info!("Root folder: {}", root_folder.display());

    let ctx = IngestContext::new(config, root_folder)?;
    run(&ctx, cli.command)
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr unless a
/// log file is configured.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("junzi_common={0},junzi_ingest={0}", logging.level)));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}
