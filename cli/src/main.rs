// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # MAPE-K Loop Host CLI
//!
//! The `mapek` binary hosts a single autonomic control loop.
//!
//! ## Commands
//!
//! - `mapek cycle --metric k=v` - Run one cycle and print its record
//! - `mapek watch --metrics-file FILE` - Run cycles on a schedule until Ctrl-C
//! - `mapek config show|validate|generate` - Configuration management
//!
//! Cycle output goes to stdout as JSON; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::PathBuf;
use tracing::info;

use mapek_core::domain::loop_config::{LoopConfigManifest, MetricsConfig};

mod commands;

use commands::{ConfigCommand, CycleArgs, WatchArgs};

/// MAPE-K Loop Host - Monitor, Analyze, Plan, Execute over shared Knowledge
#[derive(Parser)]
#[command(name = "mapek")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MAPEK_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "MAPEK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single MAPE-K cycle
    #[command(name = "cycle")]
    Cycle(CycleArgs),

    /// Run cycles continuously from a metrics file
    #[command(name = "watch")]
    Watch(WatchArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file must not stop `config validate` from reporting it.
    let manifest = LoopConfigManifest::load_or_default(cli.config.clone());
    let logging = manifest
        .as_ref()
        .map(|m| m.spec.observability.logging.clone())
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);

    init_logging(level, &logging.format)?;

    match cli.command {
        Some(Commands::Cycle(args)) => {
            let manifest = manifest.context("Failed to load configuration")?;
            install_metrics_exporter(&manifest.spec.observability.metrics)?;
            commands::cycle::execute(args, manifest).await
        }
        Some(Commands::Watch(args)) => {
            let manifest = manifest.context("Failed to load configuration")?;
            install_metrics_exporter(&manifest.spec.observability.metrics)?;
            commands::watch::execute(args, manifest).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

/// Serve the `metrics` facade on a Prometheus scrape endpoint when enabled.
fn install_metrics_exporter(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    info!(port = config.port, "Prometheus metrics exporter listening");
    Ok(())
}
