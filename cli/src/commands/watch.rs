// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Continuous monitoring command
//!
//! Re-reads a metrics file on every tick and runs a cycle with it until
//! Ctrl-C or the requested number of cycles.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use mapek_core::domain::events::CycleEvent;
use mapek_core::domain::loop_config::LoopConfigManifest;
use mapek_core::domain::phases::{LoopPhase, Severity};
use mapek_core::infrastructure::{EventBus, EventBusError, FileMetricsSource, LoopEventReceiver};
use mapek_core::{MapekLoop, MonitorRunner, MonitorRunnerConfig};

#[derive(Args)]
pub struct WatchArgs {
    /// YAML or JSON file holding a flat `name: number` map
    #[arg(short, long, value_name = "FILE")]
    pub metrics_file: PathBuf,

    /// Seconds between cycles (default: monitoring.interval_seconds)
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Stop after this many cycles
    #[arg(long, value_name = "N")]
    pub cycles: Option<u64>,
}

fn runner_config(args: &WatchArgs, manifest: &LoopConfigManifest) -> MonitorRunnerConfig {
    let mut config = MonitorRunnerConfig::from(&manifest.spec.monitoring);
    if let Some(interval) = args.interval {
        config.interval_seconds = interval;
    }
    config.max_cycles = args.cycles;
    // An explicit `watch` always runs, whatever the scheduled-monitoring flag says.
    config.enabled = true;
    config
}

/// Render the `current_phase` gauge code by name.
fn phase_label(code: f64) -> String {
    LoopPhase::from_code(code).map_or_else(|| format!("unknown ({code})"), |phase| phase.to_string())
}

pub async fn execute(args: WatchArgs, manifest: LoopConfigManifest) -> Result<()> {
    manifest.validate().context("Invalid configuration")?;
    if !args.metrics_file.exists() {
        anyhow::bail!("Metrics file not found: {}", args.metrics_file.display());
    }

    let bus = EventBus::with_default_capacity();
    let mapek = Arc::new(MapekLoop::from_config(&manifest.spec).with_event_bus(bus.clone()));
    let printer = tokio::spawn(print_events(bus.subscribe_loop(mapek.id())));

    let source = Arc::new(FileMetricsSource::new(&args.metrics_file));
    let runner = Arc::new(MonitorRunner::new(
        Arc::clone(&mapek),
        source,
        runner_config(&args, &manifest),
    ));
    let token = runner.shutdown_token();

    info!(
        metrics_file = %args.metrics_file.display(),
        component = mapek.component_name(),
        "Watching metrics file"
    );
    println!(
        "{} {} (Ctrl-C to stop)",
        "Watching".bold(),
        args.metrics_file.display()
    );

    let mut handle = runner.start();
    let cycles = tokio::select! {
        result = &mut handle => result.context("Monitor runner task failed")?,
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
            token.cancel();
            handle.await.context("Monitor runner task failed")?
        }
    };
    printer.abort();

    let state = mapek.get_current_state();
    println!();
    println!("{}", "Summary:".bold());
    println!("  Cycles run: {}", cycles);
    println!("  Phase: {}", phase_label(state.current_phase));
    println!(
        "  Successful: {}  Failed: {}",
        state.successful_cycles.to_string().green(),
        state.failed_cycles.to_string().red()
    );
    println!("  Success rate: {:.1}%", state.success_rate * 100.0);

    let recent = mapek.get_recent_history(manifest.spec.monitoring.history_limit);
    if !recent.is_empty() {
        println!("{}", "Recent cycles:".bold());
        for record in recent {
            println!(
                "  #{:<5} {:?} {}",
                record.cycle_id,
                record.phase,
                record.decisions.join("; ")
            );
        }
    }

    Ok(())
}

async fn print_events(mut receiver: LoopEventReceiver) {
    loop {
        match receiver.recv().await {
            Ok(event) => print_event(&event),
            Err(EventBusError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

fn print_event(event: &CycleEvent) {
    match event {
        CycleEvent::CycleCompleted {
            cycle_id,
            severity,
            decisions,
            actions,
            duration_secs,
            ..
        } => {
            let severity = match severity {
                Severity::Critical => severity.as_str().red(),
                Severity::Warning => severity.as_str().yellow(),
                Severity::Normal => severity.as_str().green(),
            };
            println!(
                "#{:<5} {:<8} decisions={} actions={} ({:.3}s)",
                cycle_id, severity, decisions, actions, duration_secs
            );
        }
        CycleEvent::CycleFailed {
            cycle_id,
            phase,
            reason,
            ..
        } => {
            println!(
                "#{:<5} {:<8} {} phase: {}",
                cycle_id,
                "ERROR".red().bold(),
                phase,
                reason
            );
        }
        CycleEvent::CycleStarted { .. } | CycleEvent::MetricsReset { .. } => {}
    }
}
