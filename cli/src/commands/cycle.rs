// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Single-cycle command
//!
//! Runs one MAPE-K cycle against metrics given on the command line and
//! prints the resulting record as JSON.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use mapek_core::domain::cycle::{CycleContext, SystemMetrics};
use mapek_core::domain::loop_config::LoopConfigManifest;
use mapek_core::MapekLoop;

use super::{parse_context, parse_metric};

#[derive(Args)]
pub struct CycleArgs {
    /// System metric reading (repeatable), e.g. --metric health=0.42
    #[arg(short, long = "metric", value_name = "NAME=VALUE", value_parser = parse_metric)]
    pub metrics: Vec<(String, f64)>,

    /// Context entry passed to every phase (repeatable)
    #[arg(long = "context", value_name = "NAME=VALUE", value_parser = parse_context)]
    pub context: Vec<(String, serde_json::Value)>,

    /// Attach the loop's counter/gauge snapshot under `loop`
    #[arg(long)]
    pub with_stats: bool,
}

pub async fn execute(args: CycleArgs, manifest: LoopConfigManifest) -> Result<()> {
    let output = run(args, &manifest).await?;
    let rendered = serde_json::to_string_pretty(&output).context("Failed to render cycle output")?;
    println!("{}", rendered);
    Ok(())
}

async fn run(args: CycleArgs, manifest: &LoopConfigManifest) -> Result<serde_json::Value> {
    manifest.validate().context("Invalid configuration")?;

    let mapek = MapekLoop::from_config(&manifest.spec);
    let system_metrics: SystemMetrics = args.metrics.into_iter().collect();
    let context: CycleContext = args.context.into_iter().collect();

    let state = mapek.execute_cycle(system_metrics, context).await;
    info!(
        cycle_id = state.cycle_id(),
        phase = ?state.phase(),
        "Cycle finished"
    );

    let mut output =
        serde_json::to_value(state.snapshot()).context("Failed to serialize cycle record")?;
    if args.with_stats {
        output["loop"] = serde_json::to_value(mapek.get_metrics_snapshot())
            .context("Failed to serialize loop metrics")?;
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(metrics: &[(&str, f64)]) -> CycleArgs {
        CycleArgs {
            metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            context: vec![],
            with_stats: false,
        }
    }

    #[tokio::test]
    async fn test_cycle_output_for_critical_health() {
        let output = run(args(&[("health", 0.1)]), &LoopConfigManifest::default())
            .await
            .unwrap();

        assert_eq!(output["cycle_id"], 1);
        assert_eq!(output["phase"], "COMPLETE");
        assert_eq!(output["metrics"]["analysis"]["severity"], "CRITICAL");
        assert_eq!(
            output["actions"],
            json!(["Emergency recovery initiated", "Resource scaling initiated"])
        );
        assert!(output.get("loop").is_none());
    }

    #[tokio::test]
    async fn test_cycle_output_with_stats() {
        let mut cycle_args = args(&[("health", 0.5)]);
        cycle_args.with_stats = true;

        let output = run(cycle_args, &LoopConfigManifest::default()).await.unwrap();
        assert_eq!(output["loop"]["state"]["successful_cycles"], 1);
        assert_eq!(output["loop"]["stats"]["counters"]["monitoring_adjustments"], 1);
    }

    #[tokio::test]
    async fn test_cycle_uses_configured_thresholds() {
        let mut manifest = LoopConfigManifest::default();
        manifest.spec.thresholds.critical_below = 0.6;
        manifest.spec.thresholds.warning_below = 0.8;

        let output = run(args(&[("health", 0.5)]), &manifest).await.unwrap();
        assert_eq!(output["metrics"]["analysis"]["severity"], "CRITICAL");
    }

    #[tokio::test]
    async fn test_cycle_refuses_inverted_thresholds() {
        let mut manifest = LoopConfigManifest::default();
        manifest.spec.thresholds.critical_below = 0.9;
        manifest.spec.thresholds.warning_below = 0.2;

        let err = run(args(&[("health", 0.5)]), &manifest).await.unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"));
    }

    #[tokio::test]
    async fn test_cycle_refuses_unknown_log_format() {
        let mut manifest = LoopConfigManifest::default();
        manifest.spec.observability.logging.format = "xml".to_string();

        assert!(run(args(&[("health", 0.5)]), &manifest).await.is_err());
    }

    #[tokio::test]
    async fn test_infinite_health_is_normal() {
        let output = run(args(&[("health", f64::INFINITY)]), &LoopConfigManifest::default())
            .await
            .unwrap();

        assert_eq!(output["phase"], "COMPLETE");
        assert_eq!(output["metrics"]["analysis"]["severity"], "NORMAL");
        assert_eq!(output["actions"], json!(["No action required"]));
    }
}
