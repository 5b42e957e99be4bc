// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Monitor Runner - Background task driving periodic MAPE-K cycles
//!
//! Polls a [`MetricsSource`] on a fixed interval and feeds the result into
//! [`MapekLoop::execute_cycle`]. Cycle failures are already folded into
//! `ERROR` records by the loop; only metrics source failures are handled
//! here, by backing off for `retry_delay_seconds`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Continuous monitoring on top of the single-cycle loop

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::mapek_loop::MapekLoop;
use crate::domain::cycle::{CycleContext, CycleState};
use crate::domain::loop_config::MonitoringConfig;
use crate::infrastructure::metrics_source::{MetricsSource, MetricsSourceError};

/// Configuration for the monitor runner
#[derive(Debug, Clone)]
pub struct MonitorRunnerConfig {
    /// Seconds between cycles
    pub interval_seconds: u64,

    /// Pause after a metrics source failure
    pub retry_delay_seconds: u64,

    /// Stop after this many cycles (runs until cancelled when `None`)
    pub max_cycles: Option<u64>,

    pub enabled: bool,
}

impl Default for MonitorRunnerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            retry_delay_seconds: 60,
            max_cycles: None,
            enabled: true,
        }
    }
}

impl From<&MonitoringConfig> for MonitorRunnerConfig {
    fn from(config: &MonitoringConfig) -> Self {
        Self {
            interval_seconds: config.interval_seconds,
            retry_delay_seconds: config.retry_delay_seconds,
            max_cycles: None,
            enabled: config.enabled,
        }
    }
}

pub struct MonitorRunner {
    mapek: Arc<MapekLoop>,
    source: Arc<dyn MetricsSource>,
    config: MonitorRunnerConfig,
    shutdown_token: CancellationToken,
}

impl MonitorRunner {
    pub fn new(
        mapek: Arc<MapekLoop>,
        source: Arc<dyn MetricsSource>,
        config: MonitorRunnerConfig,
    ) -> Self {
        Self {
            mapek,
            source,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the runner as a background task
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<u64> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run cycles until cancelled or `max_cycles` is reached.
    /// Returns the number of cycles executed.
    pub async fn run(&self) -> u64 {
        if !self.config.enabled {
            info!("Monitor runner is disabled");
            return 0;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            retry_delay_seconds = self.config.retry_delay_seconds,
            source = self.source.kind(),
            component = self.mapek.component_name(),
            "Starting MAPE-K monitor runner"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                info!(cycles, "Monitor runner reached its cycle limit");
                break;
            }

            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running scheduled MAPE-K cycle");

                    match self.run_once().await {
                        Ok(state) => {
                            cycles += 1;
                            debug!(cycle_id = state.cycle_id(), phase = ?state.phase(), "Scheduled cycle recorded");
                        }
                        Err(e) => {
                            warn!("Metrics collection failed: {}", e);
                            let backoff = Duration::from_secs(self.config.retry_delay_seconds);
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = self.shutdown_token.cancelled() => break,
                            }
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping monitor runner");
                    break;
                }
            }
        }

        info!(cycles, "MAPE-K monitor runner stopped");
        cycles
    }

    /// Collect metrics once and run a single cycle.
    pub async fn run_once(&self) -> Result<Arc<CycleState>, MetricsSourceError> {
        let system_metrics = self.source.collect().await?;
        let context = CycleContext::from([(
            "monitoring_type".to_string(),
            serde_json::Value::String(self.source.kind().to_string()),
        )]);

        Ok(self.mapek.execute_cycle(system_metrics, context).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cycle::{CyclePhase, SystemMetrics};
    use crate::infrastructure::metrics_source::StaticMetricsSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fails the first `failures` polls, then reports healthy metrics.
    struct FlakySource {
        failures: u64,
        polls: AtomicU64,
    }

    #[async_trait]
    impl MetricsSource for FlakySource {
        fn kind(&self) -> &str {
            "flaky"
        }

        async fn collect(&self) -> Result<SystemMetrics, MetricsSourceError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            if poll < self.failures {
                Err(MetricsSourceError::Unavailable("sensor offline".to_string()))
            } else {
                Ok(SystemMetrics::from([("health".to_string(), 0.9)]))
            }
        }
    }

    fn healthy_source() -> Arc<dyn MetricsSource> {
        Arc::new(StaticMetricsSource::new(SystemMetrics::from([(
            "health".to_string(),
            0.9,
        )])))
    }

    #[tokio::test]
    async fn test_runner_configuration_defaults() {
        let config = MonitorRunnerConfig::default();
        assert_eq!(config.interval_seconds, 300);
        assert_eq!(config.retry_delay_seconds, 60);
        assert!(config.max_cycles.is_none());
        assert!(config.enabled);

        let from_spec = MonitorRunnerConfig::from(&MonitoringConfig::default());
        assert_eq!(from_spec.interval_seconds, 300);
    }

    #[tokio::test]
    async fn test_run_once_passes_source_kind_as_context() {
        let mapek = Arc::new(MapekLoop::new("runner_test"));
        let runner = MonitorRunner::new(Arc::clone(&mapek), healthy_source(), MonitorRunnerConfig::default());

        let state = runner.run_once().await.unwrap();
        assert_eq!(state.phase(), CyclePhase::Complete);
        assert_eq!(state.decisions(), vec!["Continue normal operations"]);
        assert_eq!(mapek.get_current_state().cycle_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_stops_after_max_cycles() {
        let mapek = Arc::new(MapekLoop::new("runner_test"));
        let config = MonitorRunnerConfig {
            interval_seconds: 5,
            max_cycles: Some(3),
            ..MonitorRunnerConfig::default()
        };
        let runner = Arc::new(MonitorRunner::new(Arc::clone(&mapek), healthy_source(), config));

        let cycles = runner.start().await.unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(mapek.get_current_state().successful_cycles, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_backs_off_on_source_failure() {
        let mapek = Arc::new(MapekLoop::new("runner_test"));
        let source = Arc::new(FlakySource {
            failures: 2,
            polls: AtomicU64::new(0),
        });
        let config = MonitorRunnerConfig {
            interval_seconds: 1,
            retry_delay_seconds: 10,
            max_cycles: Some(1),
            enabled: true,
        };
        let runner = MonitorRunner::new(Arc::clone(&mapek), source.clone(), config);

        let started = tokio::time::Instant::now();
        let cycles = runner.run().await;

        assert_eq!(cycles, 1);
        assert_eq!(source.polls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_secs(20));
        assert_eq!(mapek.get_current_state().cycle_count, 1);
    }

    #[tokio::test]
    async fn test_runner_stops_on_cancellation() {
        let mapek = Arc::new(MapekLoop::new("runner_test"));
        let config = MonitorRunnerConfig {
            interval_seconds: 3600,
            ..MonitorRunnerConfig::default()
        };
        let runner = Arc::new(MonitorRunner::new(Arc::clone(&mapek), healthy_source(), config));
        let token = runner.shutdown_token();

        let handle = runner.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        // The first tick fires immediately, the second is an hour away.
        let cycles = handle.await.unwrap();
        assert_eq!(cycles, 1);
    }

    #[tokio::test]
    async fn test_disabled_runner_does_nothing() {
        let mapek = Arc::new(MapekLoop::new("runner_test"));
        let config = MonitorRunnerConfig {
            enabled: false,
            ..MonitorRunnerConfig::default()
        };
        let runner = MonitorRunner::new(Arc::clone(&mapek), healthy_source(), config);

        assert_eq!(runner.run().await, 0);
        assert_eq!(mapek.get_current_state().cycle_count, 0);
    }
}
