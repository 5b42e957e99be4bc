// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # MAPE-K Loop Orchestrator
//!
//! Runs one Monitor → Analyze → Plan → Execute → Knowledge cycle per call to
//! [`MapekLoop::execute_cycle`], with at most one cycle in flight per loop
//! instance.
//!
//! ## Cycle Outcome Table
//! | Phases | Record phase | Decisions | Actions | Counter |
//! |--------|--------------|-----------|---------|---------|
//! | all five succeed | `COMPLETE` | from Plan | from Execute | `successful_cycles` |
//! | any phase fails | `ERROR` | one failure description | empty | `failed_cycles` |
//!
//! ## Locking
//!
//! The whole cycle runs under a single `tokio::sync::Mutex`; a second caller
//! waits at acquisition until the first cycle has been recorded. Counters,
//! gauges and history use their own locks, so accessors never wait on the
//! cycle lock and may observe a cycle half-recorded. [`MapekLoop::reset_metrics`]
//! deliberately does not take the cycle lock either.
//!
//! There is no timeout: a policy call that never returns holds the cycle
//! lock forever.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::domain::cycle::{
    CycleContext, CycleMetrics, CyclePhase, CycleSnapshot, CycleState, LoopId, SystemMetrics,
    DEFAULT_MAX_HISTORY_SIZE,
};
use crate::domain::events::CycleEvent;
use crate::domain::loop_config::LoopConfigSpec;
use crate::domain::phases::{
    AnalysisResult, CycleError, ExecuteResult, KnowledgeResult, LoopPhase, MonitorResult,
    PhaseOutputs, PlanResult,
};
use crate::domain::policy::{ControlPolicy, ThresholdPolicy};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::history::HistoryBuffer;
use crate::infrastructure::stats::{AtomicCounter, AtomicFloat, StatsSnapshot, ThreadSafeMetrics};

/// Loop-level counters at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    pub component: String,
    /// Gauge code of the phase currently running (0 when idle).
    pub current_phase: f64,
    pub cycle_count: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    /// Seconds taken by the last successful cycle.
    pub last_cycle_duration: f64,
    /// `successful / (successful + failed)`, `0.0` before any cycle.
    pub success_rate: f64,
}

/// Registry snapshot combined with the loop-level counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopMetricsSnapshot {
    pub loop_id: LoopId,
    pub stats: StatsSnapshot,
    pub state: LoopState,
}

pub struct MapekLoop {
    id: LoopId,
    component_name: String,
    metrics: Arc<ThreadSafeMetrics>,
    policy: Arc<dyn ControlPolicy>,
    event_bus: Option<EventBus>,
    cycle_lock: Mutex<()>,
    history: HistoryBuffer<Arc<CycleState>>,
    cycle_count: AtomicCounter,
    successful_cycles: AtomicCounter,
    failed_cycles: AtomicCounter,
    current_phase: AtomicFloat,
    last_cycle_time: AtomicFloat,
}

impl MapekLoop {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self::with_max_history_size(component_name, DEFAULT_MAX_HISTORY_SIZE)
    }

    pub fn with_max_history_size(component_name: impl Into<String>, max_history_size: usize) -> Self {
        let component_name = component_name.into();
        let metrics = Arc::new(ThreadSafeMetrics::new(component_name.clone()));
        metrics.set_gauge("current_phase", 0.0);
        metrics.set_gauge("last_cycle_duration", 0.0);

        Self {
            id: LoopId::new(),
            component_name,
            metrics,
            policy: Arc::new(ThresholdPolicy::default()),
            event_bus: None,
            cycle_lock: Mutex::new(()),
            history: HistoryBuffer::new(max_history_size),
            cycle_count: AtomicCounter::new(),
            successful_cycles: AtomicCounter::new(),
            failed_cycles: AtomicCounter::new(),
            current_phase: AtomicFloat::default(),
            last_cycle_time: AtomicFloat::default(),
        }
    }

    /// Build a loop from the `spec` section of a configuration manifest.
    pub fn from_config(spec: &LoopConfigSpec) -> Self {
        Self::with_max_history_size(
            spec.loop_settings.component_name.clone(),
            spec.loop_settings.max_history_size,
        )
        .with_policy(Arc::new(ThresholdPolicy::new(spec.thresholds)))
    }

    pub fn with_policy(mut self, policy: Arc<dyn ControlPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn id(&self) -> LoopId {
        self.id
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    pub fn metrics(&self) -> &Arc<ThreadSafeMetrics> {
        &self.metrics
    }

    pub fn max_history_size(&self) -> usize {
        self.history.max_size()
    }

    /// Run one full cycle. Never fails: a phase error yields an `ERROR` record.
    pub async fn execute_cycle(
        &self,
        system_metrics: SystemMetrics,
        context: CycleContext,
    ) -> Arc<CycleState> {
        let _cycle_guard = self.cycle_lock.lock().await;

        let started = Instant::now();
        let cycle_id = self.cycle_count.increment();
        debug!(cycle_id, component = %self.component_name, "Starting MAPE-K cycle");
        self.publish(CycleEvent::CycleStarted {
            loop_id: self.id,
            cycle_id,
            started_at: Utc::now(),
        });

        let outcome = self.run_phases(&system_metrics, &context).await;
        self.enter_phase(LoopPhase::Idle);
        let duration = started.elapsed().as_secs_f64();

        match outcome {
            Ok(outputs) => self.record_success(cycle_id, system_metrics, outputs, duration),
            Err(err) => self.record_failure(cycle_id, system_metrics, err, duration),
        }
    }

    async fn run_phases(
        &self,
        system_metrics: &SystemMetrics,
        context: &CycleContext,
    ) -> Result<PhaseOutputs, CycleError> {
        self.enter_phase(LoopPhase::Monitor);
        let monitor = self.monitor(system_metrics, context).await?;

        self.enter_phase(LoopPhase::Analyze);
        let analysis = self.analyze(&monitor, context).await?;

        self.enter_phase(LoopPhase::Plan);
        let plan = self.plan(&analysis, context).await?;

        self.enter_phase(LoopPhase::Execute);
        let execute = self.execute(&plan, context).await?;

        self.enter_phase(LoopPhase::Knowledge);
        let knowledge = self.knowledge(&execute, context).await?;

        Ok(PhaseOutputs {
            monitor,
            analysis,
            plan,
            execute,
            knowledge,
        })
    }

    fn record_success(
        &self,
        cycle_id: u64,
        system_metrics: SystemMetrics,
        outputs: PhaseOutputs,
        duration: f64,
    ) -> Arc<CycleState> {
        let severity = outputs.analysis.severity;
        let decisions = outputs.plan.decisions.clone();
        let actions = outputs.execute.actions.clone();
        let (decision_count, action_count) = (decisions.len(), actions.len());

        let state = Arc::new(CycleState::new(
            cycle_id,
            CyclePhase::Complete,
            CycleMetrics::complete(system_metrics, outputs, duration),
            decisions,
            actions,
        ));

        self.last_cycle_time.update(duration);
        self.metrics.set_gauge("last_cycle_duration", duration);
        self.successful_cycles.increment();
        self.metrics.add_recent("severity", severity.as_str());
        self.add_to_history(Arc::clone(&state));

        info!(
            cycle_id,
            duration,
            %severity,
            decisions = decision_count,
            actions = action_count,
            "MAPE-K cycle completed"
        );
        self.publish(CycleEvent::CycleCompleted {
            loop_id: self.id,
            cycle_id,
            severity,
            decisions: decision_count,
            actions: action_count,
            duration_secs: duration,
            completed_at: Utc::now(),
        });

        state
    }

    fn record_failure(
        &self,
        cycle_id: u64,
        system_metrics: SystemMetrics,
        err: CycleError,
        duration: f64,
    ) -> Arc<CycleState> {
        let reason = err.to_string();
        let state = Arc::new(CycleState::new(
            cycle_id,
            CyclePhase::Error,
            CycleMetrics::Failed {
                system: system_metrics,
                error: reason.clone(),
                duration,
            },
            vec![format!("Cycle failed: {reason}")],
            Vec::new(),
        ));

        self.failed_cycles.increment();
        self.metrics.add_recent("errors", reason.clone());
        self.add_to_history(Arc::clone(&state));

        error!(cycle_id, phase = %err.phase(), error = %err, "MAPE-K cycle failed");
        self.publish(CycleEvent::CycleFailed {
            loop_id: self.id,
            cycle_id,
            phase: err.phase(),
            kind: err.kind().to_string(),
            reason,
            failed_at: Utc::now(),
        });

        state
    }

    fn enter_phase(&self, phase: LoopPhase) {
        self.current_phase.update(phase.code());
        self.metrics.set_gauge("current_phase", phase.code());
    }

    fn publish(&self, event: CycleEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.publish(event);
        }
    }

    async fn monitor(
        &self,
        system_metrics: &SystemMetrics,
        _context: &CycleContext,
    ) -> Result<MonitorResult, CycleError> {
        self.metrics.increment_counter("monitor_cycles");

        // Readings are taken as given; NaN health compares false against
        // both thresholds and classifies as NORMAL.
        for (name, value) in system_metrics {
            self.metrics.set_gauge(&format!("monitor_{name}"), *value);
        }

        Ok(MonitorResult {
            timestamp: Utc::now(),
            metrics_collected: system_metrics.len(),
            system_health: system_metrics.get("health").copied().unwrap_or(0.0),
        })
    }

    async fn analyze(
        &self,
        monitor: &MonitorResult,
        context: &CycleContext,
    ) -> Result<AnalysisResult, CycleError> {
        self.metrics.increment_counter("analyze_cycles");

        let health = monitor.system_health;
        let severity = self.policy.classify(health, context).await?;
        self.metrics.set_gauge("severity", severity.code());

        Ok(AnalysisResult {
            severity,
            action_required: severity.requires_action(),
            health,
            timestamp: Utc::now(),
        })
    }

    async fn plan(
        &self,
        analysis: &AnalysisResult,
        context: &CycleContext,
    ) -> Result<PlanResult, CycleError> {
        self.metrics.increment_counter("plan_cycles");

        let decisions = self.policy.plan(analysis.severity, context).await?;
        for decision in &decisions {
            self.metrics.add_to_set("decisions_made", decision);
        }

        Ok(PlanResult {
            decisions,
            timestamp: Utc::now(),
            estimated_impact: analysis.severity.impact(),
        })
    }

    async fn execute(
        &self,
        plan: &PlanResult,
        context: &CycleContext,
    ) -> Result<ExecuteResult, CycleError> {
        self.metrics.increment_counter("execute_cycles");

        let mut actions = Vec::with_capacity(plan.decisions.len());
        for decision in &plan.decisions {
            let outcome = self.policy.execute(decision, context).await?;
            if let Some(counter) = &outcome.counter {
                self.metrics.increment_counter(counter);
            }
            actions.push(outcome.action);
        }

        let actions_executed = actions
            .iter()
            .filter(|action| !action.starts_with("No action"))
            .count();

        Ok(ExecuteResult {
            actions,
            timestamp: Utc::now(),
            actions_executed,
        })
    }

    async fn knowledge(
        &self,
        execute: &ExecuteResult,
        context: &CycleContext,
    ) -> Result<KnowledgeResult, CycleError> {
        self.metrics.increment_counter("knowledge_cycles");

        let mut learnings = Vec::new();
        for action in &execute.actions {
            if let Some(learning) = self.policy.learn(action, context).await? {
                self.metrics.add_to_set(&learning.pattern_set, &learning.pattern);
                learnings.push(learning.note);
            }
        }

        Ok(KnowledgeResult {
            learnings_recorded: learnings.len(),
            learnings,
            timestamp: Utc::now(),
        })
    }

    fn add_to_history(&self, state: Arc<CycleState>) {
        self.history.push(state);
    }

    pub fn get_current_state(&self) -> LoopState {
        let successful = self.successful_cycles.get();
        let failed = self.failed_cycles.get();
        let total = successful + failed;
        let success_rate = if total == 0 {
            0.0
        } else {
            successful as f64 / total as f64
        };

        LoopState {
            component: self.component_name.clone(),
            current_phase: self.current_phase.get(),
            cycle_count: self.cycle_count.get(),
            successful_cycles: successful,
            failed_cycles: failed,
            last_cycle_duration: self.last_cycle_time.get(),
            success_rate,
        }
    }

    pub fn get_metrics_snapshot(&self) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot {
            loop_id: self.id,
            stats: self.metrics.get_stats_snapshot(),
            state: self.get_current_state(),
        }
    }

    /// Up to `limit` most recent cycles, oldest first.
    pub fn get_recent_history(&self, limit: usize) -> Vec<CycleSnapshot> {
        self.history
            .recent(limit)
            .iter()
            .map(|state| state.snapshot())
            .collect()
    }

    /// Zero every counter and gauge and clear history.
    ///
    /// Does not take the cycle lock: a cycle in flight keeps running and may
    /// bump counters or append history after the reset.
    pub fn reset_metrics(&self) {
        self.cycle_count.reset();
        self.successful_cycles.reset();
        self.failed_cycles.reset();
        self.current_phase.reset();
        self.last_cycle_time.reset();
        self.metrics.reset_all();
        self.history.clear();

        info!(component = %self.component_name, "MAPE-K loop metrics reset");
        self.publish(CycleEvent::MetricsReset {
            loop_id: self.id,
            reset_at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for MapekLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapekLoop")
            .field("id", &self.id)
            .field("component_name", &self.component_name)
            .field("max_history_size", &self.history.max_size())
            .finish_non_exhaustive()
    }
}
