// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Cycle Records
//!
//! - [`LoopId`] - identity of one loop instance (UUID newtype).
//! - [`CycleState`] - the outcome of a single cycle. Terminal on construction:
//!   its [`CyclePhase`] never changes once the orchestrator returns it.
//! - [`CycleSnapshot`] - serializable, lock-free copy of a [`CycleState`].

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::domain::phases::{
    AnalysisResult, ExecuteResult, KnowledgeResult, MonitorResult, PhaseOutputs, PlanResult,
};

/// Default number of cycles retained by a loop.
pub const DEFAULT_MAX_HISTORY_SIZE: usize = 1000;

/// Named numeric system metrics fed into the Monitor phase.
pub type SystemMetrics = BTreeMap<String, f64>;

/// Free-form context handed unchanged to every phase.
pub type CycleContext = HashMap<String, serde_json::Value>;

/// Unique identifier for a loop instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoopId(pub Uuid);

impl LoopId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LoopId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LoopId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Terminal phase of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CyclePhase {
    Complete,
    Error,
}

/// Per-cycle metrics map.
///
/// Serializes as a flat object keyed `system`/`monitor`/`analysis`/`plan`/
/// `execute`/`knowledge`/`duration` for completed cycles and
/// `system`/`error`/`duration` for failed ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CycleMetrics {
    Complete {
        system: SystemMetrics,
        monitor: MonitorResult,
        analysis: AnalysisResult,
        plan: PlanResult,
        execute: ExecuteResult,
        knowledge: KnowledgeResult,
        duration: f64,
    },
    Failed {
        system: SystemMetrics,
        error: String,
        duration: f64,
    },
}

impl CycleMetrics {
    pub fn complete(system: SystemMetrics, outputs: PhaseOutputs, duration: f64) -> Self {
        let PhaseOutputs {
            monitor,
            analysis,
            plan,
            execute,
            knowledge,
        } = outputs;
        Self::Complete {
            system,
            monitor,
            analysis,
            plan,
            execute,
            knowledge,
            duration,
        }
    }

    pub fn system(&self) -> &SystemMetrics {
        match self {
            Self::Complete { system, .. } | Self::Failed { system, .. } => system,
        }
    }

    /// Wall-clock seconds the cycle took.
    pub fn duration(&self) -> f64 {
        match self {
            Self::Complete { duration, .. } | Self::Failed { duration, .. } => *duration,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::Complete { .. } => None,
        }
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match self {
            Self::Complete { analysis, .. } => Some(analysis),
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Default)]
struct CycleEntries {
    decisions: Vec<String>,
    actions: Vec<String>,
}

/// Outcome of one MAPE-K cycle.
#[derive(Debug)]
pub struct CycleState {
    cycle_id: u64,
    phase: CyclePhase,
    timestamp: DateTime<Utc>,
    metrics: CycleMetrics,
    entries: Mutex<CycleEntries>,
}

impl CycleState {
    pub fn new(
        cycle_id: u64,
        phase: CyclePhase,
        metrics: CycleMetrics,
        decisions: Vec<String>,
        actions: Vec<String>,
    ) -> Self {
        Self {
            cycle_id,
            phase,
            timestamp: Utc::now(),
            metrics,
            entries: Mutex::new(CycleEntries { decisions, actions }),
        }
    }

    pub fn cycle_id(&self) -> u64 {
        self.cycle_id
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn is_complete(&self) -> bool {
        self.phase == CyclePhase::Complete
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metrics(&self) -> &CycleMetrics {
        &self.metrics
    }

    pub fn decisions(&self) -> Vec<String> {
        self.entries.lock().decisions.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries.lock().actions.clone()
    }

    pub fn add_decision(&self, decision: impl Into<String>) {
        self.entries.lock().decisions.push(decision.into());
    }

    pub fn add_action(&self, action: impl Into<String>) {
        self.entries.lock().actions.push(action.into());
    }

    /// Consistent copy of the record, taken under the entry lock.
    pub fn snapshot(&self) -> CycleSnapshot {
        let entries = self.entries.lock();
        CycleSnapshot {
            cycle_id: self.cycle_id,
            phase: self.phase,
            timestamp: self.timestamp,
            metrics: self.metrics.clone(),
            decisions: entries.decisions.clone(),
            actions: entries.actions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSnapshot {
    pub cycle_id: u64,
    pub phase: CyclePhase,
    pub timestamp: DateTime<Utc>,
    pub metrics: CycleMetrics,
    pub decisions: Vec<String>,
    pub actions: Vec<String>,
}
