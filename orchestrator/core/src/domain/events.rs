// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cycle::LoopId;
use crate::domain::phases::{LoopPhase, Severity};

/// Cycle lifecycle events published by a loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CycleEvent {
    CycleStarted {
        loop_id: LoopId,
        cycle_id: u64,
        started_at: DateTime<Utc>,
    },
    CycleCompleted {
        loop_id: LoopId,
        cycle_id: u64,
        severity: Severity,
        decisions: usize,
        actions: usize,
        duration_secs: f64,
        completed_at: DateTime<Utc>,
    },
    CycleFailed {
        loop_id: LoopId,
        cycle_id: u64,
        phase: LoopPhase,
        kind: String,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    MetricsReset {
        loop_id: LoopId,
        reset_at: DateTime<Utc>,
    },
}

impl CycleEvent {
    pub fn loop_id(&self) -> LoopId {
        match self {
            Self::CycleStarted { loop_id, .. }
            | Self::CycleCompleted { loop_id, .. }
            | Self::CycleFailed { loop_id, .. }
            | Self::MetricsReset { loop_id, .. } => *loop_id,
        }
    }

    pub fn cycle_id(&self) -> Option<u64> {
        match self {
            Self::CycleStarted { cycle_id, .. }
            | Self::CycleCompleted { cycle_id, .. }
            | Self::CycleFailed { cycle_id, .. } => Some(*cycle_id),
            Self::MetricsReset { .. } => None,
        }
    }
}
