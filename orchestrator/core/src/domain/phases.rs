// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Phase Results
//!
//! Value objects produced by the five MAPE-K phases. Each phase consumes the
//! previous phase's result, so these types double as the hand-off contract
//! between phases.
//!
//! | Phase | Result | Key payload |
//! |-------|--------|-------------|
//! | Monitor | [`MonitorResult`] | metric count, `system_health` |
//! | Analyze | [`AnalysisResult`] | [`Severity`], action-required flag |
//! | Plan | [`PlanResult`] | decision strings, [`Impact`] |
//! | Execute | [`ExecuteResult`] | action strings |
//! | Knowledge | [`KnowledgeResult`] | learning notes |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Severity tier derived from the monitored health scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Normal,
    Warning,
    Critical,
}

impl Severity {
    /// Numeric code published on the `severity` gauge.
    pub fn code(self) -> f64 {
        match self {
            Self::Normal => 0.0,
            Self::Warning => 1.0,
            Self::Critical => 2.0,
        }
    }

    pub fn requires_action(self) -> bool {
        !matches!(self, Self::Normal)
    }

    pub fn impact(self) -> Impact {
        match self {
            Self::Normal => Impact::Low,
            Self::Warning => Impact::Medium,
            Self::Critical => Impact::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated impact of a plan; mirrors [`Severity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorResult {
    pub timestamp: DateTime<Utc>,
    pub metrics_collected: usize,
    pub system_health: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub severity: Severity,
    pub action_required: bool,
    pub health: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub decisions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub estimated_impact: Impact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Actions that did more than report "No action ...".
    pub actions_executed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeResult {
    pub learnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub learnings_recorded: usize,
}

/// Everything a successful cycle produced, in phase order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseOutputs {
    pub monitor: MonitorResult,
    pub analysis: AnalysisResult,
    pub plan: PlanResult,
    pub execute: ExecuteResult,
    pub knowledge: KnowledgeResult,
}

/// Phase identifier used in error classification and the `current_phase`
/// gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Idle,
    Monitor,
    Analyze,
    Plan,
    Execute,
    Knowledge,
}

impl LoopPhase {
    /// Gauge code: 0 idle, then 1..=5 in execution order.
    pub fn code(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Monitor => 1.0,
            Self::Analyze => 2.0,
            Self::Plan => 3.0,
            Self::Execute => 4.0,
            Self::Knowledge => 5.0,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        [
            Self::Idle,
            Self::Monitor,
            Self::Analyze,
            Self::Plan,
            Self::Execute,
            Self::Knowledge,
        ]
        .into_iter()
        .find(|phase| phase.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Monitor => "monitor",
            Self::Analyze => "analyze",
            Self::Plan => "plan",
            Self::Execute => "execute",
            Self::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single cycle. Never escapes `execute_cycle`; it is folded
/// into an `ERROR` cycle record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    #[error("Control policy failed during {phase}: {message}")]
    Policy { phase: LoopPhase, message: String },
}

impl CycleError {
    pub fn policy(phase: LoopPhase, message: impl Into<String>) -> Self {
        Self::Policy {
            phase,
            message: message.into(),
        }
    }

    /// Short classification label carried on failure events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Policy { .. } => "policy",
        }
    }

    /// Phase the failure originated in.
    pub fn phase(&self) -> LoopPhase {
        match self {
            Self::Policy { phase, .. } => *phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_codes_and_impact() {
        assert_eq!(Severity::Normal.code(), 0.0);
        assert_eq!(Severity::Warning.code(), 1.0);
        assert_eq!(Severity::Critical.code(), 2.0);

        assert!(!Severity::Normal.requires_action());
        assert!(Severity::Warning.requires_action());
        assert_eq!(Severity::Critical.impact(), Impact::High);
    }

    #[test]
    fn test_severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert_eq!(serde_json::to_string(&Impact::Medium).unwrap(), "\"medium\"");
    }

    #[test]
    fn test_loop_phase_codes_round_trip() {
        assert_eq!(LoopPhase::from_code(3.0), Some(LoopPhase::Plan));
        assert_eq!(LoopPhase::from_code(0.0), Some(LoopPhase::Idle));
        assert_eq!(LoopPhase::from_code(9.0), None);
    }

    #[test]
    fn test_cycle_error_classification() {
        let err = CycleError::policy(LoopPhase::Execute, "actuator offline");
        assert_eq!(err.kind(), "policy");
        assert_eq!(err.phase(), LoopPhase::Execute);
        assert_eq!(
            err.to_string(),
            "Control policy failed during execute: actuator offline"
        );
    }
}
