// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Control Policy
//!
//! The decision-making seam of the loop. The orchestrator owns sequencing,
//! locking and bookkeeping; a [`ControlPolicy`] owns what the Analyze, Plan,
//! Execute and Knowledge phases actually conclude.
//!
//! [`ThresholdPolicy`] is the stock implementation: a three-tier health
//! classifier, a fixed severity → decision table, and keyword matching for
//! actions and learnings.
//!
//! ## Decision Table
//! | Severity | Health | Decisions |
//! |----------|--------|-----------|
//! | `CRITICAL` | `< critical_below` | Initiate emergency recovery, Scale up resources |
//! | `WARNING` | `< warning_below` | Increase monitoring frequency, Prep recovery procedures |
//! | `NORMAL` | otherwise | Continue normal operations |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::cycle::CycleContext;
use crate::domain::phases::{CycleError, Severity};

/// Outcome of executing one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: String,
    /// Counter bumped on the loop's metrics registry, if any.
    pub counter: Option<String>,
}

impl ActionOutcome {
    pub fn new(action: impl Into<String>, counter: Option<&str>) -> Self {
        Self {
            action: action.into(),
            counter: counter.map(str::to_string),
        }
    }

    pub fn no_action() -> Self {
        Self::new(NO_ACTION, None)
    }
}

/// A learning derived from an executed action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Learning {
    pub note: String,
    /// Set metric the pattern is recorded into.
    pub pattern_set: String,
    pub pattern: String,
}

pub const NO_ACTION: &str = "No action required";

#[async_trait]
pub trait ControlPolicy: Send + Sync {
    async fn classify(&self, health: f64, context: &CycleContext) -> Result<Severity, CycleError>;

    async fn plan(&self, severity: Severity, context: &CycleContext)
        -> Result<Vec<String>, CycleError>;

    async fn execute(&self, decision: &str, context: &CycleContext)
        -> Result<ActionOutcome, CycleError>;

    async fn learn(&self, action: &str, context: &CycleContext)
        -> Result<Option<Learning>, CycleError>;
}

/// Health cut-offs for the three severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityThresholds {
    /// Health strictly below this is `CRITICAL`.
    #[serde(default = "default_critical_below")]
    pub critical_below: f64,

    /// Health strictly below this (and not critical) is `WARNING`.
    #[serde(default = "default_warning_below")]
    pub warning_below: f64,
}

fn default_critical_below() -> f64 {
    0.3
}

fn default_warning_below() -> f64 {
    0.7
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical_below: default_critical_below(),
            warning_below: default_warning_below(),
        }
    }
}

impl SeverityThresholds {
    pub fn classify(&self, health: f64) -> Severity {
        if health < self.critical_below {
            Severity::Critical
        } else if health < self.warning_below {
            Severity::Warning
        } else {
            Severity::Normal
        }
    }
}

/// Fixed-table policy driven by [`SeverityThresholds`].
#[derive(Debug, Clone, Default)]
pub struct ThresholdPolicy {
    thresholds: SeverityThresholds,
}

impl ThresholdPolicy {
    pub fn new(thresholds: SeverityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> SeverityThresholds {
        self.thresholds
    }
}

#[async_trait]
impl ControlPolicy for ThresholdPolicy {
    async fn classify(&self, health: f64, _context: &CycleContext) -> Result<Severity, CycleError> {
        Ok(self.thresholds.classify(health))
    }

    async fn plan(
        &self,
        severity: Severity,
        _context: &CycleContext,
    ) -> Result<Vec<String>, CycleError> {
        let decisions: &[&str] = match severity {
            Severity::Critical => &["Initiate emergency recovery", "Scale up resources"],
            Severity::Warning => &["Increase monitoring frequency", "Prep recovery procedures"],
            Severity::Normal => &["Continue normal operations"],
        };
        Ok(decisions.iter().map(|d| d.to_string()).collect())
    }

    async fn execute(
        &self,
        decision: &str,
        _context: &CycleContext,
    ) -> Result<ActionOutcome, CycleError> {
        let decision = decision.to_lowercase();
        let outcome = if decision.contains("emergency") {
            ActionOutcome::new("Emergency recovery initiated", Some("emergency_executions"))
        } else if decision.contains("scale") {
            ActionOutcome::new("Resource scaling initiated", Some("scaling_executions"))
        } else if decision.contains("monitoring") {
            ActionOutcome::new("Monitoring frequency increased", Some("monitoring_adjustments"))
        } else {
            ActionOutcome::no_action()
        };
        Ok(outcome)
    }

    async fn learn(
        &self,
        action: &str,
        _context: &CycleContext,
    ) -> Result<Option<Learning>, CycleError> {
        let lowered = action.to_lowercase();
        let learning = if lowered.contains("recovery") {
            Some(Learning {
                note: format!("Recovery pattern observed: {action}"),
                pattern_set: "recovery_patterns".to_string(),
                pattern: action.to_string(),
            })
        } else if lowered.contains("scaling") {
            Some(Learning {
                note: format!("Scaling pattern observed: {action}"),
                pattern_set: "scaling_patterns".to_string(),
                pattern: action.to_string(),
            })
        } else {
            None
        };
        Ok(learning)
    }
}
