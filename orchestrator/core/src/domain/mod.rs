// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure types for the control loop. No I/O apart from configuration file
//! loading in [`loop_config`].
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`cycle`] | `CycleState`, `CycleSnapshot`, `CycleMetrics`, `LoopId` |
//! | [`phases`] | `MonitorResult` … `KnowledgeResult`, `Severity`, `CycleError` |
//! | [`policy`] | `ControlPolicy`, `ThresholdPolicy`, `SeverityThresholds` |
//! | [`events`] | `CycleEvent` |
//! | [`loop_config`] | `LoopConfigManifest` |

pub mod cycle;
pub mod phases;
pub mod policy;
pub mod events;
pub mod loop_config;

pub use cycle::*;
pub use phases::*;
pub use policy::*;
pub use events::*;
