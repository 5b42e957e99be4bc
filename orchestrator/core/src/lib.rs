// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `mapek-core` - MAPE-K Autonomic Control Loop
//!
//! Monitor → Analyze → Plan → Execute → Knowledge, one cycle at a time, with
//! thread-safe counters and a bounded cycle history.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `CycleState`, phase results, `ControlPolicy`, config manifest, events |
//! | [`application`] | Application | `MapekLoop` orchestrator, `MonitorRunner` |
//! | [`infrastructure`] | Infrastructure | metrics registry, history buffer, event bus, metrics sources |

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{LoopMetricsSnapshot, LoopState, MapekLoop, MonitorRunner, MonitorRunnerConfig};
