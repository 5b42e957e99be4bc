// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod stats;
pub mod history;
pub mod event_bus;
pub mod metrics_source;

pub use event_bus::{EventBus, EventBusError, EventReceiver, LoopEventReceiver};
pub use metrics_source::{FileMetricsSource, MetricsSource, MetricsSourceError, StaticMetricsSource};
pub use stats::{AtomicCounter, AtomicFloat, StatsRegistry, ThreadSafeMetrics};
