// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod mapek_loop;
pub mod monitor_runner;

pub use mapek_loop::{LoopMetricsSnapshot, LoopState, MapekLoop};
pub use monitor_runner::{MonitorRunner, MonitorRunnerConfig};
