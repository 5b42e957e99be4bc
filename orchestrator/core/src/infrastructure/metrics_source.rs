// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Metrics sources feeding the Monitor phase.
//!
//! A [`MetricsSource`] is polled once per scheduled cycle by the monitoring
//! runner. Source failures are the runner's concern and never reach the
//! cycle itself.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::domain::cycle::SystemMetrics;

#[derive(Debug, Error)]
pub enum MetricsSourceError {
    #[error("Failed to read metrics from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse metrics from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Metrics source unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Short label placed in the cycle context as `monitoring_type`.
    fn kind(&self) -> &str;

    async fn collect(&self) -> Result<SystemMetrics, MetricsSourceError>;
}

/// Returns the same metrics on every poll.
#[derive(Debug, Clone, Default)]
pub struct StaticMetricsSource {
    metrics: SystemMetrics,
}

impl StaticMetricsSource {
    pub fn new(metrics: SystemMetrics) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl MetricsSource for StaticMetricsSource {
    fn kind(&self) -> &str {
        "static"
    }

    async fn collect(&self) -> Result<SystemMetrics, MetricsSourceError> {
        Ok(self.metrics.clone())
    }
}

/// Reads a flat `name: number` map from a YAML or JSON file on every poll,
/// so an external agent can keep rewriting it between cycles.
#[derive(Debug, Clone)]
pub struct FileMetricsSource {
    path: PathBuf,
}

impl FileMetricsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl MetricsSource for FileMetricsSource {
    fn kind(&self) -> &str {
        "file"
    }

    async fn collect(&self) -> Result<SystemMetrics, MetricsSourceError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| MetricsSourceError::Io {
                path: self.path.clone(),
                source,
            })?;

        // YAML is a superset of JSON, so one parser covers both formats.
        serde_yaml::from_str(&content).map_err(|source| MetricsSourceError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
