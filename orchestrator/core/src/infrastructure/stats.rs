// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Thread-Safe Statistics
//!
//! Lock-light counters, gauges, string sets and bounded recent series shared
//! between the MAPE-K loop, its accessors and any observer thread.
//!
//! - [`AtomicCounter`] / [`AtomicFloat`] - single scalar slots backed by
//!   `AtomicU64` (floats are stored as their bit pattern).
//! - [`ThreadSafeMetrics`] - a named registry of counters, gauges, sets and
//!   recent series for one component. Every counter and gauge update is also
//!   mirrored into the `metrics` facade so an installed exporter sees it.
//! - [`StatsRegistry`] - an explicit registry of component metrics, owned by
//!   whoever wires the process together (there is no global instance).
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Thread-safe metric primitives for the control loop

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Maximum number of entries retained per recent series.
pub const RECENT_SERIES_CAPACITY: usize = 100;

/// Monotonic counter.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by one and return the new value.
    pub fn increment(&self) -> u64 {
        self.increment_by(1)
    }

    /// Increment by `n` and return the new value.
    pub fn increment_by(&self, n: u64) -> u64 {
        self.value.fetch_add(n, Ordering::SeqCst) + n
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Zero the counter and return the value it held.
    pub fn reset(&self) -> u64 {
        self.value.swap(0, Ordering::SeqCst)
    }
}

/// `f64` slot with overwrite semantics.
#[derive(Debug)]
pub struct AtomicFloat {
    bits: AtomicU64,
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl AtomicFloat {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    /// Overwrite the value and return it.
    pub fn update(&self, value: f64) -> f64 {
        self.bits.store(value.to_bits(), Ordering::SeqCst);
        value
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: f64) -> f64 {
        let mut current = self.bits.load(Ordering::SeqCst);
        loop {
            let next = f64::from_bits(current) + delta;
            match self.bits.compare_exchange_weak(
                current,
                next.to_bits(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }

    pub fn reset(&self) {
        self.update(0.0);
    }
}

/// Point-in-time view of a [`ThreadSafeMetrics`] registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub component: String,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, f64>,
    /// Set sizes keyed by set name.
    pub sets: BTreeMap<String, usize>,
    /// Recent series lengths keyed by series name.
    pub recent_series: BTreeMap<String, usize>,
    pub last_update: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    counters: HashMap<String, Arc<AtomicCounter>>,
    gauges: HashMap<String, Arc<AtomicFloat>>,
    sets: HashMap<String, HashSet<String>>,
    recent: HashMap<String, VecDeque<(DateTime<Utc>, String)>>,
    last_update: Option<DateTime<Utc>>,
}

/// Named metric registry for a single component.
pub struct ThreadSafeMetrics {
    component_name: String,
    inner: RwLock<Registry>,
}

impl ThreadSafeMetrics {
    pub fn new(component_name: impl Into<String>) -> Self {
        Self {
            component_name: component_name.into(),
            inner: RwLock::new(Registry::default()),
        }
    }

    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    fn counter(&self, name: &str) -> Arc<AtomicCounter> {
        if let Some(counter) = self.inner.read().counters.get(name) {
            return Arc::clone(counter);
        }
        let mut inner = self.inner.write();
        Arc::clone(inner.counters.entry(name.to_string()).or_default())
    }

    fn gauge(&self, name: &str) -> Arc<AtomicFloat> {
        if let Some(gauge) = self.inner.read().gauges.get(name) {
            return Arc::clone(gauge);
        }
        let mut inner = self.inner.write();
        Arc::clone(inner.gauges.entry(name.to_string()).or_default())
    }

    fn touch(&self) {
        self.inner.write().last_update = Some(Utc::now());
    }

    /// Increment a counter by one and return its new value.
    pub fn increment_counter(&self, name: &str) -> u64 {
        self.increment_counter_by(name, 1)
    }

    pub fn increment_counter_by(&self, name: &str, n: u64) -> u64 {
        let value = self.counter(name).increment_by(n);
        self.touch();
        metrics::counter!(
            format!("mapek_{name}_total"),
            "component" => self.component_name.clone()
        )
        .increment(n);
        value
    }

    /// Current counter value, `0` when the counter was never touched.
    pub fn get_counter(&self, name: &str) -> u64 {
        self.inner
            .read()
            .counters
            .get(name)
            .map_or(0, |counter| counter.get())
    }

    /// Overwrite a gauge and return the stored value.
    pub fn set_gauge(&self, name: &str, value: f64) -> f64 {
        self.gauge(name).update(value);
        self.touch();
        metrics::gauge!(
            format!("mapek_{name}"),
            "component" => self.component_name.clone()
        )
        .set(value);
        value
    }

    /// Current gauge value, `0.0` when the gauge was never set.
    pub fn get_gauge(&self, name: &str) -> f64 {
        self.inner
            .read()
            .gauges
            .get(name)
            .map_or(0.0, |gauge| gauge.get())
    }

    /// Add `value` to a named set. Returns `false` if it was already present.
    pub fn add_to_set(&self, name: &str, value: &str) -> bool {
        let mut inner = self.inner.write();
        let inserted = inner
            .sets
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string());
        inner.last_update = Some(Utc::now());
        inserted
    }

    /// Remove `value` from a named set. Returns `false` if it was absent.
    pub fn remove_from_set(&self, name: &str, value: &str) -> bool {
        let mut inner = self.inner.write();
        let removed = inner
            .sets
            .get_mut(name)
            .is_some_and(|set| set.remove(value));
        if removed {
            inner.last_update = Some(Utc::now());
        }
        removed
    }

    pub fn get_set_size(&self, name: &str) -> usize {
        self.inner.read().sets.get(name).map_or(0, HashSet::len)
    }

    pub fn get_set_items(&self, name: &str) -> HashSet<String> {
        self.inner.read().sets.get(name).cloned().unwrap_or_default()
    }

    /// Append a timestamped value to a recent series, keeping the last
    /// [`RECENT_SERIES_CAPACITY`] entries.
    pub fn add_recent(&self, name: &str, value: impl Into<String>) {
        let now = Utc::now();
        let mut inner = self.inner.write();
        let series = inner.recent.entry(name.to_string()).or_default();
        series.push_back((now, value.into()));
        while series.len() > RECENT_SERIES_CAPACITY {
            series.pop_front();
        }
        inner.last_update = Some(now);
    }

    /// Up to `limit` most recent entries of a series, oldest first.
    pub fn get_recent(&self, name: &str, limit: usize) -> Vec<(DateTime<Utc>, String)> {
        let inner = self.inner.read();
        let Some(series) = inner.recent.get(name) else {
            return Vec::new();
        };
        let skip = series.len().saturating_sub(limit);
        series.iter().skip(skip).cloned().collect()
    }

    pub fn get_stats_snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read();
        StatsSnapshot {
            component: self.component_name.clone(),
            counters: inner
                .counters
                .iter()
                .map(|(name, counter)| (name.clone(), counter.get()))
                .collect(),
            gauges: inner
                .gauges
                .iter()
                .map(|(name, gauge)| (name.clone(), gauge.get()))
                .collect(),
            sets: inner
                .sets
                .iter()
                .map(|(name, set)| (name.clone(), set.len()))
                .collect(),
            recent_series: inner
                .recent
                .iter()
                .map(|(name, series)| (name.clone(), series.len()))
                .collect(),
            last_update: inner.last_update.unwrap_or_else(Utc::now),
        }
    }

    /// Zero every counter and gauge and drop all sets and series.
    ///
    /// Counter and gauge slots stay registered so existing handles observe
    /// the reset.
    pub fn reset_all(&self) {
        let mut inner = self.inner.write();
        for counter in inner.counters.values() {
            counter.reset();
        }
        for (name, gauge) in &inner.gauges {
            gauge.reset();
            metrics::gauge!(
                format!("mapek_{name}"),
                "component" => self.component_name.clone()
            )
            .set(0.0);
        }
        inner.sets.clear();
        inner.recent.clear();
        inner.last_update = Some(Utc::now());
    }
}

impl std::fmt::Debug for ThreadSafeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadSafeMetrics")
            .field("component_name", &self.component_name)
            .finish_non_exhaustive()
    }
}

/// Explicit registry of per-component metrics.
#[derive(Debug, Default, Clone)]
pub struct StatsRegistry {
    components: Arc<RwLock<BTreeMap<String, Arc<ThreadSafeMetrics>>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `metrics` under `id`, replacing any previous entry.
    pub fn register(&self, id: impl Into<String>, metrics: Arc<ThreadSafeMetrics>) {
        self.components.write().insert(id.into(), metrics);
    }

    pub fn get(&self, id: &str) -> Option<Arc<ThreadSafeMetrics>> {
        self.components.read().get(id).cloned()
    }

    pub fn snapshot_all(&self) -> BTreeMap<String, StatsSnapshot> {
        self.components
            .read()
            .iter()
            .map(|(id, metrics)| (id.clone(), metrics.get_stats_snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use std::thread;

    #[test]
    fn test_counter_increment_and_reset() {
        let counter = AtomicCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.increment_by(5), 7);

        assert_eq!(counter.reset(), 7);
        assert_eq!(counter.get(), 0);

        counter.set(42);
        assert_eq!(counter.get(), 42);
    }

    #[test]
    fn test_counter_concurrent_increments() {
        let counter = Arc::new(AtomicCounter::new());
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get(), 500);
    }

    #[test]
    fn test_float_update_and_add() {
        let value = AtomicFloat::default();
        assert_eq!(value.get(), 0.0);
        assert_eq!(value.update(42.5), 42.5);
        assert_eq!(value.add(0.5), 43.0);
        value.reset();
        assert_eq!(value.get(), 0.0);
    }

    #[test]
    fn test_float_concurrent_adds() {
        let value = Arc::new(AtomicFloat::default());
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let value = Arc::clone(&value);
                thread::spawn(move || {
                    for _ in 0..100 {
                        value.add(1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(value.get(), 500.0);
    }

    #[test]
    fn test_metrics_defaults_for_unknown_names() {
        let metrics = ThreadSafeMetrics::new("test_component");
        assert_eq!(metrics.component_name(), "test_component");
        assert_eq!(metrics.get_counter("missing"), 0);
        assert_eq!(metrics.get_gauge("missing"), 0.0);
        assert_eq!(metrics.get_set_size("missing"), 0);
        assert!(metrics.get_recent("missing", 10).is_empty());
    }

    #[test]
    fn test_sets_reject_duplicates() {
        let metrics = ThreadSafeMetrics::new("test_component");
        assert!(metrics.add_to_set("decisions", "a"));
        assert!(!metrics.add_to_set("decisions", "a"));
        assert!(metrics.add_to_set("decisions", "b"));
        assert_eq!(metrics.get_set_size("decisions"), 2);

        assert!(metrics.remove_from_set("decisions", "a"));
        assert!(!metrics.remove_from_set("decisions", "a"));
        assert_eq!(
            metrics.get_set_items("decisions"),
            HashSet::from(["b".to_string()])
        );
    }

    #[test]
    fn test_recent_series_is_bounded() {
        let metrics = ThreadSafeMetrics::new("test_component");
        for i in 0..(RECENT_SERIES_CAPACITY + 20) {
            metrics.add_recent("latency", format!("value{i}"));
        }

        let all = metrics.get_recent("latency", usize::MAX);
        assert_eq!(all.len(), RECENT_SERIES_CAPACITY);
        assert_eq!(all[0].1, "value20");

        let last_five = metrics.get_recent("latency", 5);
        assert_eq!(last_five.len(), 5);
        assert_eq!(last_five[4].1, format!("value{}", RECENT_SERIES_CAPACITY + 19));
    }

    #[test]
    fn test_snapshot_and_reset_all() {
        let metrics = ThreadSafeMetrics::new("test_component");
        metrics.increment_counter_by("cycles", 5);
        metrics.set_gauge("phase", 3.0);
        metrics.add_to_set("patterns", "scaling");
        metrics.add_recent("series", "v");

        let snapshot = metrics.get_stats_snapshot();
        assert_eq!(snapshot.component, "test_component");
        assert_eq!(snapshot.counters["cycles"], 5);
        assert_eq!(snapshot.gauges["phase"], 3.0);
        assert_eq!(snapshot.sets["patterns"], 1);
        assert_eq!(snapshot.recent_series["series"], 1);

        metrics.reset_all();
        let snapshot = metrics.get_stats_snapshot();
        assert_eq!(snapshot.counters["cycles"], 0);
        assert_eq!(snapshot.gauges["phase"], 0.0);
        assert!(snapshot.sets.is_empty());
        assert!(snapshot.recent_series.is_empty());
    }

    #[test]
    fn test_reset_all_zeroes_exported_gauges() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let stats = ThreadSafeMetrics::new("exported");

        metrics::with_local_recorder(&recorder, || {
            stats.set_gauge("severity", 2.0);
            stats.reset_all();
        });

        let exported = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find_map(|(key, _, _, value)| (key.key().name() == "mapek_severity").then_some(value));
        assert_eq!(exported, Some(DebugValue::Gauge(0.0.into())));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = StatsRegistry::new();
        registry.register("loop-a", Arc::new(ThreadSafeMetrics::new("a")));
        registry.register("loop-b", Arc::new(ThreadSafeMetrics::new("b")));

        assert_eq!(registry.get("loop-a").unwrap().component_name(), "a");
        assert!(registry.get("loop-c").is_none());
        assert_eq!(registry.snapshot_all().len(), 2);
    }
}
