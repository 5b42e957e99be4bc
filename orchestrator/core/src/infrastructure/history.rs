// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bounded cycle history.
//!
//! Count-bounded FIFO guarded by its own lock, independent of the cycle lock.
//! When a push takes the buffer past its capacity the oldest entries are
//! dropped until exactly `max_size` remain.

use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::domain::cycle::DEFAULT_MAX_HISTORY_SIZE;

#[derive(Debug)]
pub struct HistoryBuffer<T> {
    entries: Mutex<VecDeque<T>>,
    max_size: usize,
}

impl<T: Clone> HistoryBuffer<T> {
    /// A capacity of zero is raised to one.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_size.min(DEFAULT_MAX_HISTORY_SIZE))),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn push(&self, entry: T) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        while entries.len() > self.max_size {
            entries.pop_front();
        }
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<T> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<T: Clone> Default for HistoryBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_SIZE)
    }
}
