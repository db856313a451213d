// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-alias replay log for index rebuilds.
//!
//! Mutations applied while a rebuild is running are appended here so the
//! new index can catch up before it goes live. Each alias keeps its own
//! bounded, insertion-ordered log; draining hands the records out exactly
//! once.

use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::warn;

use crate::backend::BulkOp;

/// Bounded, insertion-ordered mutation log per index alias.
pub struct ReplayLog {
    logs: DashMap<String, VecDeque<BulkOp>>,
    capacity: usize,
}

impl ReplayLog {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            logs: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a mutation record. When the alias log is full the oldest
    /// record is evicted; a rebuild replaying the remainder still re-reads
    /// ground truth for everything older.
    pub fn append(&self, alias: &str, op: BulkOp) {
        let mut log = self.logs.entry(alias.to_string()).or_default();
        if log.len() == self.capacity {
            log.pop_front();
            warn!(alias, capacity = self.capacity, "replay log full, evicting oldest record");
        }
        log.push_back(op);
    }

    /// Remove and return all records for an alias, oldest first.
    #[must_use]
    pub fn drain(&self, alias: &str) -> Vec<BulkOp> {
        self.logs
            .remove(alias)
            .map(|(_, log)| log.into_iter().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self, alias: &str) -> usize {
        self.logs.get(alias).map_or(0, |log| log.len())
    }

    #[must_use]
    pub fn is_empty(&self, alias: &str) -> bool {
        self.len(alias) == 0
    }
}
