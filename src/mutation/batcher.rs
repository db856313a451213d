// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Chunked bulk mutations.
//!
//! Large document sets are split into fixed-size chunks so one oversized
//! submission cannot stall the backend. A chunk flushes exactly when it
//! reaches the configured size, so `K` documents produce `ceil(K / C)`
//! bulk calls. Chunks already flushed stay applied even when a later chunk
//! fails; the report tells the caller exactly which documents made it.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::backend::{BulkOp, SearchBackend};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};

/// Per-document outcome of a bulk mutation, keyed by document id.
#[derive(Debug, Default)]
pub struct MutationReport {
    outcomes: HashMap<String, Option<String>>,
}

impl MutationReport {
    /// One entry per submitted document.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.values().all(Option::is_none)
    }

    /// Whether the document with this id was applied.
    #[must_use]
    pub fn succeeded(&self, id: &str) -> bool {
        matches!(self.outcomes.get(id), Some(None))
    }

    /// Failed ids with their item-level error messages.
    #[must_use]
    pub fn failures(&self) -> Vec<(String, String)> {
        let mut failures: Vec<(String, String)> = self
            .outcomes
            .iter()
            .filter_map(|(id, error)| error.as_ref().map(|e| (id.clone(), e.clone())))
            .collect();
        failures.sort();
        failures
    }

    fn record(&mut self, id: String, error: Option<String>) {
        self.outcomes.insert(id, error);
    }
}

/// Splits index and delete batches into backend-sized bulk calls.
pub struct MutationBatcher<'a> {
    backend: &'a dyn SearchBackend,
    config: &'a GatewayConfig,
}

impl<'a> MutationBatcher<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn SearchBackend, config: &'a GatewayConfig) -> Self {
        Self { backend, config }
    }

    /// Index documents in chunks of `indexing_bulk_size`.
    ///
    /// Item-level failures do not stop later chunks. With `strict` set, any
    /// item failure turns into [`GatewayError::Bulk`] after all chunks have
    /// been submitted. Transport failures abort immediately; chunks flushed
    /// before the failure stay applied.
    pub async fn index(
        &self,
        alias: &str,
        documents: Vec<(String, Value)>,
        refresh: bool,
        strict: bool,
    ) -> Result<MutationReport> {
        let chunk_size = self.config.indexing_bulk_size.max(1);
        let mut report = MutationReport::default();
        let mut chunk = Vec::with_capacity(chunk_size.min(documents.len()));

        for (id, document) in documents {
            chunk.push(BulkOp::Index { id, document });
            if chunk.len() == chunk_size {
                self.flush(alias, std::mem::take(&mut chunk), refresh, &mut report)
                    .await?;
            }
        }
        if !chunk.is_empty() {
            self.flush(alias, chunk, refresh, &mut report).await?;
        }

        self.finish(alias, report, strict)
    }

    /// Delete documents by id in chunks of `delete_chunk_size`.
    pub async fn delete(
        &self,
        alias: &str,
        ids: Vec<String>,
        refresh: bool,
        strict: bool,
    ) -> Result<MutationReport> {
        let chunk_size = self.config.delete_chunk_size.max(1);
        let mut report = MutationReport::default();

        if ids.len() == 1 {
            // Single-id removal skips the chunking machinery.
            let ops = vec![BulkOp::Delete {
                id: ids.into_iter().next().unwrap_or_default(),
            }];
            self.flush(alias, ops, refresh, &mut report).await?;
            return self.finish(alias, report, strict);
        }

        let mut chunk = Vec::with_capacity(chunk_size.min(ids.len()));
        for id in ids {
            chunk.push(BulkOp::Delete { id });
            if chunk.len() == chunk_size {
                self.flush(alias, std::mem::take(&mut chunk), refresh, &mut report)
                    .await?;
            }
        }
        if !chunk.is_empty() {
            self.flush(alias, chunk, refresh, &mut report).await?;
        }

        self.finish(alias, report, strict)
    }

    async fn flush(
        &self,
        alias: &str,
        ops: Vec<BulkOp>,
        refresh: bool,
        report: &mut MutationReport,
    ) -> Result<()> {
        debug!(alias, ops = ops.len(), refresh, "flushing bulk chunk");
        // Item outcomes from the backend may be shorter than the chunk on
        // a malformed response; unanswered ops count as failed.
        let mut answered: HashMap<String, Option<String>> = HashMap::new();
        let outcomes = self
            .backend
            .bulk(alias, ops.clone(), refresh)
            .await
            .map_err(|e| GatewayError::from_backend(alias, "bulk", e))?;
        for outcome in outcomes {
            answered.insert(outcome.id.clone(), outcome.error);
        }
        for op in &ops {
            let error = answered
                .remove(op.id())
                .unwrap_or_else(|| Some("no outcome reported by backend".to_string()));
            report.record(op.id().to_string(), error);
        }
        Ok(())
    }

    fn finish(&self, alias: &str, report: MutationReport, strict: bool) -> Result<MutationReport> {
        if strict && !report.is_success() {
            return Err(GatewayError::Bulk {
                alias: alias.to_string(),
                failures: report.failures(),
            });
        }
        Ok(report)
    }
}
