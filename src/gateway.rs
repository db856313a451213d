// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The gateway: schema-aware searches and batched mutations against a
//! remote search backend.
//!
//! [`SearchGateway`] owns the schema registry, the facet converter chain
//! and the replay log, and drives the whole request cycle: optimize the
//! expression, compile, execute, project hits and convert facets. Index
//! rebuilds run on a dedicated single worker per alias so two rebuilds of
//! the same alias can never interleave.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backend::{BulkOp, HealthStatus, SearchBackend};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::mutation::{DataChangeProcessingMode, MutationBatcher, MutationReport, ReplayLog};
use crate::response::{self, RawQueryResponse, SearchResult};
use crate::schema::SchemaRegistry;
use crate::search::{FacetConverterChain, QueryCompiler, QueryDocument, QueryRequest};

/// Id of the marker document that records the index schema version.
const VERSION_MARKER_ID: &str = "0";
/// Field of the marker document holding the version number.
const VERSION_FIELD: &str = "index_version";

/// Supplies the ground-truth documents of an alias for a rebuild.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn load(&self, alias: &str) -> Result<Vec<(String, Value)>>;
}

/// Facade over one [`SearchBackend`] and one schema.
pub struct SearchGateway {
    backend: Arc<dyn SearchBackend>,
    registry: SchemaRegistry,
    config: GatewayConfig,
    facet_chain: FacetConverterChain,
    replay: ReplayLog,
    rebuild_workers: DashMap<String, mpsc::UnboundedSender<Arc<dyn DocumentProvider>>>,
    rebuilding: DashSet<String>,
}

impl SearchGateway {
    #[must_use]
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        registry: SchemaRegistry,
        config: GatewayConfig,
    ) -> Self {
        let replay = ReplayLog::new(config.replay_capacity);
        Self {
            backend,
            registry,
            config,
            facet_chain: FacetConverterChain::with_defaults(),
            replay,
            rebuild_workers: DashMap::new(),
            rebuilding: DashSet::new(),
        }
    }

    /// Replace the facet converter chain, e.g. to add custom converters.
    #[must_use]
    pub fn with_facet_chain(mut self, chain: FacetConverterChain) -> Self {
        self.facet_chain = chain;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run a search against an alias and return the projected result page.
    pub async fn search(&self, alias: &str, request: &QueryRequest) -> Result<SearchResult> {
        let request = self.prepared(request);
        let compiler = QueryCompiler::new(&self.registry, &self.config);
        let document = compiler.compile(&request)?;
        debug!(alias, from = document.from_offset(), size = document.size(), "executing search");

        let raw = self
            .backend
            .search(alias, &document)
            .await
            .map_err(|e| GatewayError::from_backend(alias, "search", e))?;

        self.assemble(&request, &document, raw)
    }

    /// Compile a request without executing it. Useful for diagnostics.
    pub fn compile(&self, request: &QueryRequest) -> Result<QueryDocument> {
        let request = self.prepared(request);
        QueryCompiler::new(&self.registry, &self.config).compile(&request)
    }

    fn prepared(&self, request: &QueryRequest) -> QueryRequest {
        let mut request = request.clone();
        if self.config.optimize_expressions {
            request.expression = request.expression.optimize();
            request.filter = request.filter.as_ref().map(|f| f.optimize());
        }
        request
    }

    fn assemble(
        &self,
        request: &QueryRequest,
        document: &QueryDocument,
        raw: RawQueryResponse,
    ) -> Result<SearchResult> {
        let items = raw
            .hits
            .iter()
            .map(response::project_hit)
            .collect::<Result<Vec<_>>>()?;
        let facets = self
            .facet_chain
            .convert_all(&raw.aggregations, &document.facet_fields);

        let max_results = request
            .max_results
            .unwrap_or(self.config.max_result_window)
            .min(self.config.max_result_window) as u64;
        Ok(SearchResult {
            items,
            page_index: request.page_index,
            page_size: request.page_size,
            result_count: raw.total_hits.min(max_results),
            total_hit_count: raw.total_hits,
            exact_count: raw.exact,
            facets,
        })
    }

    /// Index documents, chunked. While a rebuild of the alias is running,
    /// applied documents are also appended to the replay log so the new
    /// index catches up before going live.
    pub async fn add_to_index(
        &self,
        alias: &str,
        documents: Vec<(String, Value)>,
        mode: DataChangeProcessingMode,
        strict: bool,
    ) -> Result<MutationReport> {
        let batcher = MutationBatcher::new(self.backend.as_ref(), &self.config);
        let recording = self.rebuilding.contains(alias);
        let replayable = if recording { documents.clone() } else { Vec::new() };
        let report = batcher
            .index(alias, documents, mode.is_refresh(), strict)
            .await?;
        if recording {
            for (id, document) in replayable {
                if report.succeeded(&id) {
                    self.replay.append(alias, BulkOp::Index { id, document });
                }
            }
        }
        Ok(report)
    }

    /// Delete documents by id, chunked.
    pub async fn remove_from_index(
        &self,
        alias: &str,
        ids: Vec<String>,
        mode: DataChangeProcessingMode,
        strict: bool,
    ) -> Result<MutationReport> {
        let batcher = MutationBatcher::new(self.backend.as_ref(), &self.config);
        let recording = self.rebuilding.contains(alias);
        let replayable = if recording { ids.clone() } else { Vec::new() };
        let report = batcher.delete(alias, ids, mode.is_refresh(), strict).await?;
        if recording {
            for id in replayable {
                if report.succeeded(&id) {
                    self.replay.append(alias, BulkOp::Delete { id });
                }
            }
        }
        Ok(report)
    }

    /// Queue a rebuild on the alias's dedicated worker. Rebuilds for the
    /// same alias run strictly one after another.
    pub fn schedule_rebuild(self: Arc<Self>, alias: &str, provider: Arc<dyn DocumentProvider>) {
        let sender = self
            .rebuild_workers
            .entry(alias.to_string())
            .or_insert_with(|| spawn_rebuild_worker(Arc::clone(&self), alias.to_string()))
            .clone();
        if sender.send(provider).is_err() {
            warn!(alias, "rebuild worker is gone, dropping rebuild request");
        }
    }

    /// Rebuild an alias from its document provider, then replay mutations
    /// that arrived while the rebuild was running.
    pub async fn rebuild_index(
        &self,
        alias: &str,
        provider: Arc<dyn DocumentProvider>,
    ) -> Result<()> {
        self.rebuilding.insert(alias.to_string());
        let result = self.run_rebuild(alias, provider).await;
        self.rebuilding.remove(alias);
        result
    }

    async fn run_rebuild(&self, alias: &str, provider: Arc<dyn DocumentProvider>) -> Result<()> {
        let documents = provider.load(alias).await?;
        let count = documents.len();
        let batcher = MutationBatcher::new(self.backend.as_ref(), &self.config);
        batcher.index(alias, documents, false, true).await?;

        let version = self.index_version(alias).await?;
        self.set_index_version(alias, version + 1).await?;

        let pending = self.replay.drain(alias);
        let replayed = pending.len();
        let mut failures = Vec::new();
        for chunk in pending.chunks(self.config.indexing_bulk_size.max(1)) {
            let outcomes = self
                .backend
                .bulk(alias, chunk.to_vec(), false)
                .await
                .map_err(|e| GatewayError::from_backend(alias, "bulk", e))?;
            failures.extend(
                outcomes
                    .into_iter()
                    .filter(|outcome| !outcome.succeeded())
                    .map(|outcome| (outcome.id, outcome.error.unwrap_or_default())),
            );
        }
        if !failures.is_empty() {
            // A lost replay record means the rebuilt index is missing a
            // write that arrived during the rebuild.
            return Err(GatewayError::Bulk {
                alias: alias.to_string(),
                failures,
            });
        }
        info!(alias, documents = count, version = version + 1, replayed, "index rebuild complete");
        Ok(())
    }

    /// Read the schema version recorded in the index, `-1` when the marker
    /// document is absent.
    pub async fn index_version(&self, alias: &str) -> Result<i64> {
        let document = QueryDocument {
            body: json!({
                "query": {"exists": {"field": VERSION_FIELD}},
                "size": 1,
                "_source": false,
                "docvalue_fields": [VERSION_FIELD],
            }),
            facet_fields: Default::default(),
        };
        let raw = self
            .backend
            .search(alias, &document)
            .await
            .map_err(|e| GatewayError::from_backend(alias, "search", e))?;
        let Some(hit) = raw.hits.first() else {
            return Ok(-1);
        };
        let version = hit
            .fields
            .get(VERSION_FIELD)
            .map(|value| match value {
                Value::Array(items) => items.first().and_then(Value::as_i64),
                other => other.as_i64(),
            })
            .unwrap_or(None);
        version.ok_or_else(|| {
            GatewayError::InvalidArgument(format!(
                "version marker in '{alias}' carries no numeric {VERSION_FIELD}"
            ))
        })
    }

    /// Write the schema version marker document.
    pub async fn set_index_version(&self, alias: &str, version: i64) -> Result<()> {
        let op = BulkOp::Index {
            id: VERSION_MARKER_ID.to_string(),
            document: json!({ VERSION_FIELD: version }),
        };
        let outcomes = self
            .backend
            .bulk(alias, vec![op], true)
            .await
            .map_err(|e| GatewayError::from_backend(alias, "bulk", e))?;
        if let Some(outcome) = outcomes.iter().find(|o| !o.succeeded()) {
            return Err(GatewayError::Bulk {
                alias: alias.to_string(),
                failures: vec![(
                    outcome.id.clone(),
                    outcome.error.clone().unwrap_or_default(),
                )],
            });
        }
        Ok(())
    }

    /// Whether the backend reports at least yellow health within the
    /// configured timeout.
    pub async fn is_available(&self) -> bool {
        self.backend
            .wait_for_min_status(
                HealthStatus::Yellow,
                Duration::from_millis(self.config.check_status_timeout_ms),
            )
            .await
    }
}

fn spawn_rebuild_worker(
    gateway: Arc<SearchGateway>,
    alias: String,
) -> mpsc::UnboundedSender<Arc<dyn DocumentProvider>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<dyn DocumentProvider>>();
    tokio::spawn(async move {
        while let Some(provider) = rx.recv().await {
            if let Err(error) = gateway.rebuild_index(&alias, provider).await {
                warn!(alias = %alias, %error, "index rebuild failed");
            }
        }
    });
    tx
}
