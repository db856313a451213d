// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Backend boundary.
//!
//! The gateway talks to the remote search service exclusively through
//! [`SearchBackend`]. Implementations own transport, authentication, retry
//! and connection pooling; the gateway hands them fully compiled query
//! documents and bulk operation batches and interprets the typed responses.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BackendError;
use crate::response::RawQueryResponse;
use crate::search::QueryDocument;

/// Result alias for backend implementations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Cluster health levels, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Red,
    Yellow,
    Green,
}

/// One operation in a bulk mutation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOp {
    Index { id: String, document: Value },
    Delete { id: String },
}

impl BulkOp {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            BulkOp::Index { id, .. } | BulkOp::Delete { id } => id,
        }
    }
}

/// Per-item result of a bulk call, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemOutcome {
    pub id: String,
    /// Item-level error message, `None` on success.
    #[serde(default)]
    pub error: Option<String>,
}

impl BulkItemOutcome {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Transport-owning adapter to the remote search service.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute a compiled query document against an index alias.
    async fn search(&self, alias: &str, query: &QueryDocument) -> BackendResult<RawQueryResponse>;

    /// Submit one bulk chunk. The returned outcomes carry one entry per
    /// submitted operation, in order. `refresh` requests that changes are
    /// visible to searches before the call returns.
    async fn bulk(
        &self,
        alias: &str,
        ops: Vec<BulkOp>,
        refresh: bool,
    ) -> BackendResult<Vec<BulkItemOutcome>>;

    /// Wait until the cluster reaches at least `min` health, up to
    /// `timeout`. Returns whether the threshold was met in time.
    async fn wait_for_min_status(&self, min: HealthStatus, timeout: Duration) -> bool;
}
