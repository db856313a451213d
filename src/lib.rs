// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # search-gateway
//!
//! Schema-aware query compilation and mutation batching for remote search
//! backends.
//!
//! Applications describe searches as backend-neutral [`Expression`] trees
//! plus paging, sorting, projection and facet options. The gateway resolves
//! every field reference against the configured [`SchemaRegistry`], compiles
//! the request into the backend's native query document, executes it through
//! a pluggable [`SearchBackend`], and converts the raw response back into
//! typed results and facets. Index writes are chunked into bulk calls, and a
//! per-alias replay log keeps rebuilds consistent with concurrent mutations.
//!
//! ```no_run
//! use std::sync::Arc;
//! use search_gateway::{
//!     Expression, FieldSchema, GatewayConfig, QueryRequest, SchemaRegistry, SearchGateway,
//!     SortOption,
//! };
//! # async fn run(backend: Arc<dyn search_gateway::SearchBackend>) -> search_gateway::Result<()> {
//! let registry = SchemaRegistry::new(
//!     vec![
//!         FieldSchema::text("title").multilang(true).sortable(true),
//!         FieldSchema::keyword("keyword"),
//!     ],
//!     vec!["de".into(), "en".into()],
//! );
//! let gateway = SearchGateway::new(backend, registry, GatewayConfig::default());
//!
//! let request = QueryRequest::new(Expression::eq("title", "archive"), "de")
//!     .with_page(1, 20)
//!     .with_sort(SortOption::desc("title"));
//! let result = gateway.search("media", &request).await?;
//! println!("{} of {} hits", result.items.len(), result.total_hit_count);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod expression;
pub mod gateway;
pub mod mutation;
pub mod response;
pub mod schema;
pub mod search;

pub use backend::{BulkItemOutcome, BulkOp, HealthStatus, SearchBackend};
pub use config::{GatewayConfig, MissingValuePosition};
pub use error::{BackendError, GatewayError, Result};
pub use expression::{ComparisonOp, Expression, FieldValue};
pub use gateway::{DocumentProvider, SearchGateway};
pub use mutation::{DataChangeProcessingMode, MutationReport};
pub use response::{FacetItem, FacetResult, ResultItem, SearchHit, SearchResult};
pub use schema::{FieldKind, FieldSchema, SchemaRegistry};
pub use search::{
    AggregationSpec, ArrayMode, CollapseOption, FacetConverter, FacetConverterChain, FacetResolver,
    FieldResolverMode, InnerHitsOption, QueryRequest, ScriptSortType, SortDirection, SortOption,
};
