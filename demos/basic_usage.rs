// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic search-gateway usage example.
//!
//! Demonstrates:
//! 1. Declaring a field schema and wiring up a gateway
//! 2. Composing and optimizing an expression tree
//! 3. Compiling a full request into the backend query document
//! 4. Chunked bulk indexing through a recording backend
//! 5. Availability checking
//!
//! The backend here is an in-process stub that records what it is asked to
//! do, so the example runs without any server.
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use search_gateway::{
    AggregationSpec, BulkItemOutcome, BulkOp, DataChangeProcessingMode, Expression, FieldSchema,
    GatewayConfig, HealthStatus, QueryRequest, SchemaRegistry, SearchBackend, SearchGateway,
    SortOption,
};
use search_gateway::backend::BackendResult;
use search_gateway::search::QueryDocument;
use search_gateway::response::RawQueryResponse;

/// Records bulk calls and answers every health probe with green.
#[derive(Default)]
struct RecordingBackend {
    bulk_sizes: Mutex<Vec<usize>>,
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn search(&self, _alias: &str, _query: &QueryDocument) -> BackendResult<RawQueryResponse> {
        Ok(RawQueryResponse::default())
    }

    async fn bulk(
        &self,
        _alias: &str,
        ops: Vec<BulkOp>,
        _refresh: bool,
    ) -> BackendResult<Vec<BulkItemOutcome>> {
        self.bulk_sizes.lock().push(ops.len());
        Ok(ops.iter().map(|op| BulkItemOutcome::ok(op.id())).collect())
    }

    async fn wait_for_min_status(&self, _min: HealthStatus, _timeout: Duration) -> bool {
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n=== search-gateway: basic usage ===\n");

    // 1. Schema and gateway.
    println!("Declaring schema (title multilang+sortable, keyword, count, nested article)...");
    let registry = SchemaRegistry::new(
        vec![
            FieldSchema::text("title").multilang(true).sortable(true),
            FieldSchema::keyword("keyword"),
            FieldSchema::integer("count").sortable(true),
            FieldSchema::nested(
                "article",
                vec![
                    FieldSchema::text("author").sortable(true),
                    FieldSchema::integer("pages"),
                ],
            ),
        ],
        vec!["de".into(), "en".into()],
    );
    let backend = Arc::new(RecordingBackend::default());
    let config = GatewayConfig {
        indexing_bulk_size: 10,
        ..Default::default()
    };
    let gateway = SearchGateway::new(backend.clone(), registry, config);

    // 2. Expression composition. The two keyword equalities merge into one
    //    terms clause during optimization.
    let expression = Expression::eq("keyword", "press")
        .or(Expression::eq("keyword", "archive"))
        .and(Expression::ge("count", 10));
    println!("\nExpression (optimized): {:?}", expression.clone().optimize());

    // 3. Compile a full request and show the backend document.
    let request = QueryRequest::new(expression, "de")
        .with_page(1, 20)
        .with_sort(SortOption::desc("title"))
        .with_aggregation(AggregationSpec::terms("keywords", "keyword"));
    let document = gateway.compile(&request)?;
    println!(
        "\nCompiled query document:\n{}",
        serde_json::to_string_pretty(&document.body)?
    );

    // 4. Bulk indexing: 25 documents against a bulk size of 10 -> 3 calls.
    let documents: Vec<(String, serde_json::Value)> = (0..25)
        .map(|n| {
            (
                n.to_string(),
                json!({"title": {"de": format!("Titel{n}")}, "count": n}),
            )
        })
        .collect();
    let report = gateway
        .add_to_index("media", documents, DataChangeProcessingMode::Background, true)
        .await?;
    println!(
        "\nIndexed {} documents in bulk calls of sizes {:?}",
        report.len(),
        backend.bulk_sizes.lock()
    );

    // 5. Availability.
    println!("Backend available: {}", gateway.is_available().await);

    println!("\n=== done ===\n");
    Ok(())
}
