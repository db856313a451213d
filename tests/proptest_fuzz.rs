//! Property-based tests for the gateway invariants.
//!
//! Uses proptest to generate random expression trees and batch sizes and
//! verify the structural guarantees: the optimizer reaches a fixed point
//! and never leaves degenerate nodes behind, compilation is deterministic,
//! and batching always produces `ceil(K / C)` bulk calls.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::json;

use search_gateway::response::RawQueryResponse;
use search_gateway::search::QueryDocument;
use search_gateway::{
    BackendError, BulkItemOutcome, BulkOp, ComparisonOp, DataChangeProcessingMode, Expression,
    FieldSchema, FieldValue, GatewayConfig, HealthStatus, QueryRequest, SchemaRegistry,
    SearchBackend, SearchGateway,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

/// Fields that exist in the test schema, so compilation always resolves.
const FIELDS: &[&str] = &["title", "keyword", "count"];

fn registry() -> SchemaRegistry {
    SchemaRegistry::new(
        vec![
            FieldSchema::text("title").multilang(true).sortable(true),
            FieldSchema::keyword("keyword"),
            FieldSchema::integer("count"),
        ],
        vec!["de".into()],
    )
}

fn field_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(FIELDS).prop_map(str::to_string)
}

fn value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(FieldValue::Text),
        any::<i32>().prop_map(|n| FieldValue::Integer(i64::from(n))),
        any::<bool>().prop_map(FieldValue::Bool),
    ]
}

fn leaf_strategy() -> impl Strategy<Value = Expression> {
    let op = prop::sample::select(vec![
        ComparisonOp::Eq,
        ComparisonOp::NotEq,
        ComparisonOp::Gt,
        ComparisonOp::Le,
    ]);
    prop_oneof![
        Just(Expression::MatchAll),
        Just(Expression::MatchNone),
        (field_strategy(), op, value_strategy())
            .prop_map(|(field, op, value)| Expression::value(field, op, value)),
        (field_strategy(), prop::collection::vec(value_strategy(), 1..4))
            .prop_map(|(field, values)| Expression::any_of(field, values)),
    ]
}

fn expression_strategy() -> impl Strategy<Value = Expression> {
    leaf_strategy().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Expression::And),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Expression::Or),
            inner.prop_map(|e| e.not()),
        ]
    })
}

/// No degenerate structure may survive optimization.
fn assert_normalized(expression: &Expression) {
    match expression {
        Expression::And(children) => {
            assert!(children.len() >= 2, "And with fewer than two children");
            for child in children {
                assert!(!matches!(
                    child,
                    Expression::And(_) | Expression::MatchAll | Expression::MatchNone
                ));
                assert_normalized(child);
            }
        }
        Expression::Or(children) => {
            assert!(children.len() >= 2, "Or with fewer than two children");
            for child in children {
                assert!(!matches!(
                    child,
                    Expression::Or(_) | Expression::MatchAll | Expression::MatchNone
                ));
                assert_normalized(child);
            }
        }
        Expression::Not(inner) => {
            assert!(!matches!(
                **inner,
                Expression::Not(_) | Expression::MatchAll | Expression::MatchNone
            ));
            assert_normalized(inner);
        }
        _ => {}
    }
}

// =============================================================================
// Optimizer Properties
// =============================================================================

proptest! {
    /// Optimization reaches a fixed point after one pass.
    #[test]
    fn prop_optimize_is_idempotent(expression in expression_strategy()) {
        let once = expression.optimize();
        prop_assert_eq!(&once, &once.optimize());
    }

    /// An optimized tree contains no neutral leaves, single-child
    /// conjunctions, nested same-type conjunctions or double negations.
    #[test]
    fn prop_optimize_normalizes_structure(expression in expression_strategy()) {
        assert_normalized(&expression.optimize());
    }

    /// Compilation never fails on schema-resolvable trees and is
    /// deterministic, optimized or not.
    #[test]
    fn prop_compile_is_deterministic(expression in expression_strategy()) {
        let backend = Arc::new(CountingBackend::default());
        let gateway = SearchGateway::new(backend, registry(), GatewayConfig::default());
        let request = QueryRequest::new(expression, "de").with_page(1, 20);
        let first = gateway.compile(&request);
        prop_assert!(first.is_ok());
        prop_assert_eq!(first.unwrap(), gateway.compile(&request).unwrap());
    }
}

// =============================================================================
// Batching Properties
// =============================================================================

#[derive(Default)]
struct CountingBackend {
    calls: Mutex<Vec<usize>>,
}

#[async_trait]
impl SearchBackend for CountingBackend {
    async fn search(
        &self,
        _alias: &str,
        _query: &QueryDocument,
    ) -> Result<RawQueryResponse, BackendError> {
        Ok(RawQueryResponse::default())
    }

    async fn bulk(
        &self,
        _alias: &str,
        ops: Vec<BulkOp>,
        _refresh: bool,
    ) -> Result<Vec<BulkItemOutcome>, BackendError> {
        self.calls.lock().push(ops.len());
        Ok(ops.iter().map(|op| BulkItemOutcome::ok(op.id())).collect())
    }

    async fn wait_for_min_status(&self, _min: HealthStatus, _timeout: Duration) -> bool {
        true
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// K documents with chunk size C produce exactly ceil(K / C) bulk
    /// calls, every chunk is full except possibly the last, and every
    /// document gets an outcome.
    #[test]
    fn prop_index_batching_is_ceil(documents in 0usize..400, chunk in 1usize..40) {
        let backend = Arc::new(CountingBackend::default());
        let config = GatewayConfig {
            indexing_bulk_size: chunk,
            ..Default::default()
        };
        let gateway = SearchGateway::new(backend.clone(), registry(), config);

        let batch: Vec<(String, serde_json::Value)> =
            (0..documents).map(|i| (i.to_string(), json!({"n": i}))).collect();
        let report = block_on(gateway.add_to_index(
            "media",
            batch,
            DataChangeProcessingMode::Background,
            false,
        ))
        .unwrap();

        let calls = backend.calls.lock().clone();
        let expected = documents.div_ceil(chunk);
        prop_assert_eq!(calls.len(), expected);
        prop_assert_eq!(calls.iter().sum::<usize>(), documents);
        for (i, size) in calls.iter().enumerate() {
            if i + 1 < calls.len() {
                prop_assert_eq!(*size, chunk);
            } else {
                prop_assert!(*size <= chunk && *size > 0);
            }
        }
        prop_assert_eq!(report.len(), documents);
        prop_assert!(report.is_success());
    }

    /// Deletes follow the same chunking law, except the dedicated
    /// single-id path.
    #[test]
    fn prop_delete_batching_is_ceil(ids in 0usize..400, chunk in 1usize..40) {
        let backend = Arc::new(CountingBackend::default());
        let config = GatewayConfig {
            delete_chunk_size: chunk,
            ..Default::default()
        };
        let gateway = SearchGateway::new(backend.clone(), registry(), config);

        let batch: Vec<String> = (0..ids).map(|i| i.to_string()).collect();
        block_on(gateway.remove_from_index(
            "media",
            batch,
            DataChangeProcessingMode::Background,
            false,
        ))
        .unwrap();

        let calls = backend.calls.lock().clone();
        let expected = if ids == 1 { 1 } else { ids.div_ceil(chunk) };
        prop_assert_eq!(calls.len(), expected);
        prop_assert_eq!(calls.iter().sum::<usize>(), ids);
    }
}
