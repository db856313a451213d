// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Conversion of raw backend aggregations into typed facets.
//!
//! Converters are consulted in registration order and the first one that
//! claims an aggregation wins. Aggregations nobody claims are logged and
//! dropped rather than failing the whole result. Resolvers map aggregation
//! names back to schema fields when the compiled name map does not cover
//! them (custom server-side aggregations, for example).

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::response::{FacetItem, FacetResult};

/// Converts one raw aggregation into a [`FacetResult`].
pub trait FacetConverter: Send + Sync {
    /// Whether this converter understands the aggregation's shape.
    fn is_responsible(&self, aggregation: &Value) -> bool;

    fn convert(&self, name: &str, field: Option<String>, aggregation: &Value) -> FacetResult;
}

/// Maps an aggregation name to the schema field it was computed over.
pub trait FacetResolver: Send + Sync {
    fn is_responsible(&self, name: &str) -> bool;

    fn field_name(&self, name: &str) -> String;
}

/// Ordered converter pipeline, first responsible converter wins.
pub struct FacetConverterChain {
    converters: Vec<Box<dyn FacetConverter>>,
    resolvers: Vec<Box<dyn FacetResolver>>,
}

impl Default for FacetConverterChain {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl FacetConverterChain {
    /// Empty chain without any converters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            converters: Vec::new(),
            resolvers: Vec::new(),
        }
    }

    /// Chain with the built-in range and terms converters.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut chain = Self::new();
        chain.register(Box::new(RangesFacetConverter));
        chain.register(Box::new(TermsFacetConverter));
        chain
    }

    pub fn register(&mut self, converter: Box<dyn FacetConverter>) {
        self.converters.push(converter);
    }

    pub fn register_resolver(&mut self, resolver: Box<dyn FacetResolver>) {
        self.resolvers.push(resolver);
    }

    /// Convert every aggregation in the response. Unclaimed aggregations
    /// are dropped with a warning.
    #[must_use]
    pub fn convert_all(
        &self,
        aggregations: &Map<String, Value>,
        field_by_name: &HashMap<String, String>,
    ) -> Vec<FacetResult> {
        let mut facets = Vec::with_capacity(aggregations.len());
        for (name, aggregation) in aggregations {
            let Some(converter) = self
                .converters
                .iter()
                .find(|c| c.is_responsible(aggregation))
            else {
                warn!(aggregation = %name, "no facet converter is responsible, dropping");
                continue;
            };
            let field = self.resolve_field(name, field_by_name);
            facets.push(converter.convert(name, field, aggregation));
        }
        facets
    }

    fn resolve_field(&self, name: &str, field_by_name: &HashMap<String, String>) -> Option<String> {
        if let Some(resolver) = self.resolvers.iter().find(|r| r.is_responsible(name)) {
            return Some(resolver.field_name(name));
        }
        field_by_name.get(name).cloned()
    }
}

/// Bucketed terms and histogram aggregations.
pub struct TermsFacetConverter;

impl FacetConverter for TermsFacetConverter {
    fn is_responsible(&self, aggregation: &Value) -> bool {
        aggregation
            .get("buckets")
            .and_then(Value::as_array)
            .is_some()
    }

    fn convert(&self, name: &str, field: Option<String>, aggregation: &Value) -> FacetResult {
        let buckets = aggregation
            .get("buckets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let items = buckets
            .iter()
            .map(|bucket| FacetItem::Term {
                value: bucket
                    .get("key_as_string")
                    .or_else(|| bucket.get("key"))
                    .cloned()
                    .unwrap_or(Value::Null),
                count: bucket
                    .get("doc_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            })
            .collect();
        FacetResult {
            name: name.to_string(),
            field,
            items,
        }
    }
}

/// Range aggregations, recognized by `from`/`to` bounds on their buckets.
pub struct RangesFacetConverter;

impl FacetConverter for RangesFacetConverter {
    fn is_responsible(&self, aggregation: &Value) -> bool {
        aggregation
            .get("buckets")
            .and_then(Value::as_array)
            .is_some_and(|buckets| {
                buckets
                    .iter()
                    .any(|b| b.get("from").is_some() || b.get("to").is_some())
            })
    }

    fn convert(&self, name: &str, field: Option<String>, aggregation: &Value) -> FacetResult {
        let buckets = aggregation
            .get("buckets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let items = buckets
            .iter()
            .map(|bucket| FacetItem::Range {
                from: bucket.get("from").and_then(Value::as_f64),
                to: bucket.get("to").and_then(Value::as_f64),
                count: bucket
                    .get("doc_count")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            })
            .collect();
        FacetResult {
            name: name.to_string(),
            field,
            items,
        }
    }
}
