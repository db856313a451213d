// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query compilation: expression tree plus request options into the
//! backend's native query document.
//!
//! Compilation is pure and deterministic. All schema lookups happen here,
//! before any network call, so an unresolvable field fails the request
//! without side effects. Compiling the same request twice yields the same
//! document.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::expression::{ComparisonOp, Expression, FieldValue};
use crate::schema::{self, FieldKind, FieldSchema, SchemaRegistry};
use crate::search::facets::{self, AggregationSpec};
use crate::search::sort::{self, SortOption};

/// How projected fields are read back from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldResolverMode {
    /// Read from the stored document source.
    #[default]
    SourceValues,
    /// Skip source fetching and read column-store (doc-value) fields.
    DocValues,
}

/// Inner hits returned per collapsed group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InnerHitsOption {
    pub name: String,
    pub size: usize,
    #[serde(default)]
    pub from: usize,
    #[serde(default)]
    pub sorts: Vec<SortOption>,
    /// Collapse applied inside the inner hit group.
    #[serde(default)]
    pub collapse_field: Option<String>,
}

impl InnerHitsOption {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            size,
            from: 0,
            sorts: Vec::new(),
            collapse_field: None,
        }
    }
}

/// Collapse the result to one hit per distinct value of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollapseOption {
    pub field: String,
    #[serde(default)]
    pub inner_hits: Vec<InnerHitsOption>,
}

/// A complete search request against one index alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub expression: Expression,
    /// Additional condition combined as a non-scoring filter.
    #[serde(default)]
    pub filter: Option<Expression>,
    /// 1-based page index.
    pub page_index: usize,
    pub page_size: usize,
    /// Cap on reachable results; clamped to the backend result window.
    #[serde(default)]
    pub max_results: Option<usize>,
    /// Locale for multi-language field resolution, e.g. `"de"`.
    pub locale: String,
    /// Fields to return per hit. Empty means the full document.
    #[serde(default)]
    pub fields_to_resolve: Vec<String>,
    #[serde(default)]
    pub field_resolver_mode: FieldResolverMode,
    #[serde(default)]
    pub sorts: Vec<SortOption>,
    #[serde(default)]
    pub aggregations: Vec<AggregationSpec>,
    #[serde(default)]
    pub collapse: Option<CollapseOption>,
}

impl QueryRequest {
    pub fn new(expression: Expression, locale: impl Into<String>) -> Self {
        Self {
            expression,
            filter: None,
            page_index: 1,
            page_size: 10,
            max_results: None,
            locale: locale.into(),
            fields_to_resolve: Vec::new(),
            field_resolver_mode: FieldResolverMode::default(),
            sorts: Vec::new(),
            aggregations: Vec::new(),
            collapse: None,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Expression) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_page(mut self, page_index: usize, page_size: usize) -> Self {
        self.page_index = page_index;
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    #[must_use]
    pub fn with_fields(mut self, fields: Vec<String>, mode: FieldResolverMode) -> Self {
        self.fields_to_resolve = fields;
        self.field_resolver_mode = mode;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortOption) -> Self {
        self.sorts.push(sort);
        self
    }

    #[must_use]
    pub fn with_aggregation(mut self, spec: AggregationSpec) -> Self {
        self.aggregations.push(spec);
        self
    }

    #[must_use]
    pub fn with_collapse(mut self, collapse: CollapseOption) -> Self {
        self.collapse = Some(collapse);
        self
    }
}

/// Compiled backend query, ready for [`crate::backend::SearchBackend::search`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDocument {
    pub body: Value,
    /// Aggregation name to schema field, used to label converted facets.
    #[serde(default)]
    pub facet_fields: HashMap<String, String>,
}

impl QueryDocument {
    #[must_use]
    pub fn from_offset(&self) -> u64 {
        self.body.get("from").and_then(Value::as_u64).unwrap_or(0)
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.body.get("size").and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Translates [`QueryRequest`]s into [`QueryDocument`]s against one schema.
pub struct QueryCompiler<'a> {
    registry: &'a SchemaRegistry,
    config: &'a GatewayConfig,
}

impl<'a> QueryCompiler<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, config: &'a GatewayConfig) -> Self {
        Self { registry, config }
    }

    /// Compile a request. Fails before producing a document if the page
    /// bounds are invalid or any referenced field cannot be resolved.
    pub fn compile(&self, request: &QueryRequest) -> Result<QueryDocument> {
        if request.page_index == 0 {
            return Err(GatewayError::InvalidArgument(
                "page_index is 1-based and must be positive".into(),
            ));
        }
        if request.page_size == 0 {
            return Err(GatewayError::InvalidArgument("page_size must be positive".into()));
        }
        if request.page_size > self.config.max_page_size {
            return Err(GatewayError::InvalidArgument(format!(
                "page_size {} exceeds the maximum of {}",
                request.page_size, self.config.max_page_size
            )));
        }

        // Fail fast on unresolvable projection fields.
        for name in &request.fields_to_resolve {
            resolve_field(self.registry, name, &request.locale)?;
        }

        let mut body = Map::new();
        if let Some(query) = self.compile_query(request)? {
            body.insert("query".into(), query);
        }

        let max_results = request
            .max_results
            .unwrap_or(self.config.max_result_window)
            .min(self.config.max_result_window);
        let start = (request.page_index - 1) * request.page_size;
        let limit = request.page_size.min(max_results.saturating_sub(start));
        body.insert("from".into(), json!(start));
        body.insert("size".into(), json!(limit));
        body.insert("track_total_hits".into(), json!(max_results));

        self.add_projection(&mut body, request)?;

        if !request.sorts.is_empty() {
            let sorts =
                sort::compile_sorts(self.registry, self.config, &request.sorts, &request.locale)?;
            body.insert("sort".into(), Value::Array(sorts));
        }

        let mut facet_fields = HashMap::new();
        if !request.aggregations.is_empty() {
            let compiled = facets::compile_aggregations(
                self.registry,
                self.config,
                &request.aggregations,
                &request.locale,
            )?;
            body.insert("aggs".into(), Value::Object(compiled.aggregations));
            facet_fields = compiled.field_by_name;
        }

        if let Some(collapse) = &request.collapse {
            body.insert("collapse".into(), self.compile_collapse(collapse, &request.locale)?);
        }

        Ok(QueryDocument {
            body: Value::Object(body),
            facet_fields,
        })
    }

    /// A bare match-all produces no query clause (the backend's default).
    /// Filters combine as non-scoring `bool.filter` context.
    fn compile_query(&self, request: &QueryRequest) -> Result<Option<Value>> {
        let must = match &request.expression {
            Expression::MatchAll => None,
            other => Some(compile_expression(self.registry, other, &request.locale)?),
        };
        let filter = request
            .filter
            .as_ref()
            .map(|f| compile_expression(self.registry, f, &request.locale))
            .transpose()?;
        Ok(match (must, filter) {
            (None, None) => None,
            (Some(must), None) => Some(must),
            (None, Some(filter)) => Some(json!({"bool": {"filter": [filter]}})),
            (Some(must), Some(filter)) => {
                Some(json!({"bool": {"must": [must], "filter": [filter]}}))
            }
        })
    }

    fn add_projection(&self, body: &mut Map<String, Value>, request: &QueryRequest) -> Result<()> {
        if request.fields_to_resolve.is_empty() {
            return Ok(());
        }
        match request.field_resolver_mode {
            FieldResolverMode::SourceValues => {
                let includes: Vec<&String> = request.fields_to_resolve.iter().collect();
                body.insert("_source".into(), json!({ "includes": includes }));
            }
            FieldResolverMode::DocValues => {
                let mut docvalue_fields = Vec::with_capacity(request.fields_to_resolve.len());
                for name in &request.fields_to_resolve {
                    let resolved = resolve_field(self.registry, name, &request.locale)?;
                    let alias = resolved.exact.ok_or_else(|| {
                        GatewayError::InvalidArgument(format!(
                            "field '{name}' has no doc-value representation"
                        ))
                    })?;
                    docvalue_fields.push(Value::String(alias));
                }
                body.insert("_source".into(), json!(false));
                body.insert("docvalue_fields".into(), Value::Array(docvalue_fields));
            }
        }
        Ok(())
    }

    fn compile_collapse(&self, collapse: &CollapseOption, locale: &str) -> Result<Value> {
        let resolved = resolve_field(self.registry, &collapse.field, locale)?;
        let field = resolved.exact.unwrap_or(resolved.name);
        let mut out = Map::new();
        out.insert("field".into(), json!(field));
        if !collapse.inner_hits.is_empty() {
            let mut inner = Vec::with_capacity(collapse.inner_hits.len());
            for option in &collapse.inner_hits {
                let mut hits = Map::new();
                hits.insert("name".into(), json!(option.name));
                hits.insert("size".into(), json!(option.size));
                if option.from > 0 {
                    hits.insert("from".into(), json!(option.from));
                }
                if !option.sorts.is_empty() {
                    let sorts =
                        sort::compile_sorts(self.registry, self.config, &option.sorts, locale)?;
                    hits.insert("sort".into(), Value::Array(sorts));
                }
                if let Some(inner_collapse) = &option.collapse_field {
                    let resolved = resolve_field(self.registry, inner_collapse, locale)?;
                    let field = resolved.exact.unwrap_or(resolved.name);
                    hits.insert("collapse".into(), json!({"field": field}));
                }
                inner.push(Value::Object(hits));
            }
            out.insert("inner_hits".into(), Value::Array(inner));
        }
        Ok(Value::Object(out))
    }
}

/// A field reference resolved against the schema for one locale.
pub(crate) struct ResolvedField<'a> {
    pub leaf: &'a FieldSchema,
    /// Backend name with the locale applied, e.g. `title.de`.
    pub name: String,
    /// Keyword alias for exact matching, when one exists.
    pub exact: Option<String>,
    /// Nested query path, for children of nested-object fields.
    pub nested_path: Option<String>,
}

pub(crate) fn resolve_field<'a>(
    registry: &'a SchemaRegistry,
    name: &str,
    locale: &str,
) -> Result<ResolvedField<'a>> {
    let top = registry
        .resolve(name)
        .ok_or_else(|| GatewayError::FieldResolution(name.to_string()))?;

    let (leaf, nested_path) = if top.kind == FieldKind::NestedObject && name != top.name {
        let sub = schema::sub_field_name(name)
            .ok_or_else(|| GatewayError::FieldResolution(name.to_string()))?;
        let child = top
            .nested_child(sub)
            .ok_or_else(|| GatewayError::FieldResolution(name.to_string()))?;
        (child, Some(top.name.clone()))
    } else {
        (top, None)
    };

    // Dotted references to a non-nested field are taken verbatim, the
    // caller already qualified them (e.g. "title.de").
    let backend_name = if nested_path.is_none() && name != top.name {
        name.to_string()
    } else {
        registry.backend_field_name(leaf, name, locale)
    };
    let exact = registry.keyword_alias(leaf, &backend_name);

    Ok(ResolvedField {
        leaf,
        name: backend_name,
        exact,
        nested_path,
    })
}

impl ResolvedField<'_> {
    fn exact_name(&self) -> &str {
        self.exact.as_deref().unwrap_or(&self.name)
    }

    fn wrap_nested(&self, query: Value) -> Value {
        match &self.nested_path {
            Some(path) => json!({"nested": {"path": path, "query": query}}),
            None => query,
        }
    }
}

/// Translate one expression node into the backend's query JSON.
pub(crate) fn compile_expression(
    registry: &SchemaRegistry,
    expression: &Expression,
    locale: &str,
) -> Result<Value> {
    match expression {
        Expression::MatchAll => Ok(json!({"match_all": {}})),
        Expression::MatchNone => Ok(json!({"match_none": {}})),
        Expression::And(children) => {
            let compiled = compile_children(registry, children, locale)?;
            Ok(json!({"bool": {"must": compiled}}))
        }
        Expression::Or(children) => {
            let compiled = compile_children(registry, children, locale)?;
            Ok(json!({"bool": {"should": compiled, "minimum_should_match": 1}}))
        }
        Expression::Not(inner) => {
            let compiled = compile_expression(registry, inner, locale)?;
            Ok(json!({"bool": {"must_not": [compiled]}}))
        }
        Expression::Value { field, op, value } => {
            let resolved = resolve_field(registry, field, locale)?;
            if resolved.leaf.kind == FieldKind::NestedObject {
                return Err(GatewayError::InvalidArgument(format!(
                    "nested object field '{field}' cannot be compared directly"
                )));
            }
            let inner = compile_comparison(&resolved, *op, value);
            Ok(resolved.wrap_nested(inner))
        }
        Expression::Range { field, min, max } => {
            let resolved = resolve_field(registry, field, locale)?;
            let mut bounds = Map::new();
            if let Some(min) = min {
                bounds.insert("gte".into(), min.to_json());
            }
            if let Some(max) = max {
                bounds.insert("lte".into(), max.to_json());
            }
            let inner = json!({"range": {(resolved.name.clone()): bounds}});
            Ok(resolved.wrap_nested(inner))
        }
        Expression::In { field, values } => {
            let resolved = resolve_field(registry, field, locale)?;
            let values: Vec<Value> = values.iter().map(FieldValue::to_json).collect();
            let inner = json!({"terms": {(resolved.exact_name()): values}});
            Ok(resolved.wrap_nested(inner))
        }
    }
}

fn compile_children(
    registry: &SchemaRegistry,
    children: &[Expression],
    locale: &str,
) -> Result<Vec<Value>> {
    children
        .iter()
        .map(|child| compile_expression(registry, child, locale))
        .collect()
}

fn compile_comparison(resolved: &ResolvedField<'_>, op: ComparisonOp, value: &FieldValue) -> Value {
    let rendered = value.to_json();
    match op {
        ComparisonOp::Eq => compile_equality(resolved, rendered),
        ComparisonOp::NotEq => {
            let eq = compile_equality(resolved, rendered);
            json!({"bool": {"must_not": [eq]}})
        }
        ComparisonOp::Gt => json!({"range": {(resolved.name.clone()): {"gt": rendered}}}),
        ComparisonOp::Ge => json!({"range": {(resolved.name.clone()): {"gte": rendered}}}),
        ComparisonOp::Lt => json!({"range": {(resolved.name.clone()): {"lt": rendered}}}),
        ComparisonOp::Le => json!({"range": {(resolved.name.clone()): {"lte": rendered}}}),
        ComparisonOp::Like => {
            json!({"wildcard": {(resolved.exact_name()): {"value": rendered}}})
        }
    }
}

/// Equality on analyzed text is a match query on the analyzed field; all
/// other kinds use an exact term query.
fn compile_equality(resolved: &ResolvedField<'_>, rendered: Value) -> Value {
    if resolved.leaf.kind == FieldKind::Text {
        json!({"match": {(resolved.name.clone()): rendered}})
    } else {
        json!({"term": {(resolved.exact_name()): rendered}})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(
            vec![
                FieldSchema::text("title").multilang(true).sortable(true),
                FieldSchema::keyword("keyword"),
                FieldSchema::integer("count"),
                FieldSchema::date("created"),
                FieldSchema::nested(
                    "article",
                    vec![
                        FieldSchema::text("author"),
                        FieldSchema::integer("pages"),
                    ],
                ),
            ],
            vec!["de".into(), "en".into()],
        )
    }

    fn compile(expr: Expression) -> Value {
        compile_expression(&registry(), &expr, "de").unwrap()
    }

    #[test]
    fn test_text_equality_uses_localized_match() {
        let query = compile(Expression::eq("title", "archive"));
        assert_eq!(query, json!({"match": {"title.de": "archive"}}));
    }

    #[test]
    fn test_keyword_equality_uses_term() {
        let query = compile(Expression::eq("keyword", "press"));
        assert_eq!(query, json!({"term": {"keyword": "press"}}));
    }

    #[test]
    fn test_in_uses_terms_on_keyword_alias() {
        let query = compile(Expression::any_of("title", vec!["a".into(), "b".into()]));
        assert_eq!(query, json!({"terms": {"title.de.keyword": ["a", "b"]}}));
    }

    #[test]
    fn test_nested_child_wrapped_in_nested_query() {
        let query = compile(Expression::eq("article.pages", 12));
        assert_eq!(
            query,
            json!({"nested": {"path": "article", "query": {"term": {"article.pages": 12}}}})
        );
    }

    #[test]
    fn test_boolean_composition() {
        let query = compile(
            Expression::eq("keyword", "a").and(Expression::gt("count", 5)),
        );
        assert_eq!(
            query,
            json!({"bool": {"must": [
                {"term": {"keyword": "a"}},
                {"range": {"count": {"gt": 5}}}
            ]}})
        );
    }

    #[test]
    fn test_or_sets_minimum_should_match() {
        let query = compile(Expression::Or(vec![
            Expression::eq("keyword", "a"),
            Expression::eq("keyword", "b"),
        ]));
        assert_eq!(query["bool"]["minimum_should_match"], json!(1));
    }

    #[test]
    fn test_unknown_expression_field_fails() {
        let result = compile_expression(&registry(), &Expression::eq("bogus", 1), "de");
        assert!(matches!(result, Err(GatewayError::FieldResolution(_))));
    }

    fn compiler_config() -> GatewayConfig {
        GatewayConfig::default()
    }

    #[test]
    fn test_page_math() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de").with_page(3, 20);
        let document = compiler.compile(&request).unwrap();
        assert_eq!(document.from_offset(), 40);
        assert_eq!(document.size(), 20);
    }

    #[test]
    fn test_size_clipped_to_max_results() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de")
            .with_page(2, 20)
            .with_max_results(25);
        let document = compiler.compile(&request).unwrap();
        assert_eq!(document.from_offset(), 20);
        assert_eq!(document.size(), 5);
        assert_eq!(document.body["track_total_hits"], json!(25));
    }

    #[test]
    fn test_match_all_omits_query_clause() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de");
        let document = compiler.compile(&request).unwrap();
        assert!(document.body.get("query").is_none());
    }

    #[test]
    fn test_filter_only_request_compiles_to_filter_context() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de")
            .with_filter(Expression::eq("keyword", "press"));
        let document = compiler.compile(&request).unwrap();
        assert_eq!(
            document.body["query"],
            json!({"bool": {"filter": [{"term": {"keyword": "press"}}]}})
        );
    }

    #[test]
    fn test_filter_combined_without_scoring() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::eq("title", "x"), "de")
            .with_filter(Expression::eq("keyword", "press"));
        let document = compiler.compile(&request).unwrap();
        let bool_query = &document.body["query"]["bool"];
        assert_eq!(bool_query["must"][0], json!({"match": {"title.de": "x"}}));
        assert_eq!(bool_query["filter"][0], json!({"term": {"keyword": "press"}}));
    }

    #[test]
    fn test_doc_value_projection_excludes_source() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de").with_fields(
            vec!["title".into(), "count".into()],
            FieldResolverMode::DocValues,
        );
        let document = compiler.compile(&request).unwrap();
        assert_eq!(document.body["_source"], json!(false));
        assert_eq!(
            document.body["docvalue_fields"],
            json!(["title.de.keyword", "count"])
        );
    }

    #[test]
    fn test_doc_value_projection_rejects_nested_objects() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de")
            .with_fields(vec!["article".into()], FieldResolverMode::DocValues);
        assert!(matches!(
            compiler.compile(&request),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_source_projection_lists_includes() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de")
            .with_fields(vec!["title".into()], FieldResolverMode::SourceValues);
        let document = compiler.compile(&request).unwrap();
        assert_eq!(document.body["_source"], json!({"includes": ["title"]}));
    }

    #[test]
    fn test_unknown_projection_field_fails_before_compiling() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de")
            .with_fields(vec!["bogus".into()], FieldResolverMode::SourceValues);
        assert!(matches!(
            compiler.compile(&request),
            Err(GatewayError::FieldResolution(_))
        ));
    }

    #[test]
    fn test_page_size_over_limit_rejected() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de").with_page(1, 5000);
        assert!(matches!(
            compiler.compile(&request),
            Err(GatewayError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(
            Expression::eq("title", "x").and(Expression::any_of("keyword", vec!["a".into()])),
            "de",
        )
        .with_page(2, 50);
        let first = compiler.compile(&request).unwrap();
        let second = compiler.compile(&request).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_collapse_with_inner_hits() {
        let registry = registry();
        let config = compiler_config();
        let compiler = QueryCompiler::new(&registry, &config);
        let request = QueryRequest::new(Expression::MatchAll, "de").with_collapse(CollapseOption {
            field: "keyword".into(),
            inner_hits: vec![InnerHitsOption::new("variants", 3)],
        });
        let document = compiler.compile(&request).unwrap();
        assert_eq!(document.body["collapse"]["field"], json!("keyword"));
        assert_eq!(document.body["collapse"]["inner_hits"][0]["name"], json!("variants"));
    }
}
