//! Aggregation (facet) request compilation.
//!
//! Each [`AggregationSpec`] compiles into the backend's aggregation JSON:
//! terms buckets for keyword-capable fields, a yearly date histogram plus a
//! stats companion for date fields. The compiler also records which schema
//! field each aggregation name was computed over, so the response side can
//! label the converted facets.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::schema::{FieldKind, SchemaRegistry};
use crate::search::compiler;

/// Request for one facet over a schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Name the facet is reported under.
    pub name: String,
    pub field: String,
    /// Maximum number of buckets. Falls back to the configured default.
    #[serde(default)]
    pub max_count: Option<usize>,
}

impl AggregationSpec {
    pub fn terms(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            max_count: None,
        }
    }

    /// Facet named after the field itself.
    pub fn for_field(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: field.clone(),
            field,
            max_count: None,
        }
    }

    #[must_use]
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = Some(max_count);
        self
    }
}

/// Compiled aggregation bodies plus the name-to-field labeling map.
pub(crate) struct CompiledAggregations {
    pub aggregations: Map<String, Value>,
    pub field_by_name: HashMap<String, String>,
}

pub(crate) fn compile_aggregations(
    registry: &SchemaRegistry,
    config: &GatewayConfig,
    specs: &[AggregationSpec],
    locale: &str,
) -> Result<CompiledAggregations> {
    let mut aggregations = Map::new();
    let mut field_by_name = HashMap::new();

    for spec in specs {
        let resolved = compiler::resolve_field(registry, &spec.field, locale)?;
        field_by_name.insert(spec.name.clone(), spec.field.clone());

        if resolved.leaf.kind == FieldKind::Date {
            // Date facets come as a yearly histogram; the stats companion
            // lets callers derive the covered range without a second query.
            aggregations.insert(
                spec.name.clone(),
                json!({
                    "date_histogram": {
                        "field": resolved.name,
                        "calendar_interval": "year",
                        "min_doc_count": 1,
                    }
                }),
            );
            let stats_name = format!("{}_stats", spec.name);
            field_by_name.insert(stats_name.clone(), spec.field.clone());
            aggregations.insert(stats_name, json!({"stats": {"field": resolved.name}}));
            continue;
        }

        let field = resolved.exact.ok_or_else(|| {
            GatewayError::InvalidArgument(format!(
                "field '{}' has no exact-match representation to facet over",
                spec.field
            ))
        })?;
        let size = spec.max_count.unwrap_or(config.default_aggregation_max_count);
        aggregations.insert(
            spec.name.clone(),
            json!({
                "terms": {
                    "field": field,
                    "size": size,
                    "shard_size": size * config.shard_size_factor,
                }
            }),
        );
    }

    Ok(CompiledAggregations {
        aggregations,
        field_by_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(
            vec![
                FieldSchema::text("title").multilang(true),
                FieldSchema::keyword("keyword"),
                FieldSchema::date("created"),
                FieldSchema::nested("article", vec![FieldSchema::text("author")]),
            ],
            vec!["de".into()],
        )
    }

    fn compile(specs: &[AggregationSpec]) -> Result<CompiledAggregations> {
        compile_aggregations(&registry(), &GatewayConfig::default(), specs, "de")
    }

    #[test]
    fn test_terms_aggregation_sizing() {
        let compiled = compile(&[AggregationSpec::terms("keywords", "keyword").with_max_count(20)])
            .unwrap();
        let terms = &compiled.aggregations["keywords"]["terms"];
        assert_eq!(terms["field"], json!("keyword"));
        assert_eq!(terms["size"], json!(20));
        assert_eq!(terms["shard_size"], json!(100));
    }

    #[test]
    fn test_default_max_count_applies() {
        let compiled = compile(&[AggregationSpec::terms("keywords", "keyword")]).unwrap();
        assert_eq!(compiled.aggregations["keywords"]["terms"]["size"], json!(250));
    }

    #[test]
    fn test_text_facet_uses_keyword_alias() {
        let compiled = compile(&[AggregationSpec::terms("titles", "title")]).unwrap();
        assert_eq!(
            compiled.aggregations["titles"]["terms"]["field"],
            json!("title.de.keyword")
        );
    }

    #[test]
    fn test_date_facet_expands_to_histogram_and_stats() {
        let compiled = compile(&[AggregationSpec::terms("years", "created")]).unwrap();
        assert!(compiled.aggregations["years"].get("date_histogram").is_some());
        assert!(compiled.aggregations["years_stats"].get("stats").is_some());
        assert_eq!(compiled.field_by_name["years"], "created");
        assert_eq!(compiled.field_by_name["years_stats"], "created");
    }

    #[test]
    fn test_nested_object_facet_rejected() {
        let result = compile(&[AggregationSpec::terms("articles", "article")]);
        assert!(matches!(result, Err(GatewayError::InvalidArgument(_))));
    }

    #[test]
    fn test_unknown_field_fails() {
        let result = compile(&[AggregationSpec::terms("x", "bogus")]);
        assert!(matches!(result, Err(GatewayError::FieldResolution(_))));
    }
}
