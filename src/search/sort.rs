// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sort option compilation.
//!
//! Field sorts go through the schema: sortable text fields sort on their
//! non-analyzed `.sort` alias, multi-language fields on the locale variant,
//! nested children inside a nested sort context scoped to the parent path.
//! Relevance and script sorts bypass the schema entirely.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::expression::Expression;
use crate::schema::{self, FieldKind, SchemaRegistry};
use crate::search::compiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_token(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// How multi-valued fields collapse to one sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayMode {
    /// `min` for ascending sorts, `max` for descending.
    #[default]
    Default,
    Min,
    Max,
    Sum,
    Avg,
    Median,
}

impl ArrayMode {
    fn as_token(self, direction: SortDirection) -> &'static str {
        match self {
            ArrayMode::Default => match direction {
                SortDirection::Asc => "min",
                SortDirection::Desc => "max",
            },
            ArrayMode::Min => "min",
            ArrayMode::Max => "max",
            ArrayMode::Sum => "sum",
            ArrayMode::Avg => "avg",
            ArrayMode::Median => "median",
        }
    }
}

/// Declared type of a script sort's computed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptSortType {
    #[default]
    Number,
    String,
}

impl ScriptSortType {
    fn as_token(self) -> &'static str {
        match self {
            ScriptSortType::Number => "number",
            ScriptSortType::String => "string",
        }
    }
}

/// One sort clause of a search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Sort by match score.
    Relevance { direction: SortDirection },
    /// Backend-native script sort, passed through untouched.
    Script {
        /// Script body as the backend expects it (source or id, language,
        /// params).
        script: Value,
        #[serde(default)]
        value_type: ScriptSortType,
        direction: SortDirection,
    },
    Field {
        field: String,
        direction: SortDirection,
        #[serde(default)]
        array_mode: ArrayMode,
        /// Restricts which nested values participate in the sort key.
        #[serde(default)]
        filter: Option<Expression>,
    },
}

impl SortOption {
    pub fn asc(field: impl Into<String>) -> Self {
        SortOption::Field {
            field: field.into(),
            direction: SortDirection::Asc,
            array_mode: ArrayMode::default(),
            filter: None,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        SortOption::Field {
            field: field.into(),
            direction: SortDirection::Desc,
            array_mode: ArrayMode::default(),
            filter: None,
        }
    }

    #[must_use]
    pub fn relevance() -> Self {
        SortOption::Relevance {
            direction: SortDirection::Desc,
        }
    }

    #[must_use]
    pub fn with_array_mode(self, mode: ArrayMode) -> Self {
        match self {
            SortOption::Field {
                field,
                direction,
                filter,
                ..
            } => SortOption::Field {
                field,
                direction,
                array_mode: mode,
                filter,
            },
            other => other,
        }
    }

    #[must_use]
    pub fn with_nested_filter(self, filter: Expression) -> Self {
        match self {
            SortOption::Field {
                field,
                direction,
                array_mode,
                ..
            } => SortOption::Field {
                field,
                direction,
                array_mode,
                filter: Some(filter),
            },
            other => other,
        }
    }
}

/// Compile sort options into backend sort clauses, in caller order.
pub(crate) fn compile_sorts(
    registry: &SchemaRegistry,
    config: &GatewayConfig,
    sorts: &[SortOption],
    locale: &str,
) -> Result<Vec<Value>> {
    sorts
        .iter()
        .map(|sort| compile_sort(registry, config, sort, locale))
        .collect()
}

fn compile_sort(
    registry: &SchemaRegistry,
    config: &GatewayConfig,
    sort: &SortOption,
    locale: &str,
) -> Result<Value> {
    match sort {
        SortOption::Relevance { direction } => {
            Ok(json!({"_score": {"order": direction.as_token()}}))
        }
        SortOption::Script {
            script,
            value_type,
            direction,
        } => Ok(json!({
            "_script": {
                "script": script,
                "type": value_type.as_token(),
                "order": direction.as_token(),
            }
        })),
        SortOption::Field {
            field,
            direction,
            array_mode,
            filter,
        } => compile_field_sort(registry, config, field, *direction, *array_mode, filter, locale),
    }
}

fn compile_field_sort(
    registry: &SchemaRegistry,
    config: &GatewayConfig,
    field: &str,
    direction: SortDirection,
    array_mode: ArrayMode,
    filter: &Option<Expression>,
    locale: &str,
) -> Result<Value> {
    if registry.resolve(field).is_none() {
        // Unconfigured fields get a plain sort on the top-level name so
        // server-side mappings outside the schema remain usable.
        warn!(field, "sorting on a field missing from the schema");
        let clause = json!({
            "order": direction.as_token(),
            "missing": config.missing_value_position.as_token(),
        });
        return Ok(json!({ (schema::top_level_name(field)): clause }));
    }

    let resolved = compiler::resolve_field(registry, field, locale)?;
    let sort_name = if resolved.leaf.kind == FieldKind::Text {
        registry.sort_alias(resolved.leaf, &resolved.name)?
    } else {
        resolved.name.clone()
    };

    let mut clause = Map::new();
    clause.insert("order".into(), json!(direction.as_token()));
    clause.insert("mode".into(), json!(array_mode.as_token(direction)));
    clause.insert(
        "missing".into(),
        json!(config.missing_value_position.as_token()),
    );

    if let Some(path) = &resolved.nested_path {
        let mut nested = Map::new();
        nested.insert("path".into(), json!(path));
        if let Some(filter) = filter {
            nested.insert(
                "filter".into(),
                compiler::compile_expression(registry, filter, locale)?,
            );
        }
        clause.insert("nested".into(), Value::Object(nested));
    }

    Ok(json!({ sort_name: Value::Object(clause) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new(
            vec![
                FieldSchema::text("title").multilang(true).sortable(true),
                FieldSchema::text("caption"),
                FieldSchema::integer("count"),
                FieldSchema::nested(
                    "article",
                    vec![
                        FieldSchema::text("author").sortable(true),
                        FieldSchema::integer("pages"),
                    ],
                ),
            ],
            vec!["de".into(), "en".into()],
        )
    }

    fn compile(sort: SortOption) -> Result<Value> {
        compile_sort(&registry(), &GatewayConfig::default(), &sort, "de")
    }

    #[test]
    fn test_relevance_sorts_by_score() {
        let clause = compile(SortOption::relevance()).unwrap();
        assert_eq!(clause, json!({"_score": {"order": "desc"}}));
    }

    #[test]
    fn test_sortable_text_uses_localized_sort_alias() {
        let clause = compile(SortOption::asc("title")).unwrap();
        let body = &clause["title.de.sort"];
        assert_eq!(body["order"], json!("asc"));
        assert_eq!(body["missing"], json!("_last"));
    }

    #[test]
    fn test_unsortable_text_is_rejected() {
        assert!(compile(SortOption::asc("caption")).is_err());
    }

    #[test]
    fn test_scalar_sorts_on_field_itself() {
        let clause = compile(SortOption::desc("count")).unwrap();
        assert!(clause.get("count").is_some());
    }

    #[test]
    fn test_default_mode_follows_direction() {
        let asc = compile(SortOption::asc("count")).unwrap();
        assert_eq!(asc["count"]["mode"], json!("min"));
        let desc = compile(SortOption::desc("count")).unwrap();
        assert_eq!(desc["count"]["mode"], json!("max"));
    }

    #[test]
    fn test_explicit_mode_overrides_direction() {
        let clause = compile(SortOption::asc("count").with_array_mode(ArrayMode::Avg)).unwrap();
        assert_eq!(clause["count"]["mode"], json!("avg"));
    }

    #[test]
    fn test_nested_child_sort_scoped_to_parent_path() {
        let clause = compile(SortOption::asc("article.pages")).unwrap();
        let body = &clause["article.pages"];
        assert_eq!(body["nested"]["path"], json!("article"));
    }

    #[test]
    fn test_nested_sort_filter_compiled() {
        let sort = SortOption::asc("article.pages")
            .with_nested_filter(Expression::eq("article.author", "kafka"));
        let clause = compile(sort).unwrap();
        let filter = &clause["article.pages"]["nested"]["filter"];
        assert!(filter.get("nested").is_some() || filter.get("match").is_some());
    }

    #[test]
    fn test_unconfigured_field_falls_back_to_plain_sort() {
        let clause = compile(SortOption::desc("server_only.sub")).unwrap();
        assert_eq!(clause["server_only"]["order"], json!("desc"));
        assert_eq!(clause["server_only"]["missing"], json!("_last"));
    }

    #[test]
    fn test_script_sort_bypasses_schema() {
        let sort = SortOption::Script {
            script: json!({"source": "doc['count'].value * 2"}),
            value_type: ScriptSortType::Number,
            direction: SortDirection::Desc,
        };
        let clause = compile(sort).unwrap();
        assert_eq!(clause["_script"]["order"], json!("desc"));
        assert_eq!(clause["_script"]["type"], json!("number"));
    }

    #[test]
    fn test_missing_first_policy() {
        let config = GatewayConfig {
            missing_value_position: crate::config::MissingValuePosition::First,
            ..Default::default()
        };
        let clause = compile_sort(&registry(), &config, &SortOption::asc("count"), "de").unwrap();
        assert_eq!(clause["count"]["missing"], json!("_first"));
    }
}
