// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field schema registry and backend field-name resolution.
//!
//! The registry is supplied by the application's schema provider and is
//! read-only to the gateway. It answers three questions for the compilers:
//! which configuration a (possibly dotted) field name maps to, what the
//! field is called on the backend for a given locale, and which keyword or
//! sort alias addresses the field's non-analyzed representation.
//!
//! # Example
//!
//! ```
//! use search_gateway::schema::{FieldSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::new(
//!     vec![
//!         FieldSchema::text("title").multilang(true).sortable(true),
//!         FieldSchema::keyword("keyword"),
//!     ],
//!     vec!["de".into(), "en".into()],
//! );
//!
//! let title = registry.require("title").unwrap();
//! assert_eq!(registry.backend_field_name(title, "title", "de"), "title.de");
//! assert_eq!(registry.sort_alias(title, "title.de").unwrap(), "title.de.sort");
//! ```
//!
//! # Design
//!
//! - **Exact match first**: dotted names fall back to the part before the
//!   first `.` only when the exact name is unconfigured.
//! - **Nested children are scoped**: a nested child resolves relative to its
//!   declared parent only, never across parents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Data kind of a configured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Analyzed free text.
    Text,
    /// Non-analyzed exact-match string.
    Keyword,
    Integer,
    Float,
    Date,
    Boolean,
    /// A list of structured sub-documents with nested query semantics.
    NestedObject,
}

impl FieldKind {
    /// Whether the field has a column-store (doc-value) representation of
    /// its own, without needing a keyword sub-field.
    #[must_use]
    pub fn has_native_doc_values(self) -> bool {
        !matches!(self, FieldKind::Text | FieldKind::NestedObject)
    }
}

/// Configuration of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: FieldKind,
    /// Whether a non-analyzed sortable alias exists for this field.
    #[serde(default)]
    pub sortable: bool,
    /// Whether the field is indexed once per supported locale
    /// (`name.<lang>`).
    #[serde(default)]
    pub multilang: bool,
    /// Name of the configured parent field, for denormalized sub-fields.
    #[serde(default)]
    pub parent: Option<String>,
    /// Nested child fields, keyed by child name. Only meaningful for
    /// [`FieldKind::NestedObject`].
    #[serde(default)]
    pub children: BTreeMap<String, FieldSchema>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            sortable: false,
            multilang: false,
            parent: None,
            children: BTreeMap::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Keyword)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// Create a nested-object field from its child configurations.
    pub fn nested(name: impl Into<String>, children: Vec<FieldSchema>) -> Self {
        let name = name.into();
        let mut field = Self::new(name.clone(), FieldKind::NestedObject);
        for mut child in children {
            child.parent = Some(name.clone());
            field.children.insert(child.name.clone(), child);
        }
        field
    }

    #[must_use]
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    #[must_use]
    pub fn multilang(mut self, multilang: bool) -> Self {
        self.multilang = multilang;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Look up a nested child by its name relative to this field.
    #[must_use]
    pub fn nested_child(&self, child_name: &str) -> Option<&FieldSchema> {
        self.children.get(child_name)
    }
}

/// Ordered field configuration set plus the supported locales, as supplied
/// by the schema provider.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    fields: BTreeMap<String, FieldSchema>,
    locales: Vec<String>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new(fields: Vec<FieldSchema>, locales: Vec<String>) -> Self {
        let fields = fields
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect::<BTreeMap<_, _>>();
        Self { fields, locales }
    }

    /// Supported locales, one sort configuration each.
    #[must_use]
    pub fn locales(&self) -> &[String] {
        &self.locales
    }

    /// Exact-name lookup.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Exact-name lookup that fails with [`GatewayError::FieldResolution`].
    pub fn require(&self, name: &str) -> Result<&FieldSchema> {
        self.field(name)
            .ok_or_else(|| GatewayError::FieldResolution(name.to_string()))
    }

    /// Resolve a possibly dotted field name: the exact name first, then the
    /// configuration of the part before the first `.`.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&FieldSchema> {
        if let Some(field) = self.fields.get(name) {
            return Some(field);
        }
        let top = top_level_name(name);
        if top != name {
            return self.fields.get(top);
        }
        None
    }

    /// Backend name of a field for the given locale. Multi-language fields
    /// are indexed once per locale under `name.<lang>`.
    #[must_use]
    pub fn backend_field_name(&self, field: &FieldSchema, dotted_name: &str, locale: &str) -> String {
        if field.multilang {
            format!("{dotted_name}.{locale}")
        } else {
            dotted_name.to_string()
        }
    }

    /// Keyword / doc-value alias of a field. Text fields carry a `.keyword`
    /// sub-field; keyword and scalar fields are their own alias; nested
    /// objects have none.
    #[must_use]
    pub fn keyword_alias(&self, field: &FieldSchema, resolved_name: &str) -> Option<String> {
        match field.kind {
            FieldKind::Text => Some(format!("{resolved_name}.keyword")),
            FieldKind::NestedObject => None,
            _ => Some(resolved_name.to_string()),
        }
    }

    /// Sortable alias of a field. Text fields sort on a dedicated
    /// non-analyzed `.sort` sub-field and must be flagged sortable.
    pub fn sort_alias(&self, field: &FieldSchema, resolved_name: &str) -> Result<String> {
        match field.kind {
            FieldKind::Text => {
                if field.sortable {
                    Ok(format!("{resolved_name}.sort"))
                } else {
                    Err(GatewayError::NotSortable(field.name.clone()))
                }
            }
            _ => Ok(resolved_name.to_string()),
        }
    }

    /// Validate that every listed field name is configured, before any
    /// backend call is made.
    pub fn validate_fields<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<()> {
        for name in names {
            self.require(name)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Part of a dotted field name before the first separator.
#[must_use]
pub fn top_level_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Part of a dotted field name after the first separator, if any.
#[must_use]
pub fn sub_field_name(name: &str) -> Option<&str> {
    name.split_once('.').map(|(_, rest)| rest)
}
