//! Backend response shapes and caller-facing result types.
//!
//! [`RawQueryResponse`] is what a [`crate::backend::SearchBackend`] hands
//! back; [`SearchResult`] is what the gateway returns after projecting hits
//! and converting aggregations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GatewayError, Result};

/// A single hit as reported by the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub score: Option<f64>,
    /// Full stored document, when source fetching was enabled.
    #[serde(default)]
    pub source: Option<Map<String, Value>>,
    /// Doc-value fields, each rendered as an array by the backend.
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// Nested inner hits in backend response order.
    #[serde(default)]
    pub inner_hits: Vec<(String, Vec<SearchHit>)>,
}

/// Raw search response from the backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQueryResponse {
    pub total_hits: u64,
    /// Whether `total_hits` is exact or a lower bound.
    pub exact: bool,
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub aggregations: Map<String, Value>,
}

/// One projected result document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultItem {
    pub id: String,
    pub attributes: Map<String, Value>,
    /// Projected inner hits, preserving backend order.
    #[serde(default)]
    pub inner: Vec<(String, Vec<ResultItem>)>,
}

/// Project a hit into a document map: the stored source when present,
/// otherwise the doc-value fields with single-element arrays unwrapped.
/// A hit carrying neither is a backend contract violation.
pub fn project_hit(hit: &SearchHit) -> Result<ResultItem> {
    let attributes = if let Some(source) = &hit.source {
        source.clone()
    } else if !hit.fields.is_empty() {
        let mut attributes = Map::new();
        for (name, value) in &hit.fields {
            attributes.insert(name.clone(), unwrap_single(value));
        }
        attributes
    } else {
        return Err(GatewayError::InvalidArgument(format!(
            "hit '{}' carries neither source nor doc-value fields",
            hit.id
        )));
    };

    let mut inner = Vec::with_capacity(hit.inner_hits.len());
    for (name, hits) in &hit.inner_hits {
        let items = hits.iter().map(project_hit).collect::<Result<Vec<_>>>()?;
        inner.push((name.clone(), items));
    }

    Ok(ResultItem {
        id: hit.id.clone(),
        attributes,
        inner,
    })
}

fn unwrap_single(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() == 1 => items[0].clone(),
        other => other.clone(),
    }
}

/// One bucket of a converted facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetItem {
    Term { value: Value, count: u64 },
    Range {
        from: Option<f64>,
        to: Option<f64>,
        count: u64,
    },
}

impl FacetItem {
    #[must_use]
    pub fn count(&self) -> u64 {
        match self {
            FacetItem::Term { count, .. } | FacetItem::Range { count, .. } => *count,
        }
    }
}

/// A converted facet, named after the aggregation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetResult {
    pub name: String,
    /// The schema field the facet was computed over, when known.
    pub field: Option<String>,
    pub items: Vec<FacetItem>,
}

impl FacetResult {
    /// Sum of all bucket counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.items.iter().map(FacetItem::count).sum()
    }
}

/// Final result of a gateway search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub items: Vec<ResultItem>,
    /// 1-based page index this result covers.
    pub page_index: usize,
    pub page_size: usize,
    /// Number of hits reachable via paging (capped by the result window).
    pub result_count: u64,
    /// Total matching documents reported by the backend.
    pub total_hit_count: u64,
    /// Whether `total_hit_count` is exact.
    pub exact_count: bool,
    pub facets: Vec<FacetResult>,
}

impl SearchResult {
    /// Number of pages needed to walk `result_count` hits.
    #[must_use]
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }
        ((self.result_count as usize) + self.page_size - 1) / self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_projection_prefers_source() {
        let hit = SearchHit {
            id: "7".into(),
            source: Some(map(&[("title", json!("a"))])),
            fields: map(&[("title.keyword", json!(["b"]))]),
            ..Default::default()
        };
        let item = project_hit(&hit).unwrap();
        assert_eq!(item.attributes, map(&[("title", json!("a"))]));
    }

    #[test]
    fn test_projection_unwraps_single_element_doc_values() {
        let hit = SearchHit {
            id: "7".into(),
            fields: map(&[
                ("keyword", json!(["press"])),
                ("tags", json!(["a", "b"])),
            ]),
            ..Default::default()
        };
        let item = project_hit(&hit).unwrap();
        assert_eq!(item.attributes["keyword"], json!("press"));
        assert_eq!(item.attributes["tags"], json!(["a", "b"]));
    }

    #[test]
    fn test_projection_without_any_values_fails() {
        let hit = SearchHit {
            id: "7".into(),
            ..Default::default()
        };
        assert!(project_hit(&hit).is_err());
    }

    #[test]
    fn test_inner_hits_keep_order() {
        let child = SearchHit {
            id: "c".into(),
            source: Some(map(&[("author", json!("x"))])),
            ..Default::default()
        };
        let hit = SearchHit {
            id: "7".into(),
            source: Some(Map::new()),
            inner_hits: vec![
                ("article".into(), vec![child.clone()]),
                ("remarks".into(), vec![child]),
            ],
            ..Default::default()
        };
        let item = project_hit(&hit).unwrap();
        assert_eq!(item.inner[0].0, "article");
        assert_eq!(item.inner[1].0, "remarks");
    }

    #[test]
    fn test_page_count() {
        let result = SearchResult {
            items: vec![],
            page_index: 1,
            page_size: 10,
            result_count: 101,
            total_hit_count: 101,
            exact_count: true,
            facets: vec![],
        };
        assert_eq!(result.page_count(), 11);
    }
}
