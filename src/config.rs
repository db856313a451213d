//! Configuration for the gateway.
//!
//! # Example
//!
//! ```
//! use search_gateway::GatewayConfig;
//!
//! // Minimal config (uses defaults)
//! let config = GatewayConfig::default();
//! assert_eq!(config.indexing_bulk_size, 1000);
//! assert_eq!(config.delete_chunk_size, 10_000);
//!
//! // Full config
//! let config = GatewayConfig {
//!     max_page_size: 500,
//!     shard_size_factor: 10,
//!     ..Default::default()
//! };
//! ```

use serde::Deserialize;

/// Where documents with missing sort values are placed, applied uniformly
/// to every field sort clause the gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePosition {
    First,
    Last,
}

impl MissingValuePosition {
    /// Backend token for the missing-value slot (`_first` / `_last`).
    #[must_use]
    pub fn as_token(self) -> &'static str {
        match self {
            MissingValuePosition::First => "_first",
            MissingValuePosition::Last => "_last",
        }
    }
}

/// Configuration for the gateway.
///
/// All fields have defaults matching typical backend limits; tune
/// `indexing_bulk_size` and `shard_size_factor` per workload.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Maximum number of documents per bulk indexing chunk.
    #[serde(default = "default_indexing_bulk_size")]
    pub indexing_bulk_size: usize,

    /// Maximum number of ids per bulk delete chunk.
    #[serde(default = "default_delete_chunk_size")]
    pub delete_chunk_size: usize,

    /// Maximum page size a caller may request.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Largest result window the backend accepts (`from + size` ceiling),
    /// also the default size when no range is given.
    #[serde(default = "default_max_result_window")]
    pub max_result_window: usize,

    /// Multiplier applied to a facet's requested bucket count to determine
    /// the per-shard size (`shard_size = size * factor`).
    #[serde(default = "default_shard_size_factor")]
    pub shard_size_factor: usize,

    /// Default maximum bucket count for facet requests that don't set one.
    #[serde(default = "default_aggregation_max_count")]
    pub default_aggregation_max_count: usize,

    /// How long the availability check waits for minimum cluster health.
    #[serde(default = "default_check_status_timeout_ms")]
    pub check_status_timeout_ms: u64,

    /// Missing-value placement policy for sorts.
    #[serde(default = "default_missing_value_position")]
    pub missing_value_position: MissingValuePosition,

    /// Whether expressions are passed through `optimize()` before compiling.
    #[serde(default = "default_optimize_expressions")]
    pub optimize_expressions: bool,

    /// Maximum number of mutation records retained per alias in the replay
    /// cache. Oldest records are evicted first.
    #[serde(default = "default_replay_capacity")]
    pub replay_capacity: usize,
}

fn default_indexing_bulk_size() -> usize { 1000 }
fn default_delete_chunk_size() -> usize { 10_000 }
fn default_max_page_size() -> usize { 2000 }
fn default_max_result_window() -> usize { 10_000 }
fn default_shard_size_factor() -> usize { 5 }
fn default_aggregation_max_count() -> usize { 250 }
fn default_check_status_timeout_ms() -> u64 { 10_000 }
fn default_missing_value_position() -> MissingValuePosition { MissingValuePosition::Last }
fn default_optimize_expressions() -> bool { true }
fn default_replay_capacity() -> usize { 1000 }

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            indexing_bulk_size: default_indexing_bulk_size(),
            delete_chunk_size: default_delete_chunk_size(),
            max_page_size: default_max_page_size(),
            max_result_window: default_max_result_window(),
            shard_size_factor: default_shard_size_factor(),
            default_aggregation_max_count: default_aggregation_max_count(),
            check_status_timeout_ms: default_check_status_timeout_ms(),
            missing_value_position: default_missing_value_position(),
            optimize_expressions: default_optimize_expressions(),
            replay_capacity: default_replay_capacity(),
        }
    }
}
