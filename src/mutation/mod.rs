//! Index mutation pipeline: chunked bulk writes and the rebuild replay log.

pub mod batcher;
pub mod replay;

use serde::{Deserialize, Serialize};

pub use batcher::{MutationBatcher, MutationReport};
pub use replay::ReplayLog;

/// How a mutation's visibility is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChangeProcessingMode {
    /// Return once the backend accepted the write; visibility follows the
    /// backend's own refresh cycle.
    #[default]
    Background,
    /// Ask the backend to make the change searchable before returning.
    Blocking,
}

impl DataChangeProcessingMode {
    /// Whether bulk calls should request an immediate refresh.
    #[must_use]
    pub fn is_refresh(self) -> bool {
        matches!(self, DataChangeProcessingMode::Blocking)
    }
}
