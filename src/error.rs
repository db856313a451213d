// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the gateway.
//!
//! Schema and validation errors are raised before any backend call is made,
//! so a failed compilation never leaves partial side effects. Backend call
//! failures are wrapped with the alias and operation that triggered them.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// A field referenced in a projection, sort or facet is not in the schema.
    #[error("unknown field '{0}'")]
    FieldResolution(String),

    /// A text field without a sortable alias was used in a sort.
    #[error("field '{0}' is not configured as sortable")]
    NotSortable(String),

    /// The backend rejected the compiled query as malformed.
    #[error("query syntax error: {0}")]
    QuerySyntax(String),

    /// Aggregate failure of a bulk mutation chunk in strict mode.
    #[error("bulk operation on '{alias}' failed for {} document(s): {}", failures.len(), summarize(failures))]
    Bulk {
        alias: String,
        /// Failed document ids with their item-level error messages.
        failures: Vec<(String, String)>,
    },

    /// The backend could not be reached or did not report a healthy status.
    #[error("search backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Any other backend failure, wrapped with operation context.
    #[error("backend {operation} on '{alias}' failed: {source}")]
    Backend {
        alias: String,
        operation: &'static str,
        #[source]
        source: BackendError,
    },

    /// Invalid caller input that is not a schema lookup failure.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors produced by a [`crate::backend::SearchBackend`] implementation.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not parse the submitted query document.
    #[error("query parsing failed: {0}")]
    QuerySyntax(String),

    /// Transport or connectivity failure.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Any other backend-reported failure.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Wrap a backend error with operation context, promoting syntax and
    /// availability causes to their distinct variants.
    pub fn from_backend(alias: &str, operation: &'static str, source: BackendError) -> Self {
        match source {
            BackendError::QuerySyntax(msg) => GatewayError::QuerySyntax(msg),
            BackendError::Unavailable(msg) => GatewayError::BackendUnavailable(msg),
            other => GatewayError::Backend {
                alias: alias.to_string(),
                operation,
                source: other,
            },
        }
    }
}

fn summarize(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .take(3)
        .map(|(id, msg)| format!("{id}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}
