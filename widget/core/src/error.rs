//! Widget Errors
//!
//! One error type covers every failure the widget can observe while talking
//! to the API or its local store. Callers decide how each kind is rendered:
//! chat failures become assistant entries, form failures become inline form
//! state, and config failures are only logged.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the widget core
#[derive(Debug, Error)]
pub enum WidgetError {
    /// Network or transport failure (connection refused, reset, TLS, ...)
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-2xx status
    ///
    /// Displays as the response body text, or `HTTP <status>` when the body
    /// was empty.
    #[error("{}", http_message(.status, .body))]
    Http {
        /// HTTP status code
        status: u16,
        /// Response body text (may be empty)
        body: String,
    },

    /// The request was cancelled by the visitor
    #[error("Request cancelled")]
    Cancelled,

    /// A client-side deadline elapsed before the API answered
    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The API answered 2xx but the body was not what we expected
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured API base or a derived URL is not usable
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Local store could not be read or written
    #[error("Storage error at {}: {source}", .path.display())]
    Storage {
        /// Path of the store file
        path: std::path::PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
}

fn http_message(status: &u16, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.to_string()
    }
}

impl WidgetError {
    /// Whether this error represents a visitor-initiated cancellation
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status, when the failure was a non-2xx response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result alias for widget operations
pub type WidgetResult<T> = Result<T, WidgetError>;
