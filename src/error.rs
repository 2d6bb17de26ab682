//! Hugin error types

/// Hugin error types
///
/// Discovery and query failures share one taxonomy so listeners and the
/// aggregation façade can react on the error kind without re-classifying:
/// configuration problems are fatal at startup only, upstream/transport
/// problems are counted and healed by the next discovery tick, and the
/// `*NotFound` variants are propagated to the caller.
#[derive(Debug, thiserror::Error)]
pub enum HuginError {
    // Configuration errors (startup only)
    #[error("configuration error: {0}")]
    Configuration(String),

    // Backend/transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("upstream error [{status}] {kind}: {reason}")]
    Upstream {
        status: u16,
        kind: String,
        reason: String,
    },

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    // Catalog errors
    #[error("{0}")]
    MetricNotFound(String),

    /// Exported metric name has no registered alias. Indicates a query
    /// raced a catalog swap; treated as `MetricNotFound` at the façade.
    #[error("metric name alias not found: {0}")]
    AliasNotFound(String),
}

impl HuginError {
    /// Whether this error means "the metric is not served", in the
    /// platform's not-found taxonomy (HTTP 404).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HuginError::MetricNotFound(_) | HuginError::AliasNotFound(_)
        )
    }

    /// HTTP status code equivalent for the outer API surface.
    pub fn status_code(&self) -> u16 {
        match self {
            HuginError::MetricNotFound(_) | HuginError::AliasNotFound(_) => 404,
            HuginError::Upstream { status, .. } => *status,
            _ => 500,
        }
    }

    /// Collapse `AliasNotFound` into `MetricNotFound`, preserving the
    /// message. Applied once, at the aggregation boundary.
    pub fn into_not_found(self) -> Self {
        match self {
            HuginError::AliasNotFound(msg) => HuginError::MetricNotFound(msg),
            other => other,
        }
    }
}

impl From<reqwest::Error> for HuginError {
    fn from(err: reqwest::Error) -> Self {
        HuginError::Http(err.to_string())
    }
}

/// Result type alias for hugin operations
pub type Result<T> = std::result::Result<T, HuginError>;
