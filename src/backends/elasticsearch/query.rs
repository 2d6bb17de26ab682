//! Query construction and result extraction.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::path::PathExpr;
use crate::error::{HuginError, Result};
use crate::types::NamespacedName;

/// Default single-pod query for metrics without a configured search:
/// latest document carrying the field, scoped to the pod and namespace.
pub(crate) fn default_query(metric: &str, name: &NamespacedName) -> String {
    json!({
        "query": {
            "bool": {
                "must": [
                    { "exists": { "field": metric } },
                    { "match": { "kubernetes.namespace": name.namespace } },
                    { "match": { "kubernetes.pod.name": name.name } }
                ]
            }
        },
        "size": 1,
        "sort": [
            { "@timestamp": { "order": "desc" } }
        ]
    })
    .to_string()
}

/// Path to the metric value in a default-query response. Dotted metric
/// names navigate the nested `_source` objects.
pub(crate) fn hits_source_path(metric: &str) -> PathExpr {
    PathExpr::parse(".hits.hits.[0]._source")
        .expect("static path")
        .join_keys(metric.split('.'))
}

/// Path to the sample timestamp in a default-query response.
pub(crate) fn hits_timestamp_path() -> PathExpr {
    PathExpr::parse(".hits.hits.[0]._source.@timestamp").expect("static path")
}

/// Coerce an extracted JSON value to a float sample.
pub(crate) fn extract_value(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        HuginError::MalformedResponse(format!("metric value is not a number: {value}"))
    })
}

/// Parse an extracted JSON value as an RFC3339 timestamp.
pub(crate) fn extract_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let raw = value.as_str().ok_or_else(|| {
        HuginError::MalformedResponse(format!("timestamp is not a string: {value}"))
    })?;
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| HuginError::MalformedResponse(format!("invalid timestamp {raw:?}: {e}")))
}
