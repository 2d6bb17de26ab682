//! Core metric identities and value shapes.
//!
//! These are the in-memory equivalents of the platform's
//! `custom.metrics.k8s.io` / `external.metrics.k8s.io` objects. Identities
//! are structural map keys; values always carry the discovery-provided
//! identity, with aliasing resolved only inside a backend adapter.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HuginError;

/// A `resource[.group]` pair, e.g. `pods` or `deployments.apps`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupResource {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub resource: String,
}

impl GroupResource {
    pub fn new(group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }

    /// Parse the `resource[.group]` form used by the metrics APIs.
    pub fn parse(s: &str) -> Self {
        match s.split_once('.') {
            Some((resource, group)) => Self::new(group, resource),
            None => Self::new("", s),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

/// Identity of a custom (object-attached) metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CustomMetricInfo {
    pub group_resource: GroupResource,
    pub namespaced: bool,
    pub metric: String,
}

impl fmt::Display for CustomMetricInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_resource, self.metric)
    }
}

/// Identity of an external metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExternalMetricInfo {
    pub metric: String,
}

impl fmt::Display for ExternalMetricInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metric)
    }
}

/// Namespace/name pair of the object a query targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ============================================================================
// Quantity
// ============================================================================

/// Decimal quantity with milli precision.
///
/// Stored as milli-units: `2.5` is `Quantity(2500)` and renders as `2500m`,
/// whole values render without the suffix (`2000m` renders as `2`). NaN
/// upstream values are represented as `0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quantity(i64);

impl Quantity {
    pub const fn from_millis(millis: i64) -> Self {
        Quantity(millis)
    }

    /// Convert a raw float into a milli-precision quantity; NaN maps to 0.
    pub fn from_value(value: f64) -> Self {
        if value.is_nan() {
            Quantity(0)
        } else {
            Quantity((value * 1000.0).round() as i64)
        }
    }

    pub const fn millis(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}", self.0 / 1000)
        } else {
            write!(f, "{}m", self.0)
        }
    }
}

impl FromStr for Quantity {
    type Err = HuginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || HuginError::MalformedResponse(format!("invalid quantity: {s:?}"));
        if let Some(millis) = s.strip_suffix('m') {
            return millis.parse::<i64>().map(Quantity).map_err(|_| parse_err());
        }
        let value = s.parse::<f64>().map_err(|_| parse_err())?;
        if value.is_nan() {
            return Err(parse_err());
        }
        Ok(Quantity::from_value(value))
    }
}

impl Serialize for Quantity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// A single label-selector requirement: key plus one or more accepted values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub values: Vec<String>,
}

/// Query-side label selector, as handed over by the platform.
///
/// The doc-store adapter reduces this to a `key -> first value` map because
/// its queries expect scalar match terms; that reduction is deliberately
/// lossy (see [`Selector::first_values`]).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub requirements: Vec<Requirement>,
}

impl Selector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Parse the `k1=v1,k2=v2` equality form.
    pub fn parse(s: &str) -> Self {
        let requirements = s
            .split(',')
            .filter_map(|part| {
                let (key, value) = part.split_once('=')?;
                Some(Requirement {
                    key: key.trim().to_string(),
                    values: vec![value.trim().to_string()],
                })
            })
            .collect();
        Self { requirements }
    }

    /// Reduce to `key -> first value`. Requirements without values are
    /// dropped; extra values per key are ignored.
    pub fn first_values(&self) -> BTreeMap<String, String> {
        self.requirements
            .iter()
            .filter_map(|r| Some((r.key.clone(), r.values.first()?.clone())))
            .collect()
    }

    /// Wire form carried back in `metric.selector`, or `None` when empty.
    pub fn to_label_selector(&self) -> Option<LabelSelector> {
        if self.is_empty() {
            return None;
        }
        Some(LabelSelector {
            match_labels: self.first_values(),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for r in &self.requirements {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            match r.values.as_slice() {
                [single] => write!(f, "{}={}", r.key, single)?,
                values => write!(f, "{} in ({})", r.key, values.join(","))?,
            }
        }
        Ok(())
    }
}

/// Wire-shape label selector (`matchLabels` only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

// ============================================================================
// Metric value shapes (custom.metrics.k8s.io/v1beta2 compatible)
// ============================================================================

/// Reference to the object a custom metric describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricIdentifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

/// A single custom metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub described_object: ObjectReference,
    pub metric: MetricIdentifier,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValueList {
    pub items: Vec<MetricValue>,
}

/// A single external metric sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValue {
    pub metric_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metric_labels: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<i64>,
    pub value: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValueList {
    pub items: Vec<ExternalMetricValue>,
}
