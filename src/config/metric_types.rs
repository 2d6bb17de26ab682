//! Metric type enumeration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The two metric families a backend can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Custom,
    External,
}

impl MetricType {
    pub const ALL: [MetricType; 2] = [MetricType::Custom, MetricType::External];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Custom => "custom",
            MetricType::External => "external",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of metric types a backend is configured to serve.
///
/// An empty set means "all types": a backend that does not restrict its
/// `metricTypes` serves both custom and external metrics. Unknown type
/// names are rejected at deserialization time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricTypes(pub Vec<MetricType>);

impl MetricTypes {
    pub fn has_type(&self, metric_type: MetricType) -> bool {
        self.0.is_empty() || self.0.contains(&metric_type)
    }

    /// The concrete types served, expanding "unrestricted" to all.
    pub fn supported(&self) -> Vec<MetricType> {
        MetricType::ALL
            .into_iter()
            .filter(|t| self.has_type(*t))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_serves_all_types() {
        let types = MetricTypes::default();
        assert!(types.has_type(MetricType::Custom));
        assert!(types.has_type(MetricType::External));
        assert_eq!(types.supported(), vec![MetricType::Custom, MetricType::External]);
    }

    #[test]
    fn restricted_set_excludes_other_types() {
        let types: MetricTypes = serde_yaml::from_str("[custom]").unwrap();
        assert!(types.has_type(MetricType::Custom));
        assert!(!types.has_type(MetricType::External));
        assert_eq!(types.supported(), vec![MetricType::Custom]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result: Result<MetricTypes, _> = serde_yaml::from_str("[custom, bogus]");
        assert!(result.is_err());
    }
}
