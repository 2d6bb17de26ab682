//! Metric discovery from index mappings.
//!
//! Each discovery cycle builds a fresh [`Catalog`]: static fields taken
//! straight from configuration, dynamic fields found by walking the index
//! mapping tree. The backend swaps the finished catalog in atomically, so
//! queries already in flight keep reading their own snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::path::PathExpr;
use super::template::BodyTemplate;
use crate::config::{FieldsSet, MetricServer, Namer};
use crate::error::Result;
use crate::types::{CustomMetricInfo, GroupResource};

/// Mapping leaf types that qualify as metrics.
const NUMERIC_TYPES: &[&str] = &[
    "byte",
    "double",
    "float",
    "half_float",
    "integer",
    "long",
    "scaled_float",
    "short",
    "unsigned_long",
];

fn is_type_allowed(t: &str) -> bool {
    NUMERIC_TYPES.contains(&t)
}

/// Compiled search of a static field: body template plus result paths,
/// all parsed once at backend construction.
#[derive(Debug, Clone)]
pub(crate) struct CompiledSearch {
    pub body: BodyTemplate,
    pub metric_path: PathExpr,
    pub timestamp_path: PathExpr,
}

/// What the backend needs to query one discovered metric.
#[derive(Debug, Clone)]
pub(crate) struct MetricMetadata {
    pub indices: Vec<String>,
    pub search: Option<Arc<CompiledSearch>>,
}

/// A configured static field, compiled and ready to register.
#[derive(Debug, Clone)]
pub(crate) struct StaticField {
    pub name: String,
    pub indices: Vec<String>,
    pub resources: GroupResource,
    pub search: Arc<CompiledSearch>,
}

/// Compile the static fields of a metric server configuration.
pub(crate) fn compile_static_fields(cfg: &MetricServer) -> Result<Vec<StaticField>> {
    let mut compiled = Vec::new();
    for metric_set in &cfg.metric_sets {
        for fields in &metric_set.fields.0 {
            let (Some(name), Some(search)) = (&fields.name, &fields.search) else {
                continue;
            };
            compiled.push(StaticField {
                name: name.clone(),
                indices: metric_set.indices.clone(),
                resources: fields.resources.clone(),
                search: Arc::new(CompiledSearch {
                    body: BodyTemplate::parse(&search.body)?,
                    metric_path: PathExpr::parse(&search.metric_path)?,
                    timestamp_path: PathExpr::parse(&search.timestamp_path)?,
                }),
            });
        }
    }
    Ok(compiled)
}

/// One discovery cycle's view of the backend: known metrics keyed by their
/// backend-local name, their query metadata, and the alias map.
pub(crate) struct Catalog {
    pub metrics: HashMap<String, CustomMetricInfo>,
    pub indexed_metrics: HashMap<String, MetricMetadata>,
    pub namer: Namer,
}

impl Catalog {
    pub fn new(namer: Namer) -> Self {
        Self {
            metrics: HashMap::new(),
            indexed_metrics: HashMap::new(),
            namer,
        }
    }

    pub fn record_static_field(&mut self, field: &StaticField) {
        let exported = self.namer.register(&field.name);
        self.metrics.insert(
            field.name.clone(),
            CustomMetricInfo {
                group_resource: field.resources.clone(),
                namespaced: true,
                metric: exported,
            },
        );
        self.indexed_metrics.insert(
            field.name.clone(),
            MetricMetadata {
                indices: field.indices.clone(),
                search: Some(field.search.clone()),
            },
        );
    }

    /// Walk one index's mapping document, recording every numeric leaf that
    /// matches a configured field pattern.
    pub fn process_mapping_document(
        &mut self,
        mapping: &Value,
        fields: &FieldsSet,
        indices: &[String],
    ) {
        let Some(properties) = mapping.get("properties").and_then(Value::as_object) else {
            debug!("mapping has no properties object, nothing to discover");
            return;
        };
        self.walk("", properties, fields, indices);
    }

    fn walk(
        &mut self,
        root: &str,
        node: &serde_json::Map<String, Value>,
        fields: &FieldsSet,
        indices: &[String],
    ) {
        for (key, child) in node {
            if key == "*" {
                continue;
            }
            if key == "properties" {
                if let Some(child) = child.as_object() {
                    self.walk(root, child, fields, indices);
                }
                continue;
            }
            let Some(child) = child.as_object() else {
                continue;
            };
            let name = if root.is_empty() {
                key.clone()
            } else {
                format!("{root}.{key}")
            };
            if child.get("properties").is_some() {
                self.walk(&name, child, fields, indices);
                continue;
            }
            match child.get("type").and_then(Value::as_str) {
                Some(t) if is_type_allowed(t) => {}
                _ => continue,
            }
            let Some(matched) = fields.find_metadata(&name) else {
                // field does not match a pattern, do not register it as available
                continue;
            };
            let exported = self.namer.register(&name);
            self.metrics.insert(
                name.clone(),
                CustomMetricInfo {
                    group_resource: matched.resources.clone(),
                    namespaced: true,
                    metric: exported,
                },
            );
            self.indexed_metrics.insert(
                name,
                MetricMetadata {
                    indices: indices.to_vec(),
                    search: None,
                },
            );
        }
    }
}
