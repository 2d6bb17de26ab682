//! Adapter configuration.
//!
//! Configuration is a single YAML document listing the metric servers to
//! federate plus the readiness probe tuning. Parsing and validation happen
//! together in [`Config::from_str`]: field patterns are compiled, defaults
//! applied and structural rules enforced, so a `Config` that exists is a
//! `Config` that is usable. Priorities are assigned from list position.

mod http_client;
mod metric_types;
mod name;

pub use http_client::{expand_env, AuthenticationConfig, HttpClientConfig, TlsClientConfig};
pub use metric_types::{MetricType, MetricTypes};
pub use name::{Namer, Rename};

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::error::{HuginError, Result};
use crate::types::GroupResource;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
const DEFAULT_FIELD_PATTERN: &str = "^.*$";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub readiness_probe: ReadinessProbe,
    #[serde(default)]
    pub metric_servers: Vec<MetricServer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessProbe {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

/// Which kind of backend a metric server entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Elasticsearch,
    Custom,
}

/// One federated metric backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricServer {
    pub name: String,
    pub server_type: ServerType,
    /// Rank among backends serving the same metric; assigned from list
    /// position at load time.
    #[serde(skip)]
    pub priority: i32,
    #[serde(default)]
    pub metric_types: MetricTypes,
    #[serde(default)]
    pub client_config: Option<HttpClientConfig>,
    #[serde(default)]
    pub metric_sets: Vec<MetricSet>,
    #[serde(default)]
    pub rename: Option<Rename>,
}

impl MetricServer {
    /// The client configuration, which validation guarantees for
    /// elasticsearch servers.
    pub fn client_config(&self) -> Result<&HttpClientConfig> {
        self.client_config.as_ref().ok_or_else(|| {
            HuginError::Configuration(format!("{}: clientConfig is required", self.name))
        })
    }
}

/// Index patterns paired with the field sets discoverable under them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSet {
    pub indices: Vec<String>,
    #[serde(default = "default_fields")]
    pub fields: FieldsSet,
}

fn default_fields() -> FieldsSet {
    FieldsSet(vec![Fields {
        patterns: vec![DEFAULT_FIELD_PATTERN.to_string()],
        ..Default::default()
    }])
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct FieldsSet(pub Vec<Fields>);

impl FieldsSet {
    /// First field set whose pattern matches the candidate metric name.
    /// Static entries (with a literal `name`) carry no patterns and never
    /// match here.
    pub fn find_metadata(&self, field_name: &str) -> Option<&Fields> {
        self.0.iter().find(|fields| {
            fields
                .compiled_patterns
                .iter()
                .any(|pattern| pattern.is_match(field_name))
        })
    }
}

/// Filter describing which document fields become discoverable metrics,
/// or a single static field with an attached search.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fields {
    /// Filter which fields are exposed, for example `^prometheus\.metrics\.`
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(skip)]
    pub compiled_patterns: Vec<Regex>,
    /// Name of a static field.
    #[serde(default)]
    pub name: Option<String>,
    /// Search associated with the static field.
    #[serde(default)]
    pub search: Option<Search>,
    /// Which fields are labels, for example `^prometheus\.labels\.(.*)`
    #[serde(default)]
    pub labels: Vec<String>,
    /// Resource the metrics are attached to.
    #[serde(default = "default_group_resource")]
    pub resources: GroupResource,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            compiled_patterns: Vec::new(),
            name: None,
            search: None,
            labels: Vec::new(),
            resources: default_group_resource(),
        }
    }
}

// compiled_patterns is derived state; compare the declarative parts only.
impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.patterns == other.patterns
            && self.name == other.name
            && self.search == other.search
            && self.labels == other.labels
            && self.resources == other.resources
    }
}

fn default_group_resource() -> GroupResource {
    GroupResource::new("", "pods")
}

/// Custom search attached to a static field.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Search {
    /// Path extracting the metric value from the search response.
    pub metric_path: String,
    /// Path extracting the sample timestamp from the search response.
    pub timestamp_path: String,
    /// Search request body template.
    pub body: String,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        Self::from_str(&content)
    }

    /// Parse and validate a YAML configuration document.
    pub fn from_str(source: &str) -> Result<Self> {
        let mut config: Config = serde_yaml::from_str(source)
            .map_err(|e| HuginError::Configuration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        for (position, server) in self.metric_servers.iter_mut().enumerate() {
            server.priority = position as i32;

            if server.name.is_empty() {
                return Err(HuginError::Configuration(format!(
                    "metricServers[{position}]: name is required"
                )));
            }

            match server.server_type {
                ServerType::Custom => {
                    if !server.metric_sets.is_empty() {
                        return Err(HuginError::Configuration(format!(
                            "{}: metricSets is not supported for serverType custom",
                            server.name
                        )));
                    }
                }
                ServerType::Elasticsearch => {
                    if server.client_config.is_none() {
                        return Err(HuginError::Configuration(format!(
                            "{}: clientConfig is required for serverType elasticsearch",
                            server.name
                        )));
                    }
                    if server.metric_sets.is_empty() {
                        warn!(server = %server.name, "no metricSets configured, nothing will be discovered");
                    }
                }
            }

            if let Some(rename) = &server.rename {
                if rename.matches.is_empty() || rename.as_.is_empty() {
                    return Err(HuginError::Configuration(format!(
                        "{}: rename requires both matches and as",
                        server.name
                    )));
                }
                // fail fast on an uncompilable pattern
                Namer::new(Some(rename))?;
            }

            for metric_set in &mut server.metric_sets {
                for fields in &mut metric_set.fields.0 {
                    compile_fields(&server.name, fields)?;
                }
            }
        }
        Ok(())
    }
}

fn compile_fields(server: &str, fields: &mut Fields) -> Result<()> {
    if let Some(name) = &fields.name {
        let search_complete = fields.search.as_ref().is_some_and(|s| {
            !s.body.is_empty() && !s.metric_path.is_empty() && !s.timestamp_path.is_empty()
        });
        if !search_complete {
            return Err(HuginError::Configuration(format!(
                "{server}: static field {name} requires search with body, metricPath and timestampPath"
            )));
        }
    } else if fields.patterns.is_empty() {
        fields.patterns = vec![DEFAULT_FIELD_PATTERN.to_string()];
    }

    fields.compiled_patterns = fields
        .patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                HuginError::Configuration(format!("{server}: invalid field pattern {pattern:?}: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for label in &fields.labels {
        Regex::new(label).map_err(|e| {
            HuginError::Configuration(format!("{server}: invalid label pattern {label:?}: {e}"))
        })?;
    }
    Ok(())
}
