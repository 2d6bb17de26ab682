//! Compiled search-body templates.
//!
//! A static field's search body is a text template with named placeholders
//! filled in per query:
//!
//! - `{{metric}}`, `{{pod}}`, `{{namespace}}`: plain string substitution
//! - `{{podSelectors}}`: the selector reduced to a JSON object of
//!   `key: first value`
//! - `{{podSelectors.some-key}}`: a single selector value
//! - `{{objects}}`: JSON array of the peer object names
//!
//! Templates are compiled once; rendering never fails.

use std::collections::BTreeMap;

use crate::error::{HuginError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Literal(String),
    Metric,
    Pod,
    Namespace,
    Objects,
    PodSelectors,
    PodSelector(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyTemplate {
    chunks: Vec<Chunk>,
}

/// Per-query values a template is rendered with.
#[derive(Debug, Default)]
pub struct SearchContext<'a> {
    pub metric: &'a str,
    pub pod: &'a str,
    pub namespace: &'a str,
    pub pod_selectors: BTreeMap<String, String>,
    pub objects: &'a [String],
}

impl BodyTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let mut chunks = Vec::new();
        let mut rest = source;
        while let Some(start) = rest.find("{{") {
            if start > 0 {
                chunks.push(Chunk::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                HuginError::Configuration(format!("unclosed placeholder in template: {source:?}"))
            })?;
            chunks.push(parse_placeholder(after[..end].trim(), source)?);
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            chunks.push(Chunk::Literal(rest.to_string()));
        }
        Ok(Self { chunks })
    }

    pub fn render(&self, ctx: &SearchContext<'_>) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Literal(text) => out.push_str(text),
                Chunk::Metric => out.push_str(ctx.metric),
                Chunk::Pod => out.push_str(ctx.pod),
                Chunk::Namespace => out.push_str(ctx.namespace),
                Chunk::Objects => {
                    out.push_str(&serde_json::to_string(ctx.objects).unwrap_or_else(|_| "[]".into()))
                }
                Chunk::PodSelectors => out.push_str(
                    &serde_json::to_string(&ctx.pod_selectors).unwrap_or_else(|_| "{}".into()),
                ),
                Chunk::PodSelector(key) => {
                    if let Some(value) = ctx.pod_selectors.get(key) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}

fn parse_placeholder(name: &str, source: &str) -> Result<Chunk> {
    Ok(match name {
        "metric" => Chunk::Metric,
        "pod" => Chunk::Pod,
        "namespace" => Chunk::Namespace,
        "objects" => Chunk::Objects,
        "podSelectors" => Chunk::PodSelectors,
        _ => match name.strip_prefix("podSelectors.") {
            Some(key) if !key.is_empty() => Chunk::PodSelector(key.to_string()),
            _ => {
                return Err(HuginError::Configuration(format!(
                    "unknown placeholder {name:?} in template: {source:?}"
                )))
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(objects: &'a [String]) -> SearchContext<'a> {
        SearchContext {
            metric: "cpu",
            pod: "web-0",
            namespace: "default",
            pod_selectors: BTreeMap::from([("app".to_string(), "web".to_string())]),
            objects,
        }
    }

    #[test]
    fn renders_scalar_placeholders() {
        let template =
            BodyTemplate::parse(r#"{"metric":"{{metric}}","pod":"{{pod}}","ns":"{{namespace}}"}"#)
                .unwrap();
        assert_eq!(
            template.render(&ctx(&[])),
            r#"{"metric":"cpu","pod":"web-0","ns":"default"}"#
        );
    }

    #[test]
    fn renders_objects_as_json_array() {
        let objects = vec!["web-0".to_string(), "web-1".to_string()];
        let template = BodyTemplate::parse(r#"{"terms":{"pod":{{objects}}}}"#).unwrap();
        assert_eq!(
            template.render(&ctx(&objects)),
            r#"{"terms":{"pod":["web-0","web-1"]}}"#
        );
    }

    #[test]
    fn renders_selector_map_and_single_key() {
        let template =
            BodyTemplate::parse(r#"{{podSelectors}} app={{podSelectors.app}} missing={{podSelectors.nope}}"#)
                .unwrap();
        assert_eq!(template.render(&ctx(&[])), r#"{"app":"web"} app=web missing="#);
    }

    #[test]
    fn placeholder_whitespace_is_tolerated() {
        let template = BodyTemplate::parse("{{ metric }}").unwrap();
        assert_eq!(template.render(&ctx(&[])), "cpu");
    }

    #[test]
    fn unknown_placeholder_is_rejected_at_compile_time() {
        assert!(matches!(
            BodyTemplate::parse("{{bogus}}"),
            Err(HuginError::Configuration(_))
        ));
        assert!(matches!(
            BodyTemplate::parse("{{metric"),
            Err(HuginError::Configuration(_))
        ));
    }
}
