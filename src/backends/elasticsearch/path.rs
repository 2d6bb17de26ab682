//! Compiled result-path expressions.
//!
//! A path selects a single value out of a decoded search response:
//! dotted keys with optional list indexing, e.g.
//! `.aggregations.custom_name.buckets.[0].pod_load.value`. Paths are
//! compiled once and evaluated per response.

use serde_json::Value;

use crate::error::{HuginError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    segments: Vec<Segment>,
    source: String,
}

impl PathExpr {
    /// Compile a dotted path expression. Accepts both `.buckets.[0].value`
    /// and `.buckets[0].value` indexing forms.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(HuginError::Configuration(format!(
                "empty path expression: {expr:?}"
            )));
        }
        let mut segments = Vec::new();
        for token in trimmed.split('.') {
            if token.is_empty() {
                return Err(HuginError::Configuration(format!(
                    "empty segment in path expression: {expr:?}"
                )));
            }
            parse_token(token, expr, &mut segments)?;
        }
        Ok(Self {
            segments,
            source: expr.to_string(),
        })
    }

    /// Build a path directly from key segments (no index steps).
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<Segment> = keys.into_iter().map(|k| Segment::Key(k.into())).collect();
        let source = segments
            .iter()
            .map(|s| match s {
                Segment::Key(k) => k.clone(),
                Segment::Index(i) => format!("[{i}]"),
            })
            .collect::<Vec<_>>()
            .join(".");
        Self { segments, source }
    }

    /// Append further key segments, e.g. a metric's dotted field name.
    pub fn join_keys<I, S>(&self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut joined = self.clone();
        joined
            .segments
            .extend(keys.into_iter().map(|k| Segment::Key(k.into())));
        joined
    }

    /// Navigate the response to the selected value.
    ///
    /// Absent keys and out-of-range indices mean the document simply is not
    /// there (`MetricNotFound`); a shape that cannot be navigated at all is
    /// a `MalformedResponse`.
    pub fn eval<'a>(&self, mut value: &'a Value) -> Result<&'a Value> {
        for segment in &self.segments {
            match segment {
                Segment::Key(key) => match value {
                    Value::Object(map) => {
                        value = map.get(key).ok_or_else(|| {
                            HuginError::MetricNotFound(format!(
                                "no value at {:?}: missing key {key:?}",
                                self.source
                            ))
                        })?;
                    }
                    other => {
                        return Err(HuginError::MalformedResponse(format!(
                            "expected an object at {key:?} in {:?}, got {}",
                            self.source,
                            type_name(other)
                        )))
                    }
                },
                Segment::Index(idx) => match value {
                    Value::Array(items) => {
                        value = items.get(*idx).ok_or_else(|| {
                            HuginError::MetricNotFound(format!(
                                "no value at {:?}: index {idx} out of range ({} items)",
                                self.source,
                                items.len()
                            ))
                        })?;
                    }
                    other => {
                        return Err(HuginError::MalformedResponse(format!(
                            "expected an array at [{idx}] in {:?}, got {}",
                            self.source,
                            type_name(other)
                        )))
                    }
                },
            }
        }
        Ok(value)
    }
}

fn parse_token(token: &str, expr: &str, segments: &mut Vec<Segment>) -> Result<()> {
    let invalid =
        || HuginError::Configuration(format!("invalid segment {token:?} in path expression {expr:?}"));

    let (key, mut rest) = match token.find('[') {
        Some(0) => ("", token),
        Some(idx) => token.split_at(idx),
        None => (token, ""),
    };
    if !key.is_empty() {
        segments.push(Segment::Key(key.to_string()));
    }
    while !rest.is_empty() {
        let end = rest.find(']').ok_or_else(invalid)?;
        let digits = &rest[1..end];
        let index: usize = digits.parse().map_err(|_| invalid())?;
        segments.push(Segment::Index(index));
        rest = &rest[end + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(invalid());
        }
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
