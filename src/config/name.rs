//! Metric alias management.
//!
//! A backend can expose its metrics under rewritten names (e.g. suffixed
//! with the cluster name) so that the same metric coming from two federated
//! backends stays distinguishable. The rewrite is driven by a configured
//! regex plus an expansion template; absent configuration the namer is a
//! pure identity.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{HuginError, Result};

/// Rename rule: `matches` is a regex applied to the backend-local name,
/// `as` the expansion template for the exported name (`$1`, `${name}`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Rename {
    pub matches: String,
    #[serde(rename = "as")]
    pub as_: String,
}

/// Bidirectional alias map between backend-local and exported metric names.
///
/// `register` is deterministic and idempotent; `lookup` only resolves names
/// that went through `register` (except for the identity namer, which
/// resolves everything to itself).
#[derive(Debug, Clone)]
pub enum Namer {
    Identity,
    Rewrite {
        aliases: HashMap<String, String>,
        matches: Regex,
        as_: String,
    },
}

impl Namer {
    pub fn new(rename: Option<&Rename>) -> Result<Namer> {
        match rename {
            None => Ok(Namer::Identity),
            Some(rename) => {
                let matches = Regex::new(&rename.matches).map_err(|e| {
                    HuginError::Configuration(format!(
                        "invalid rename pattern {:?}: {e}",
                        rename.matches
                    ))
                })?;
                Ok(Namer::Rewrite {
                    aliases: HashMap::new(),
                    matches,
                    as_: rename.as_.clone(),
                })
            }
        }
    }

    /// Register a backend-local name; returns the exported name.
    pub fn register(&mut self, source: &str) -> String {
        match self {
            Namer::Identity => source.to_string(),
            Namer::Rewrite { aliases, matches, as_ } => match matches.captures(source) {
                None => {
                    aliases.insert(source.to_string(), source.to_string());
                    source.to_string()
                }
                Some(caps) => {
                    let mut alias = String::new();
                    caps.expand(as_, &mut alias);
                    aliases.insert(alias.clone(), source.to_string());
                    alias
                }
            },
        }
    }

    /// Resolve an exported name back to the backend-local one.
    pub fn lookup(&self, alias: &str) -> Option<String> {
        match self {
            Namer::Identity => Some(alias.to_string()),
            Namer::Rewrite { aliases, .. } => aliases.get(alias).cloned(),
        }
    }
}
