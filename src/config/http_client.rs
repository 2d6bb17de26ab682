//! Per-backend HTTP client configuration.
//!
//! The `clientConfig` section of a metric server entry: host, request
//! timeout, authentication and TLS settings. `host`, `username` and
//! `password` support `${NAME}` environment interpolation so credentials
//! can be injected without templating the configuration file.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use tracing::warn;

use crate::error::{HuginError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpClientConfig {
    pub host: String,
    /// Request timeout, e.g. `30s`, `500ms`, `1m`. Default: 30s.
    #[serde(default, deserialize_with = "deserialize_opt_duration")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub authentication: Option<AuthenticationConfig>,
    #[serde(default)]
    pub tls: Option<TlsClientConfig>,
}

#[derive(Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationConfig {
    /// Basic authentication
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a file holding the bearer token, e.g. a mounted
    /// service-account token. Read once per request chain setup.
    #[serde(default)]
    pub token_file: Option<PathBuf>,
}

// Credentials must never reach log output.
impl fmt::Debug for AuthenticationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthenticationConfig(--- REDACTED ---)")
    }
}

/// TLS settings for a backend connection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsClientConfig {
    // insecureSkipTLSVerify to match the platform's APIService field
    #[serde(default, rename = "insecureSkipTLSVerify")]
    pub insecure: bool,
    /// Path to a PEM bundle of trusted root certificates.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl HttpClientConfig {
    /// The backend base URL with environment interpolation applied and any
    /// trailing slash removed.
    pub fn expanded_host(&self) -> String {
        expand_env(&self.host).trim_end_matches('/').to_string()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Build the shared `reqwest` client for this backend.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout());

        if let Some(tls) = &self.tls {
            if tls.insecure {
                builder = builder.danger_accept_invalid_certs(true);
            }
            if let Some(ca_file) = &tls.ca_file {
                let pem = fs::read(ca_file).map_err(|e| {
                    HuginError::Configuration(format!("failed to read CA file {ca_file:?}: {e}"))
                })?;
                let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    HuginError::Configuration(format!("invalid CA certificate {ca_file:?}: {e}"))
                })?;
                builder = builder.add_root_certificate(cert);
            }
        }

        builder
            .build()
            .map_err(|e| HuginError::Configuration(format!("failed to build HTTP client: {e}")))
    }

    /// Attach configured credentials to a request.
    pub fn authenticate(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let Some(auth) = &self.authentication else {
            return request;
        };
        if let Some(token) = &auth.token {
            return request.bearer_auth(expand_env(token));
        }
        if let Some(token_file) = &auth.token_file {
            match fs::read_to_string(token_file) {
                Ok(token) => return request.bearer_auth(token.trim()),
                Err(e) => {
                    warn!(path = %token_file.display(), error = %e, "failed to read bearer token file");
                    return request;
                }
            }
        }
        if let Some(username) = &auth.username {
            let password = auth.password.as_deref().map(expand_env);
            return request.basic_auth(expand_env(username), password);
        }
        request
    }
}

/// Expand `${NAME}` references from the process environment. Unset
/// variables expand to the empty string.
pub fn expand_env(input: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());
    pattern
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn deserialize_opt_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_duration(&raw).map(Some).map_err(serde::de::Error::custom)
}

/// Parse `10s` / `500ms` / `2m` duration notation (bare numbers are seconds).
fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration: {raw:?}"))?;
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("invalid duration unit in {raw:?}")),
    }
}
