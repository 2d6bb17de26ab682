//! Telemetry metric name constants.
//!
//! Centralised metric names for the monitoring surface. The daemon installs
//! a prometheus recorder; without one installed all metric calls are no-ops.
//!
//! # Common labels
//!
//! - `client`: backend name from configuration
//! - `type`: metric type: "custom" or "external"

/// Total discovery errors raised by a backend.
///
/// Labels: `client`, `type`.
pub const CLIENT_ERRORS_TOTAL: &str = "client_errors_total";

/// Total successful discovery calls to a backend.
///
/// Labels: `client`, `type`.
pub const CLIENT_SUCCESS_TOTAL: &str = "client_success_total";

/// Number of metrics currently served per backend.
///
/// Labels: `client`, `type`.
pub const METRICS_COUNT: &str = "metrics_count";

/// Whether request tracing is enabled for this process.
pub fn tracing_enabled() -> bool {
    std::env::var_os("ELASTIC_APM_SERVER_URL").is_some()
}
