//! Health server tests: readiness progression and counter bookkeeping.

mod common;

use common::{custom_set, external_set, FakeBackend};
use hugin::backends::SharedBackend;
use hugin::config::{Config, MetricType};
use hugin::monitoring::HealthServer;
use hugin::scheduler::{ErrorListener, MetricListener};
use hugin::HuginError;

fn three_server_config() -> Config {
    Config::from_str(
        r#"
        metricServers:
          - name: metric_server1
            serverType: custom
          - name: metric_server2
            serverType: custom
            metricTypes: [ custom ]
          - name: metric_server3
            serverType: custom
            metricTypes: [ external ]
        "#,
    )
    .unwrap()
}

fn backend(name: &str) -> SharedBackend {
    FakeBackend::new(name, 0).shared()
}

fn fail(server: &HealthServer, name: &str, metric_type: MetricType) {
    server.on_error(
        &backend(name),
        metric_type,
        &HuginError::Http("boom".into()),
    );
}

#[test]
fn readiness_progression() {
    let server = HealthServer::new(&three_server_config());

    // Nothing has synced yet.
    assert!(!server.ready());

    // server1 syncs both types; others still pending.
    server.update_custom_metrics(&backend("metric_server1"), &custom_set(&[]));
    server.update_external_metrics(&backend("metric_server1"), &external_set(&[]));
    assert!(!server.ready());

    // server2 syncs its only type; still waiting for server3.
    server.update_custom_metrics(&backend("metric_server2"), &custom_set(&[]));
    assert!(!server.ready());

    // server3 syncs: everyone has seen a first success.
    server.update_external_metrics(&backend("metric_server3"), &external_set(&[]));
    assert!(server.ready());

    // Two consecutive failures stay below the default threshold of 3.
    fail(&server, "metric_server2", MetricType::Custom);
    fail(&server, "metric_server2", MetricType::Custom);
    assert!(server.ready());

    // Third consecutive failure crosses it.
    fail(&server, "metric_server2", MetricType::Custom);
    assert!(!server.ready());

    // A successful update resets the failure streak.
    server.update_custom_metrics(&backend("metric_server2"), &custom_set(&[]));
    assert!(server.ready());
}

#[test]
fn failures_are_tracked_per_metric_type() {
    let config = Config::from_str(
        r#"
        metricServers:
          - name: both
            serverType: custom
        "#,
    )
    .unwrap();
    let server = HealthServer::new(&config);

    server.update_custom_metrics(&backend("both"), &custom_set(&[]));
    server.update_external_metrics(&backend("both"), &external_set(&[]));
    assert!(server.ready());

    // External failures do not reset or mask the custom counters.
    fail(&server, "both", MetricType::External);
    fail(&server, "both", MetricType::External);
    fail(&server, "both", MetricType::External);
    assert!(!server.ready());

    // Recovering custom does not clear the external streak.
    server.update_custom_metrics(&backend("both"), &custom_set(&[]));
    assert!(!server.ready());

    server.update_external_metrics(&backend("both"), &external_set(&[]));
    assert!(server.ready());
}

#[test]
fn custom_failure_threshold_is_honored() {
    let config = Config::from_str(
        r#"
        readinessProbe:
          failureThreshold: 1
        metricServers:
          - name: fragile
            serverType: custom
            metricTypes: [ custom ]
        "#,
    )
    .unwrap();
    let server = HealthServer::new(&config);

    server.update_custom_metrics(&backend("fragile"), &custom_set(&[]));
    assert!(server.ready());

    fail(&server, "fragile", MetricType::Custom);
    assert!(!server.ready());
}

#[test]
fn empty_configuration_is_never_ready() {
    let server = HealthServer::new(&Config::from_str("metricServers: []").unwrap());
    assert!(!server.ready());
}

#[test]
fn readiness_body_lists_counters_per_type_and_backend() {
    let server = HealthServer::new(&three_server_config());
    server.update_custom_metrics(&backend("metric_server1"), &custom_set(&[]));
    fail(&server, "metric_server2", MetricType::Custom);

    let (_, body) = server.check();
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["successTotal"]["custom"]["metric_server1"], 1);
    assert_eq!(json["successTotal"]["custom"]["metric_server2"], 0);
    assert_eq!(json["consecutiveFailures"]["custom"]["metric_server2"], 1);
    // server3 serves external only: it must not appear under custom.
    assert!(json["successTotal"]["custom"]
        .get("metric_server3")
        .is_none());
    assert_eq!(json["successTotal"]["external"]["metric_server3"], 0);
}
