//! Wiremock integration tests for the upstream-compatible backend.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hugin::backends::{MetricBackend, UpstreamBackend};
use hugin::config::Config;
use hugin::types::{CustomMetricInfo, GroupResource, NamespacedName, Selector};
use hugin::HuginError;

fn backend_from_yaml(yaml: &str, host: &str) -> UpstreamBackend {
    let config = Config::from_str(&yaml.replace("HOST", host)).expect("test config should parse");
    UpstreamBackend::new(config.metric_servers[0].clone()).expect("backend should build")
}

const UPSTREAM_CONFIG: &str = r#"
metricServers:
  - name: upstream
    serverType: custom
    clientConfig:
      host: HOST
"#;

fn pods_info(metric: &str) -> CustomMetricInfo {
    CustomMetricInfo {
        group_resource: GroupResource::new("", "pods"),
        namespaced: true,
        metric: metric.to_string(),
    }
}

fn metric_value_list() -> serde_json::Value {
    json!({
        "kind": "MetricValueList",
        "apiVersion": "custom.metrics.k8s.io/v1beta2",
        "items": [
            {
                "describedObject": {
                    "kind": "Pod",
                    "namespace": "default",
                    "name": "web-0",
                    "apiVersion": "v1"
                },
                "metric": { "name": "http_requests" },
                "timestamp": "2024-01-02T03:04:05Z",
                "windowSeconds": 60,
                "value": "250m"
            }
        ]
    })
}

#[tokio::test]
async fn discovery_lists_and_splits_resource_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "APIResourceList",
            "groupVersion": "custom.metrics.k8s.io/v1beta2",
            "resources": [
                { "name": "pods/http_requests", "namespaced": true },
                { "name": "deployments.apps/queue_depth", "namespaced": true },
                { "name": "nodes/disk_pressure", "namespaced": false },
                { "name": "malformed-without-slash", "namespaced": true }
            ]
        })))
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    let metrics = backend.list_custom_metrics().await.unwrap();

    assert_eq!(metrics.len(), 3);
    assert!(metrics.contains(&pods_info("http_requests")));
    assert!(metrics.contains(&CustomMetricInfo {
        group_resource: GroupResource::new("apps", "deployments"),
        namespaced: true,
        metric: "queue_depth".to_string(),
    }));
    assert!(metrics.contains(&CustomMetricInfo {
        group_resource: GroupResource::new("", "nodes"),
        namespaced: false,
        metric: "disk_pressure".to_string(),
    }));
}

#[tokio::test]
async fn get_by_name_forwards_and_translates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [ { "name": "pods/http_requests", "namespaced": true } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/custom.metrics.k8s.io/v1beta2/namespaces/default/pods/web-0/http_requests",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(metric_value_list()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    backend.list_custom_metrics().await.unwrap();

    let value = backend
        .get_metric_by_name(
            &NamespacedName::new("default", "web-0"),
            &pods_info("http_requests"),
            &Selector::everything(),
        )
        .await
        .unwrap();

    assert_eq!(value.metric.name, "http_requests");
    assert_eq!(value.value.to_string(), "250m");
    assert_eq!(value.window_seconds, Some(60));
    assert_eq!(value.described_object.kind, "Pod");
}

#[tokio::test]
async fn get_by_selector_passes_both_selectors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [ { "name": "pods/http_requests", "namespaced": true } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/custom.metrics.k8s.io/v1beta2/namespaces/default/pods/*/http_requests",
        ))
        .and(query_param("labelSelector", "app=web"))
        .and(query_param("metricLabelSelector", "verb=GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metric_value_list()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    backend.list_custom_metrics().await.unwrap();

    let list = backend
        .get_metric_by_selector(
            "default",
            &Selector::parse("app=web"),
            &pods_info("http_requests"),
            &Selector::parse("verb=GET"),
        )
        .await
        .unwrap();
    assert_eq!(list.items.len(), 1);
}

#[tokio::test]
async fn upstream_not_found_propagates_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [ { "name": "pods/http_requests", "namespaced": true } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/custom.metrics.k8s.io/v1beta2/namespaces/default/pods/gone/http_requests",
        ))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "kind": "Status",
            "status": "Failure",
            "reason": "NotFound",
            "message": "the server could not find the metric http_requests for pods gone",
            "code": 404
        })))
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    backend.list_custom_metrics().await.unwrap();

    let err = backend
        .get_metric_by_name(
            &NamespacedName::new("default", "gone"),
            &pods_info("http_requests"),
            &Selector::everything(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HuginError::MetricNotFound(_)));
}

#[tokio::test]
async fn transport_errors_become_upstream_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "kind": "Status",
            "status": "Failure",
            "reason": "InternalError",
            "message": "etcd is on fire",
            "code": 500
        })))
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    let err = backend.list_custom_metrics().await.unwrap_err();
    match err {
        HuginError::Upstream { status, kind, reason } => {
            assert_eq!(status, 500);
            assert_eq!(kind, "InternalError");
            assert_eq!(reason, "etcd is on fire");
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn rename_applies_to_discovered_custom_metrics() {
    const RENAMED_CONFIG: &str = r#"
metricServers:
  - name: upstream
    serverType: custom
    clientConfig:
      host: HOST
    rename:
      matches: "^(.*)$"
      as: "${1}@remote"
"#;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/custom.metrics.k8s.io/v1beta2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [ { "name": "pods/http_requests", "namespaced": true } ]
        })))
        .mount(&server)
        .await;
    // Fetch must resolve the alias back to the upstream-local name.
    Mock::given(method("GET"))
        .and(path(
            "/apis/custom.metrics.k8s.io/v1beta2/namespaces/default/pods/web-0/http_requests",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(metric_value_list()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_from_yaml(RENAMED_CONFIG, &server.uri());
    let metrics = backend.list_custom_metrics().await.unwrap();
    assert!(metrics.contains(&pods_info("http_requests@remote")));

    backend
        .get_metric_by_name(
            &NamespacedName::new("default", "web-0"),
            &pods_info("http_requests@remote"),
            &Selector::everything(),
        )
        .await
        .unwrap();

    // Unregistered exported names are a stale-catalog signal.
    let err = backend
        .get_metric_by_name(
            &NamespacedName::new("default", "web-0"),
            &pods_info("never-registered"),
            &Selector::everything(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HuginError::AliasNotFound(_)));
}

#[tokio::test]
async fn external_metrics_are_discovered_and_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/external.metrics.k8s.io/v1beta1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                { "name": "queue_messages_ready", "namespaced": true }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/external.metrics.k8s.io/v1beta1/namespaces/default/queue_messages_ready",
        ))
        .and(query_param("labelSelector", "queue=worker_tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "metricName": "queue_messages_ready",
                    "metricLabels": { "queue": "worker_tasks" },
                    "timestamp": "2024-01-02T03:04:05Z",
                    "value": "3"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_from_yaml(UPSTREAM_CONFIG, &server.uri());
    let metrics = backend.list_external_metrics().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert!(metrics.iter().any(|m| m.metric == "queue_messages_ready"));

    let list = backend
        .get_external_metric(
            "default",
            "queue_messages_ready",
            &Selector::parse("queue=worker_tasks"),
        )
        .await
        .unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].value.to_string(), "3");
    assert_eq!(
        list.items[0].metric_labels.get("queue").map(String::as_str),
        Some("worker_tasks")
    );
}
