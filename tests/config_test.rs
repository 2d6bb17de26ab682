//! Configuration integration tests: the full two-server document from a
//! realistic deployment, plus environment interpolation at the client
//! boundary.

use std::time::Duration;

use hugin::config::{Config, MetricType, ServerType};

const FULL_CONFIG: &str = r#"
readinessProbe:
  failureThreshold: 3
metricServers:
  - name: my-existing-metrics-adapter
    serverType: custom
    clientConfig:
      host: https://custom-metrics-apiserver.custom-metrics.svc
      authentication:
        tokenFile: /run/secrets/kubernetes.io/serviceaccount/token
      tls:
        insecureSkipTLSVerify: false
        caFile: /run/secrets/kubernetes.io/serviceaccount/ca.crt
  - name: elasticsearch-metrics-cluster
    serverType: elasticsearch
    metricTypes: [ custom ]
    priority: 9
    clientConfig:
      host: https://elasticsearch-es-http.default.svc:9200
      timeout: 10s
      authentication:
        username: elastic
        password: ${ELASTICSEARCH_PASSWORD}
      tls:
        insecureSkipTLSVerify: false
        caFile: /mnt/elastic-internal/es-certs/ca.crt
    rename:
      matches: "^(.*)$"
      as: "${1}@elasticsearch-metrics-cluster"
    metricSets:
      - indices: [ "metrics-*" ]
      - indices: [ "metricbeat-*" ]
        fields:
          - patterns: [ '^kibana\.stats\.' ]
          - name: kibana.stats.load.pod
            search:
              metricPath: ".aggregations.custom_name.buckets.[0].pod_load.value"
              timestampPath: ".aggregations.custom_name.buckets.[0].timestamp.value_as_string"
              body: '{ "query": { "match": { "kubernetes.pod.name": "{{pod}}" } } }'
"#;

#[test]
fn full_deployment_config_parses_and_validates() {
    let config = Config::from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.readiness_probe.failure_threshold, 3);
    assert_eq!(config.metric_servers.len(), 2);

    let upstream = &config.metric_servers[0];
    assert_eq!(upstream.name, "my-existing-metrics-adapter");
    assert_eq!(upstream.server_type, ServerType::Custom);
    assert_eq!(upstream.priority, 0);
    assert!(upstream.metric_types.has_type(MetricType::Custom));
    assert!(upstream.metric_types.has_type(MetricType::External));
    let client = upstream.client_config().unwrap();
    assert_eq!(client.host, "https://custom-metrics-apiserver.custom-metrics.svc");
    assert!(client
        .authentication
        .as_ref()
        .unwrap()
        .token_file
        .is_some());

    let es = &config.metric_servers[1];
    assert_eq!(es.server_type, ServerType::Elasticsearch);
    // Priority comes from list position, whatever the document says.
    assert_eq!(es.priority, 1);
    assert_eq!(
        es.metric_types.supported(),
        vec![MetricType::Custom]
    );
    let client = es.client_config().unwrap();
    assert_eq!(client.timeout(), Duration::from_secs(10));
    assert!(!client.tls.as_ref().unwrap().insecure);

    let rename = es.rename.as_ref().unwrap();
    assert_eq!(rename.matches, "^(.*)$");
    assert_eq!(rename.as_, "${1}@elasticsearch-metrics-cluster");

    // First metric set falls back to match-everything fields.
    assert_eq!(es.metric_sets[0].fields.0.len(), 1);
    assert_eq!(es.metric_sets[0].fields.0[0].patterns, vec!["^.*$"]);

    // Second metric set: one dynamic pattern plus one static field.
    let fields = &es.metric_sets[1].fields;
    assert!(fields.find_metadata("kibana.stats.load").is_some());
    assert!(fields.find_metadata("system.cpu.user").is_none());
    let static_field = &fields.0[1];
    assert_eq!(static_field.name.as_deref(), Some("kibana.stats.load.pod"));
}

#[test]
fn host_and_credentials_interpolate_from_the_environment() {
    std::env::set_var("HUGIN_CONFIG_TEST_HOST", "es.internal");
    let config = Config::from_str(
        r#"
        metricServers:
          - name: es
            serverType: elasticsearch
            clientConfig:
              host: https://${HUGIN_CONFIG_TEST_HOST}:9200/
            metricSets:
              - indices: [ "metrics-*" ]
        "#,
    )
    .unwrap();

    let client = config.metric_servers[0].client_config().unwrap();
    assert_eq!(client.expanded_host(), "https://es.internal:9200");
    // The raw document keeps the reference.
    assert!(client.host.contains("${HUGIN_CONFIG_TEST_HOST}"));
}

#[test]
fn metric_type_restrictions_are_strict() {
    let err = Config::from_str(
        r#"
        metricServers:
          - name: x
            serverType: custom
            metricTypes: [ custom, widgets ]
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("widgets") || err.to_string().contains("unknown variant"));
}
