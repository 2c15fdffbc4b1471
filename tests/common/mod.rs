use std::path::Path;
use std::time::Duration;

use apollo_mirror::BackoffPolicy;
use apollo_mirror::ClientConfig;
use serde_json::json;
use serde_json::Value;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

pub const APP_ID: &str = "SampleApp";

/// Priority of mocks describing the service's first state
pub const INITIAL: u8 = 10;
/// Priority of mocks describing a later release; wins over [`INITIAL`]
pub const UPDATED: u8 = 1;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

/// Client settings with short timeouts suitable for tests
pub fn test_config(
    endpoint: &str,
    backup_dir: &Path,
) -> ClientConfig {
    let mut config = ClientConfig::with_identity(endpoint, APP_ID);
    config.backup_dir = backup_dir.to_path_buf();
    config.network.connect_timeout_in_ms = 200;
    config.network.request_timeout_in_ms = 1_000;
    config.network.poll_timeout_in_ms = 2_000;
    config.retry = BackoffPolicy {
        base_delay_ms: 50,
        max_delay_ms: 200,
    };
    config
}

pub fn config_body(
    namespace: &str,
    values: &[(&str, &str)],
    release_key: &str,
) -> Value {
    let configurations: serde_json::Map<String, Value> = values
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect();
    json!({
        "appId": APP_ID,
        "cluster": "default",
        "namespaceName": namespace,
        "configurations": configurations,
        "releaseKey": release_key,
    })
}

/// Serves `values` for `namespace` at `priority`.
pub async fn mount_config(
    server: &MockServer,
    namespace: &str,
    values: &[(&str, &str)],
    release_key: &str,
    priority: u8,
) {
    Mock::given(method("GET"))
        .and(path(format!("/configs/{APP_ID}/default/{namespace}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_body(namespace, values, release_key)))
        .with_priority(priority)
        .mount(server)
        .await;
}

/// Every poll without a newer release is held briefly and answered 304.
pub async fn mount_idle_notifications(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/notifications/v2"))
        .respond_with(ResponseTemplate::new(304).set_delay(Duration::from_millis(100)))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}

/// A poll for `namespace` sent with `sent_id` learns about `new_id`.
pub async fn mount_notification(
    server: &MockServer,
    namespace: &str,
    sent_id: i64,
    new_id: i64,
    priority: u8,
) {
    let sent = json!([{"namespaceName": namespace, "notificationId": sent_id}]).to_string();
    Mock::given(method("GET"))
        .and(path("/notifications/v2"))
        .and(query_param("appId", APP_ID))
        .and(query_param("notifications", sent.as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"namespaceName": namespace, "notificationId": new_id}])),
        )
        .with_priority(priority)
        .mount(server)
        .await;
}

/// Polls `condition` every 20ms until it holds; panics after `timeout`.
pub async fn eventually<F>(
    timeout: Duration,
    mut condition: F,
) where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
