use apollo_mirror::AppClient;
use apollo_mirror::ReadOptions;
use tempfile::tempdir;
use wiremock::MockServer;

use crate::common::enable_logger;
use crate::common::mount_config;
use crate::common::mount_idle_notifications;
use crate::common::test_config;
use crate::common::INITIAL;

#[tokio::test]
async fn test_unknown_namespace_returns_default() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();

    // Only `application` exists; anything else answers 404
    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let _errors = client.start().await.unwrap();

    let value = client
        .get("bar", ReadOptions::namespace("TEST.Namespace1").with_default("foo"))
        .await;
    assert_eq!(value, Some("foo".to_string()));

    // A namespace missing on the service is tracked with empty content
    assert!(client
        .tracked_namespaces()
        .contains(&"TEST.Namespace1".to_string()));

    client.stop();
}

#[tokio::test]
async fn test_namespace_is_fetched_on_first_read() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();

    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_config(&server, "TEST.Namespace2", &[("bar", "baz")], "N1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let _errors = client.start().await.unwrap();
    assert_eq!(client.try_get("bar", "TEST.Namespace2"), None);

    let value = client
        .get("bar", ReadOptions::namespace("TEST.Namespace2").with_default("foo"))
        .await;
    assert_eq!(value, Some("baz".to_string()));
    assert_eq!(client.try_get("bar", "TEST.Namespace2"), Some("baz".to_string()));

    let content = client.get_namespace("TEST.Namespace2").await;
    assert_eq!(content.len(), 1);

    client.stop();
}

#[tokio::test]
async fn test_cache_miss_fetch_can_be_disabled() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();

    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_config(&server, "TEST.Namespace2", &[("bar", "baz")], "N1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let mut config = test_config(&server.uri(), backup_dir.path());
    config.fetch_on_cache_miss = false;
    let client = AppClient::new(config).unwrap();
    let _errors = client.start().await.unwrap();

    let value = client
        .get("bar", ReadOptions::namespace("TEST.Namespace2").with_default("foo"))
        .await;
    assert_eq!(value, Some("foo".to_string()));
    assert_eq!(client.tracked_namespaces(), vec!["application".to_string()]);

    client.stop();
}
