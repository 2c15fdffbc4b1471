use std::time::Duration;

use apollo_mirror::AppClient;
use apollo_mirror::ChangeType;
use apollo_mirror::ReadOptions;
use apollo_mirror::SyncPhase;
use tempfile::tempdir;
use wiremock::MockServer;

use crate::common::enable_logger;
use crate::common::eventually;
use crate::common::mount_config;
use crate::common::mount_idle_notifications;
use crate::common::mount_notification;
use crate::common::test_config;
use crate::common::APP_ID;
use crate::common::INITIAL;
use crate::common::UPDATED;

#[tokio::test]
async fn test_preloaded_namespace_follows_new_releases() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();

    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_notification(&server, "application", -1, 1, INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let _errors = client.start().await.unwrap();
    let mut changes = client.watch_namespace("application", None);

    assert_eq!(
        client.get("timeout", ReadOptions::default()).await,
        Some("30s".to_string())
    );
    assert_eq!(client.tracked_namespaces(), vec!["application".to_string()]);

    // Release T2 becomes visible on the next poll
    mount_config(&server, "application", &[("timeout", "45s")], "T2", UPDATED).await;
    mount_notification(&server, "application", 1, 2, UPDATED).await;

    let event = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("no change event")
        .expect("stream ended");
    assert_eq!(event.namespace, "application");
    assert!(!event.is_error());
    assert_eq!(event.old_value.get("timeout").map(String::as_str), Some("30s"));
    assert_eq!(event.new_value.get("timeout").map(String::as_str), Some("45s"));

    let diff = event.changes();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].key, "timeout");
    assert_eq!(diff[0].change_type, ChangeType::Modified);

    assert_eq!(client.try_get("timeout", "application"), Some("45s".to_string()));
    assert_ne!(client.phase(), SyncPhase::Stopped);

    // The last fetched release is persisted for the next cold start
    let backup_file = backup_dir.path().join(APP_ID).join("default").join("application.properties");
    eventually(Duration::from_secs(2), || {
        std::fs::read_to_string(&backup_file)
            .map(|content| content.contains("timeout=45s") && content.contains("T2"))
            .unwrap_or(false)
    })
    .await;

    client.stop();
}

#[tokio::test]
async fn test_global_watch_sees_every_namespace() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();

    mount_config(&server, "application", &[("timeout", "30s")], "A1", INITIAL).await;
    mount_config(&server, "TEST.Namespace", &[("retries", "3")], "B1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let mut config = test_config(&server.uri(), backup_dir.path());
    config.preload_namespaces = vec!["application".to_string(), "TEST.Namespace".to_string()];
    let client = AppClient::new(config).unwrap();
    let _errors = client.start().await.unwrap();
    let mut all = client.watch();

    assert_eq!(client.try_get("retries", "TEST.Namespace"), Some("3".to_string()));

    mount_config(&server, "TEST.Namespace", &[("retries", "5")], "B2", UPDATED).await;
    let sent = serde_json::json!([
        {"namespaceName": "TEST.Namespace", "notificationId": -1},
        {"namespaceName": "application", "notificationId": -1},
    ])
    .to_string();
    wiremock::Mock::given(wiremock::matchers::path("/notifications/v2"))
        .and(wiremock::matchers::query_param("notifications", sent.as_str()))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"namespaceName": "TEST.Namespace", "notificationId": 7}
        ])))
        .with_priority(UPDATED)
        .mount(&server)
        .await;

    let event = tokio::time::timeout(Duration::from_secs(5), all.recv())
        .await
        .expect("no change event")
        .expect("stream ended");
    assert_eq!(event.namespace, "TEST.Namespace");
    assert_eq!(event.new_value.get("retries").map(String::as_str), Some("5"));
    assert_eq!(client.try_get("timeout", "application"), Some("30s".to_string()));

    client.stop();
}
