use std::sync::Arc;

use apollo_mirror::ClientRegistry;
use tempfile::tempdir;
use wiremock::MockServer;

use crate::common::enable_logger;
use crate::common::mount_config;
use crate::common::mount_idle_notifications;
use crate::common::test_config;
use crate::common::APP_ID;
use crate::common::INITIAL;

#[tokio::test]
async fn test_same_identity_shares_one_client() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();
    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let registry = ClientRegistry::new();
    let first = registry
        .get_or_create(test_config(&server.uri(), backup_dir.path()))
        .unwrap();
    let _errors = first.start().await.unwrap();

    // A trailing slash and another cluster still name the same client
    let mut config = test_config(&format!("{}/", server.uri()), backup_dir.path());
    config.cluster = "other".to_string();
    let second = registry.get_or_create(config).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.len(), 1);
    assert_eq!(second.try_get("timeout", "application"), Some("30s".to_string()));

    let mut other_app = test_config(&server.uri(), backup_dir.path());
    other_app.app_id = "OtherApp".to_string();
    let third = registry.get_or_create(other_app).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(registry.len(), 2);

    let removed = registry.remove(&server.uri(), APP_ID).unwrap();
    assert!(removed.is_stopped());
    assert!(registry.get(&server.uri(), APP_ID).is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_builds_once() {
    enable_logger();
    let backup_dir = tempdir().unwrap();
    let registry = Arc::new(ClientRegistry::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let config = test_config("http://127.0.0.1:1", backup_dir.path());
            tokio::spawn(async move { registry.get_or_create(config).unwrap() })
        })
        .collect();

    let mut clients = Vec::new();
    for handle in handles {
        clients.push(handle.await.unwrap());
    }

    assert_eq!(registry.len(), 1);
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
}

#[tokio::test]
async fn test_stopped_client_is_replaced() {
    enable_logger();
    let backup_dir = tempdir().unwrap();
    let registry = ClientRegistry::new();

    let first = registry
        .get_or_create(test_config("http://127.0.0.1:1", backup_dir.path()))
        .unwrap();
    first.stop();

    let second = registry
        .get_or_create(test_config("http://127.0.0.1:1", backup_dir.path()))
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!second.is_stopped());
    assert_eq!(registry.len(), 1);
}
