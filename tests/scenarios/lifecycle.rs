use std::time::Duration;

use apollo_mirror::AppClient;
use apollo_mirror::ClientError;
use apollo_mirror::Error;
use apollo_mirror::ReadOptions;
use apollo_mirror::SyncPhase;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

use crate::common::enable_logger;
use crate::common::mount_config;
use crate::common::mount_idle_notifications;
use crate::common::test_config;
use crate::common::INITIAL;

#[tokio::test]
async fn test_stop_ends_every_stream_and_keeps_content() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();
    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let mut errors = client.start().await.unwrap();
    let mut all = client.watch();
    let mut one = client.watch_namespace("application", None);

    client.stop();
    client.stop();

    let timeout = Duration::from_secs(2);
    assert!(tokio::time::timeout(timeout, all.recv()).await.unwrap().is_none());
    assert!(tokio::time::timeout(timeout, one.recv()).await.unwrap().is_none());
    assert!(tokio::time::timeout(timeout, errors.recv()).await.unwrap().is_none());

    assert!(client.is_stopped());
    assert_eq!(client.phase(), SyncPhase::Stopped);
    assert_eq!(
        client.get("timeout", ReadOptions::default()).await,
        Some("30s".to_string())
    );

    let restart = client.start().await;
    assert!(matches!(restart, Err(Error::Client(ClientError::Stopped { .. }))));
}

#[tokio::test]
async fn test_cancelled_watch_ends_without_affecting_others() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();
    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let _errors = client.start().await.unwrap();

    let token = CancellationToken::new();
    let mut cancelled = client.watch_namespace("application", Some(token.clone()));
    let mut kept = client.watch_namespace("application", None);

    token.cancel();
    assert!(tokio::time::timeout(Duration::from_secs(2), cancelled.recv())
        .await
        .unwrap()
        .is_none());

    // Still open: nothing has been published yet
    assert!(tokio::time::timeout(Duration::from_millis(200), kept.recv())
        .await
        .is_err());

    client.stop();
}

#[tokio::test]
async fn test_start_twice_loads_once() {
    enable_logger();
    let server = MockServer::start().await;
    let backup_dir = tempdir().unwrap();
    mount_config(&server, "application", &[("timeout", "30s")], "T1", INITIAL).await;
    mount_idle_notifications(&server).await;

    let client = AppClient::new(test_config(&server.uri(), backup_dir.path())).unwrap();
    let _first = client.start().await.unwrap();
    let _second = client.start().await.unwrap();

    let fetches = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/configs/"))
        .count();
    assert_eq!(fetches, 1);

    client.stop();
}
