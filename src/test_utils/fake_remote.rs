use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::FetchOutcome;
use crate::KeyValues;
use crate::NetworkError;
use crate::Notification;
use crate::PollOutcome;
use crate::RemoteFetcher;
use crate::RemoteNamespace;

#[derive(Debug, Clone)]
struct Release {
    values: KeyValues,
    release_key: String,
    notification_id: i64,
}

/// Scriptable in-memory config service
///
/// Polls wait (in 5ms steps) until a published release moves a notification
/// id past the one sent, or the poll timeout elapses.
#[derive(Debug, Default)]
pub struct FakeRemote {
    releases: Mutex<HashMap<String, Release>>,
    failure: Mutex<Option<NetworkError>>,
    fetch_failures: Mutex<HashMap<String, NetworkError>>,
    polls: AtomicUsize,
    fetches: Mutex<Vec<(String, Option<String>)>>,
    next_notification_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            next_notification_id: AtomicUsize::new(100),
            ..Default::default()
        }
    }

    /// Makes `values` the current content of `namespace` under `release_key`.
    pub fn publish(
        &self,
        namespace: &str,
        values: KeyValues,
        release_key: &str,
    ) {
        let notification_id = self.next_notification_id.fetch_add(1, Ordering::SeqCst) as i64;
        self.releases.lock().insert(
            namespace.to_string(),
            Release {
                values,
                release_key: release_key.to_string(),
                notification_id,
            },
        );
    }

    /// Every call fails with `error` until cleared with `None`.
    pub fn fail_with(
        &self,
        error: Option<NetworkError>,
    ) {
        *self.failure.lock() = error;
    }

    /// Fetches of `namespace` fail with `error`; polls still succeed.
    pub fn fail_fetch(
        &self,
        namespace: &str,
        error: NetworkError,
    ) {
        self.fetch_failures.lock().insert(namespace.to_string(), error);
    }

    pub fn clear_fetch_failure(
        &self,
        namespace: &str,
    ) {
        self.fetch_failures.lock().remove(namespace);
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(
        &self,
        namespace: &str,
    ) -> usize {
        self.fetches.lock().iter().filter(|(ns, _)| ns == namespace).count()
    }

    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.fetches.lock().clone()
    }

    fn changed_since(
        &self,
        notifications: &[Notification],
    ) -> Vec<Notification> {
        let releases = self.releases.lock();
        notifications
            .iter()
            .filter_map(|n| {
                releases
                    .get(&n.namespace_name)
                    .filter(|release| release.notification_id > n.notification_id)
                    .map(|release| Notification::new(n.namespace_name.clone(), release.notification_id))
            })
            .collect()
    }
}

#[async_trait]
impl RemoteFetcher for FakeRemote {
    async fn poll_for_changes(
        &self,
        notifications: Vec<Notification>,
        timeout: Duration,
    ) -> Result<PollOutcome, NetworkError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(error) = self.failure.lock().clone() {
                return Err(error);
            }
            let changed = self.changed_since(&notifications);
            if !changed.is_empty() {
                return Ok(PollOutcome::Changed(changed));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(PollOutcome::Unchanged);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn fetch_namespace(
        &self,
        namespace: &str,
        release_key: Option<String>,
    ) -> Result<FetchOutcome, NetworkError> {
        self.fetches.lock().push((namespace.to_string(), release_key.clone()));
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        if let Some(error) = self.fetch_failures.lock().get(namespace).cloned() {
            return Err(error);
        }
        let release = self
            .releases
            .lock()
            .get(namespace)
            .cloned()
            .ok_or_else(|| NetworkError::NamespaceNotFound(namespace.to_string()))?;
        if release_key.as_deref() == Some(release.release_key.as_str()) {
            return Ok(FetchOutcome::NotModified);
        }
        Ok(FetchOutcome::Fetched(RemoteNamespace {
            values: release.values,
            release_key: Some(release.release_key),
        }))
    }
}
