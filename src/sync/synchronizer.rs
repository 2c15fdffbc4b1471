use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::Backoff;
use super::ErrorStream;
use super::SyncPhase;
use crate::async_task::sleep_or_cancelled;
use crate::constants::INITIAL_NOTIFICATION_ID;
use crate::watch::ChangeEvent;
use crate::watch::WatchHub;
use crate::BackupError;
use crate::BackupSnapshot;
use crate::BackupStore;
use crate::ClientConfig;
use crate::Error;
use crate::FetchOutcome;
use crate::KeyValues;
use crate::NamespaceStore;
use crate::NetworkError;
use crate::Notification;
use crate::PollOutcome;
use crate::RemoteFetcher;
use crate::RemoteNamespace;
use crate::Result;
use crate::SnapshotSource;

/// How an initial load of a namespace ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Content came from the remote service (possibly empty for an unknown namespace)
    Remote,
    /// The service failed and the last-known-good snapshot was installed
    Backup,
    /// Nothing could be installed
    Failed,
}

/// Keeps the namespace stores of one client in step with the remote service
///
/// One instance per client. [`LongPollSynchronizer::run`] is the only task
/// that polls; initial and on-demand loads run on the caller's task.
pub struct LongPollSynchronizer {
    config: Arc<ClientConfig>,
    fetcher: Arc<dyn RemoteFetcher>,
    backup: Arc<dyn BackupStore>,
    hub: WatchHub,

    stores: DashMap<String, Arc<NamespaceStore>>,
    /// Namespaces being polled, with the last notification id seen
    notifications: DashMap<String, i64>,
    registered: Notify,

    errors: Mutex<Option<broadcast::Sender<Arc<Error>>>>,
    phase: RwLock<SyncPhase>,
    shutdown: CancellationToken,
    /// Serializes on-demand loads
    load_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for LongPollSynchronizer {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LongPollSynchronizer")
            .field("app_id", &self.config.app_id)
            .field("cluster", &self.config.cluster)
            .field("phase", &*self.phase.read())
            .field("namespaces", &self.stores.len())
            .finish_non_exhaustive()
    }
}

impl LongPollSynchronizer {
    pub fn new(
        config: Arc<ClientConfig>,
        fetcher: Arc<dyn RemoteFetcher>,
        backup: Arc<dyn BackupStore>,
        hub: WatchHub,
    ) -> Self {
        let (errors, _) = broadcast::channel(config.watch.error_buffer_size.max(1));
        Self {
            config,
            fetcher,
            backup,
            hub,
            stores: DashMap::new(),
            notifications: DashMap::new(),
            registered: Notify::new(),
            errors: Mutex::new(Some(errors)),
            phase: RwLock::new(SyncPhase::Idle),
            shutdown: CancellationToken::new(),
            load_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    fn set_phase(
        &self,
        phase: SyncPhase,
    ) {
        let mut current = self.phase.write();
        // Stopped is terminal
        if *current != SyncPhase::Stopped && *current != phase {
            trace!(app_id = %self.config.app_id, from = ?*current, to = ?phase, "sync phase changed");
            *current = phase;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn store(
        &self,
        namespace: &str,
    ) -> Option<Arc<NamespaceStore>> {
        self.stores.get(namespace).map(|s| s.value().clone())
    }

    /// Names of the namespaces currently polled, sorted.
    pub fn registered_namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.notifications.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// A new receiver of background errors; `None` once stopped.
    pub fn subscribe_errors(&self) -> Option<ErrorStream> {
        self.errors.lock().as_ref().map(|sender| ErrorStream::new(sender.subscribe()))
    }

    fn emit_error(
        &self,
        error: Arc<Error>,
    ) {
        if let Some(sender) = self.errors.lock().as_ref() {
            // No receiver is not a failure
            let _ = sender.send(error);
        }
    }

    /// Adds `namespace` to the poll set, keeping a notification id already seen.
    fn register(
        &self,
        namespace: &str,
    ) {
        if self.is_stopped() {
            return;
        }
        let mut added = false;
        self.notifications.entry(namespace.to_string()).or_insert_with(|| {
            added = true;
            INITIAL_NOTIFICATION_ID
        });
        if added {
            debug!(app_id = %self.config.app_id, namespace, "namespace registered for polling");
            self.registered.notify_one();
        }
    }

    fn install_store(
        &self,
        namespace: &str,
    ) -> Arc<NamespaceStore> {
        self.stores
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(NamespaceStore::new(namespace, self.config.namespace_format(namespace))))
            .value()
            .clone()
    }

    /// Loads every namespace in `namespaces` and registers each for polling,
    /// whatever the outcome.
    pub async fn initial_load(
        &self,
        namespaces: &[String],
    ) -> Vec<(String, LoadOutcome)> {
        let mut outcomes = Vec::with_capacity(namespaces.len());
        for namespace in namespaces {
            let store = self.install_store(namespace);
            let outcome = if store.is_loaded() {
                LoadOutcome::Remote
            } else {
                self.load_into(&store).await
            };
            self.register(namespace);
            outcomes.push((namespace.clone(), outcome));
        }
        info!(app_id = %self.config.app_id, ?outcomes, "initial load finished");
        outcomes
    }

    /// Store for a namespace the client is not tracking yet, fetched on demand.
    ///
    /// Returns `None` when fetching on cache miss is disabled, the client is
    /// stopped, or neither the service nor a backup could provide content.
    pub async fn load_on_demand(
        &self,
        namespace: &str,
    ) -> Option<Arc<NamespaceStore>> {
        if let Some(store) = self.store(namespace) {
            return Some(store);
        }
        if !self.config.fetch_on_cache_miss || self.is_stopped() {
            return None;
        }

        let _guard = self.load_lock.lock().await;
        if let Some(store) = self.store(namespace) {
            return Some(store);
        }

        let store = Arc::new(NamespaceStore::new(namespace, self.config.namespace_format(namespace)));
        match self.load_into(&store).await {
            LoadOutcome::Failed => {
                debug!(app_id = %self.config.app_id, namespace, "on-demand load failed, nothing cached");
                None
            }
            outcome => {
                debug!(app_id = %self.config.app_id, namespace, ?outcome, "namespace loaded on demand");
                let store = self.stores.entry(namespace.to_string()).or_insert(store).value().clone();
                self.register(namespace);
                Some(store)
            }
        }
    }

    /// First fetch of a namespace, with the backup as fallback.
    async fn load_into(
        &self,
        store: &NamespaceStore,
    ) -> LoadOutcome {
        let namespace = store.name();
        match self.fetcher.fetch_namespace(namespace, None).await {
            Ok(FetchOutcome::Fetched(remote)) => {
                self.install(store, remote).await;
                LoadOutcome::Remote
            }
            Ok(FetchOutcome::NotModified) => {
                // Only possible with a release key, which a first fetch never sends
                warn!(namespace, "unexpected not-modified answer to a first fetch");
                LoadOutcome::Remote
            }
            Err(NetworkError::NamespaceNotFound(_)) => {
                info!(namespace, "namespace not found on the service, using empty content");
                store.replace(Arc::new(KeyValues::new()), None, SnapshotSource::Remote);
                LoadOutcome::Remote
            }
            Err(e) => {
                warn!(app_id = %self.config.app_id, namespace, "initial fetch failed: {}", e);
                self.emit_error(Arc::new(e.into()));
                if !self.config.fallback_to_backup_on_connect_failure {
                    return LoadOutcome::Failed;
                }
                match self.backup.load(namespace, store.format()).await {
                    Some(snapshot) => {
                        info!(
                            namespace,
                            release_key = ?snapshot.release_key,
                            keys = snapshot.values.len(),
                            "serving namespace from backup"
                        );
                        store.replace(Arc::new(snapshot.values), snapshot.release_key, SnapshotSource::Backup);
                        LoadOutcome::Backup
                    }
                    None => {
                        self.emit_error(Arc::new(
                            BackupError::Unavailable {
                                namespace: namespace.to_string(),
                            }
                            .into(),
                        ));
                        LoadOutcome::Failed
                    }
                }
            }
        }
    }

    /// Replaces the store content, then persists it. Returns the previous content.
    async fn install(
        &self,
        store: &NamespaceStore,
        remote: RemoteNamespace,
    ) -> Arc<KeyValues> {
        let values = Arc::new(remote.values);
        let previous = store.replace(values.clone(), remote.release_key.clone(), SnapshotSource::Remote);
        self.backup
            .save(
                store.name(),
                store.format(),
                &BackupSnapshot {
                    values: (*values).clone(),
                    release_key: remote.release_key,
                },
            )
            .await;
        previous.values.clone()
    }

    /// Fetches a namespace reported as changed and publishes the outcome.
    ///
    /// A failed fetch is returned after it has been reported on the error
    /// stream and to the namespace's watchers.
    async fn refresh(
        &self,
        store: &NamespaceStore,
    ) -> std::result::Result<(), Arc<Error>> {
        let namespace = store.name();
        let current = store.snapshot();

        let fetched = match self.fetcher.fetch_namespace(namespace, current.release_key.clone()).await {
            Ok(FetchOutcome::NotModified) => {
                trace!(namespace, "namespace not modified");
                return Ok(());
            }
            Ok(FetchOutcome::Fetched(remote)) => remote,
            Err(NetworkError::NamespaceNotFound(_)) => {
                if current.values.is_empty() {
                    return Ok(());
                }
                info!(namespace, "namespace removed from the service, clearing content");
                RemoteNamespace::default()
            }
            Err(e) => {
                warn!(app_id = %self.config.app_id, namespace, "fetch after notification failed: {}", e);
                let error = Arc::new(Error::from(e));
                self.emit_error(error.clone());
                self.hub.publish(ChangeEvent::failed(namespace, current.values.clone(), error.clone()));
                return Err(error);
            }
        };

        if fetched.release_key.is_some() && fetched.release_key == current.release_key {
            trace!(namespace, release_key = ?fetched.release_key, "release key unchanged, no event");
            return Ok(());
        }

        let new_values = Arc::new(fetched.values.clone());
        let previous = self.install(store, fetched).await;
        debug!(namespace, "namespace updated, publishing change");
        self.hub.publish(ChangeEvent::new(namespace, previous, new_values));
        Ok(())
    }

    fn current_notifications(&self) -> Vec<Notification> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .iter()
            .map(|e| Notification::new(e.key().clone(), *e.value()))
            .collect();
        notifications.sort_by(|a, b| a.namespace_name.cmp(&b.namespace_name));
        notifications
    }

    /// The polling loop. Returns only after [`LongPollSynchronizer::stop`].
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut backoff = Backoff::new(self.config.retry);
        let poll_timeout = self.config.network.poll_timeout();
        info!(app_id = %self.config.app_id, cluster = %self.config.cluster, "synchronizer started");

        loop {
            if self.is_stopped() {
                break;
            }

            let notifications = self.current_notifications();
            if notifications.is_empty() {
                self.set_phase(SyncPhase::Idle);
                tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => break,
                    _ = self.registered.notified() => continue,
                }
            }

            self.set_phase(SyncPhase::Polling);
            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.fetcher.poll_for_changes(notifications, poll_timeout) => result,
            };

            match result {
                Ok(PollOutcome::Unchanged) => {
                    backoff.reset();
                }
                Ok(PollOutcome::Changed(changed)) => {
                    self.set_phase(SyncPhase::Fetching);
                    let mut failure: Option<Arc<Error>> = None;
                    for notification in changed {
                        if self.is_stopped() {
                            break;
                        }
                        if let Err(e) = self.apply_notification(notification).await {
                            failure.get_or_insert(e);
                        }
                    }

                    let Some(e) = failure else {
                        backoff.reset();
                        continue;
                    };
                    // The failed namespaces keep their old notification id and
                    // are reported again by the next poll
                    let delay = if e.is_retryable() {
                        backoff.next_delay()
                    } else {
                        backoff.ceiling()
                    };
                    debug!(
                        app_id = %self.config.app_id,
                        delay_ms = delay.as_millis() as u64,
                        attempt = backoff.attempt(),
                        "backing off after failed fetch"
                    );
                    self.set_phase(SyncPhase::BackingOff);
                    if !sleep_or_cancelled(delay, &self.shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    let delay = if e.is_retryable() {
                        let delay = backoff.next_delay();
                        warn!(
                            app_id = %self.config.app_id,
                            delay_ms = delay.as_millis() as u64,
                            attempt = backoff.attempt(),
                            "long poll failed: {}",
                            e
                        );
                        delay
                    } else {
                        let delay = backoff.ceiling();
                        error!(
                            app_id = %self.config.app_id,
                            delay_ms = delay.as_millis() as u64,
                            "long poll rejected: {}",
                            e
                        );
                        delay
                    };
                    self.emit_error(Arc::new(e.into()));

                    self.set_phase(SyncPhase::BackingOff);
                    if !sleep_or_cancelled(delay, &self.shutdown).await {
                        break;
                    }
                }
            }
        }

        self.set_phase(SyncPhase::Stopped);
        info!(app_id = %self.config.app_id, "synchronizer stopped");
        Ok(())
    }

    /// Refreshes the notified namespace and, once its content is current,
    /// records the new notification id.
    async fn apply_notification(
        &self,
        notification: Notification,
    ) -> std::result::Result<(), Arc<Error>> {
        let Some(store) = self.store(&notification.namespace_name) else {
            debug!(namespace = %notification.namespace_name, "notification for an untracked namespace ignored");
            return Ok(());
        };
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Ok(()),
            result = self.refresh(&store) => result?,
        }
        if let Some(mut id) = self.notifications.get_mut(&notification.namespace_name) {
            *id = notification.notification_id;
        }
        Ok(())
    }

    /// Cancels in-flight work, ends the poll loop and every stream.
    ///
    /// Stores keep their last content.
    pub fn stop(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.notifications.clear();
        self.hub.close();
        self.errors.lock().take();
        *self.phase.write() = SyncPhase::Stopped;
        info!(app_id = %self.config.app_id, "synchronizer stop requested");
    }
}
