use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::ClientBuilder;
use crate::async_task::spawn_task;
use crate::constants::DEFAULT_NAMESPACE;
use crate::watch::Subscription;
use crate::watch::WatchHub;
use crate::BackupStore;
use crate::ClientConfig;
use crate::ClientError;
use crate::Error;
use crate::ErrorStream;
use crate::FileBackupStore;
use crate::HttpRemoteFetcher;
use crate::KeyValues;
use crate::LongPollSynchronizer;
use crate::RemoteFetcher;
use crate::RemoteProvider;
use crate::Result;
use crate::SyncPhase;

/// Where and how a read looks up a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Defaults to `application`
    pub namespace: String,
    /// Returned when the key cannot be resolved
    pub default: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default: None,
        }
    }
}

impl ReadOptions {
    pub fn namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            default: None,
        }
    }

    pub fn with_default(
        mut self,
        default: impl Into<String>,
    ) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Local mirror of one application's configuration
///
/// Reads never fail: a missing key, namespace or service degrades to the
/// supplied default. Background failures are reported on the [`ErrorStream`]
/// returned by [`AppClient::start`].
pub struct AppClient {
    config: Arc<ClientConfig>,
    sync: Arc<LongPollSynchronizer>,
    hub: WatchHub,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AppClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AppClient")
            .field("endpoint", &self.config.endpoint)
            .field("app_id", &self.config.app_id)
            .field("cluster", &self.config.cluster)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl AppClient {
    /// Creates a client talking HTTP to `config.endpoint` with file backups
    /// under `config.backup_dir`.
    ///
    /// # Errors
    /// - [`ClientError::Misconfigured`] for missing or invalid identity
    /// - [`Error::Config`] for invalid timeouts, backoff or buffers
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let fetcher: Arc<dyn RemoteFetcher> = match config.provider {
            RemoteProvider::Apollo => Arc::new(HttpRemoteFetcher::new(&config)?),
        };
        let backup = Arc::new(FileBackupStore::new(&config.backup_dir, &config.app_id, &config.cluster));
        Self::with_components(config, fetcher, backup)
    }

    /// Creates a client over caller-provided transport and backup storage.
    pub fn with_components(
        config: ClientConfig,
        fetcher: Arc<dyn RemoteFetcher>,
        backup: Arc<dyn BackupStore>,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let hub = WatchHub::new(config.watch.subscriber_buffer_size);
        let sync = Arc::new(LongPollSynchronizer::new(config.clone(), fetcher, backup, hub.clone()));

        debug!(app_id = %config.app_id, cluster = %config.cluster, "client created");
        Ok(Self {
            config,
            sync,
            hub,
            task: tokio::sync::Mutex::new(None),
        })
    }

    pub fn builder(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
    ) -> ClientBuilder {
        ClientBuilder::new(endpoint, app_id)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Loads the preloaded namespaces, then starts background polling.
    ///
    /// Calling it again while running only hands out another error stream.
    ///
    /// # Errors
    /// [`ClientError::Stopped`] once [`AppClient::stop`] has been called.
    pub async fn start(&self) -> Result<ErrorStream> {
        let errors = self.sync.subscribe_errors().ok_or_else(|| self.stopped())?;

        let mut task = self.task.lock().await;
        if self.sync.is_stopped() {
            return Err(self.stopped());
        }
        if task.is_none() {
            info!(
                app_id = %self.config.app_id,
                namespaces = ?self.config.preload_namespaces,
                "starting configuration client"
            );
            self.sync.initial_load(&self.config.preload_namespaces).await;
            *task = Some(spawn_task("config-long-poll", self.sync.clone().run()));
        }
        Ok(errors)
    }

    /// Ends background work and every stream. Reads keep serving the last
    /// content. Idempotent.
    pub fn stop(&self) {
        if self.sync.is_stopped() {
            return;
        }
        self.sync.stop();
        info!(app_id = %self.config.app_id, "configuration client stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.sync.is_stopped()
    }

    pub fn phase(&self) -> SyncPhase {
        self.sync.phase()
    }

    /// Value of `key`, fetching the namespace first if it is not tracked yet.
    ///
    /// Falls back to `options.default` when the key or namespace is unavailable.
    pub async fn get(
        &self,
        key: &str,
        options: ReadOptions,
    ) -> Option<String> {
        let store = match self.sync.store(&options.namespace) {
            Some(store) => Some(store),
            None => self.sync.load_on_demand(&options.namespace).await,
        };
        store.and_then(|s| s.get(key)).or(options.default)
    }

    /// Value of `key` from content already in memory; never suspends.
    pub fn try_get(
        &self,
        key: &str,
        namespace: &str,
    ) -> Option<String> {
        self.sync.store(namespace).and_then(|s| s.get(key))
    }

    /// Whole content of `namespace`; empty when it cannot be obtained.
    pub async fn get_namespace(
        &self,
        namespace: &str,
    ) -> Arc<KeyValues> {
        let store = match self.sync.store(namespace) {
            Some(store) => Some(store),
            None => self.sync.load_on_demand(namespace).await,
        };
        store
            .map(|s| s.snapshot().values.clone())
            .unwrap_or_else(|| Arc::new(KeyValues::new()))
    }

    /// Changes of every namespace of this client.
    pub fn watch(&self) -> Subscription {
        self.hub.subscribe_global()
    }

    /// Changes of one namespace; the stream also ends when `cancel` fires.
    pub fn watch_namespace(
        &self,
        namespace: &str,
        cancel: Option<CancellationToken>,
    ) -> Subscription {
        match cancel {
            Some(token) => self.hub.subscribe_namespace_until(namespace, token),
            None => self.hub.subscribe_namespace(namespace),
        }
    }

    /// Namespaces currently polled for changes.
    pub fn tracked_namespaces(&self) -> Vec<String> {
        self.sync.registered_namespaces()
    }

    fn stopped(&self) -> Error {
        ClientError::Stopped {
            key: self.config.registry_key(),
        }
        .into()
    }
}

impl Drop for AppClient {
    fn drop(&mut self) {
        // The poll task holds its own handle on the synchronizer
        self.sync.stop();
    }
}
