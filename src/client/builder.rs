use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::AppClient;
use crate::BackoffPolicy;
use crate::BackupStore;
use crate::ClientConfig;
use crate::NamespaceFormat;
use crate::RemoteFetcher;
use crate::RequestSigner;
use crate::Result;

/// Fluent construction of an [`AppClient`]
///
/// Starts from [`ClientConfig::default`] with the given identity.
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            config: ClientConfig::with_identity(endpoint, app_id),
        }
    }

    /// Set deployment cluster (default: `default`)
    pub fn cluster(
        mut self,
        cluster: impl Into<String>,
    ) -> Self {
        self.config.cluster = cluster.into();
        self
    }

    /// Sign requests with the application's access key secret
    pub fn secret(
        mut self,
        secret: impl Into<String>,
    ) -> Self {
        self.config.secret = Some(secret.into());
        self
    }

    /// Sign requests with a custom hook; wins over [`secret`](ClientBuilder::secret)
    pub fn signer(
        mut self,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        self.config.signer = Some(signer);
        self
    }

    pub fn client_ip(
        mut self,
        ip: impl Into<String>,
    ) -> Self {
        self.config.client_ip = Some(ip.into());
        self
    }

    /// Namespaces loaded by `start()` (default: `["application"]`)
    pub fn preload_namespaces<I, S>(
        mut self,
        namespaces: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.preload_namespaces = namespaces.into_iter().map(Into::into).collect();
        self
    }

    /// Fetch untracked namespaces on first read (default: enabled)
    pub fn fetch_on_cache_miss(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.fetch_on_cache_miss = enable;
        self
    }

    /// Serve on-disk snapshots when the service is unreachable (default: enabled)
    pub fn fallback_to_backup(
        mut self,
        enable: bool,
    ) -> Self {
        self.config.fallback_to_backup_on_connect_failure = enable;
        self
    }

    /// Root of the on-disk snapshots (default: `.apollo`)
    pub fn backup_dir(
        mut self,
        dir: impl Into<PathBuf>,
    ) -> Self {
        self.config.backup_dir = dir.into();
        self
    }

    /// Pin the format of a namespace whose name does not carry it
    pub fn namespace_format(
        mut self,
        namespace: impl Into<String>,
        format: NamespaceFormat,
    ) -> Self {
        self.config.namespace_formats.insert(namespace.into(), format);
        self
    }

    /// Set connection timeout (default: 1s)
    pub fn connect_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.network.connect_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Set namespace fetch timeout (default: 5s)
    pub fn request_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.network.request_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    /// Set long-poll timeout (default: 90s)
    pub fn poll_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.network.poll_timeout_in_ms = timeout.as_millis() as u64;
        self
    }

    pub fn backoff(
        mut self,
        policy: BackoffPolicy,
    ) -> Self {
        self.config.retry = policy;
        self
    }

    /// Per-subscription buffer (default: 64)
    pub fn subscriber_buffer_size(
        mut self,
        size: usize,
    ) -> Self {
        self.config.watch.subscriber_buffer_size = size;
        self
    }

    /// Completely replaces the configuration, identity included
    ///
    /// # Warning: Configuration Override
    /// Discards everything set through the individual methods so far.
    pub fn set_config(
        mut self,
        config: ClientConfig,
    ) -> Self {
        self.config = config;
        self
    }

    /// The configuration as built so far, e.g. for
    /// [`ClientRegistry::get_or_create`](crate::ClientRegistry::get_or_create).
    pub fn into_config(self) -> ClientConfig {
        self.config
    }

    /// Build the client with current configuration
    pub fn build(self) -> Result<AppClient> {
        AppClient::new(self.config)
    }

    /// Build the client over caller-provided transport and backup storage
    pub fn build_with(
        self,
        fetcher: Arc<dyn RemoteFetcher>,
        backup: Arc<dyn BackupStore>,
    ) -> Result<AppClient> {
        AppClient::with_components(self.config, fetcher, backup)
    }
}
