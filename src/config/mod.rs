//! Configuration management for the configuration mirror client.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`APOLLO_CONFIG_PATH`)
//! - Environment variable overrides (`APOLLO__` prefix)
//! - Component-wise validation
mod network;
mod retry;
mod watch;
pub use network::*;
pub use retry::*;
pub use watch::*;


use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_BACKUP_DIR;
use crate::constants::DEFAULT_CLUSTER;
use crate::constants::DEFAULT_NAMESPACE;
use crate::ClientError;
use crate::Error;
use crate::NamespaceFormat;
use crate::RequestSigner;
use crate::Result;

/// Remote configuration services the client knows how to talk to.
///
/// Resolved once when the client is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteProvider {
    #[default]
    Apollo,
}

impl FromStr for RemoteProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "apollo" => Ok(RemoteProvider::Apollo),
            other => Err(ClientError::UnsupportedProvider(other.to_string()).into()),
        }
    }
}

/// Bootstrap configuration of one application client
///
/// Merged from (later sources override earlier):
/// 1. Type defaults
/// 2. Configuration file named by `APOLLO_CONFIG_PATH`
/// 3. Environment variables with the `APOLLO__` prefix
#[derive(Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    /// Remote service flavour
    #[serde(default)]
    pub provider: RemoteProvider,

    /// Base URL of the config service, e.g. `http://localhost:8080`
    #[serde(default)]
    pub endpoint: String,

    /// Application identity registered on the config service
    #[serde(default)]
    pub app_id: String,

    /// Deployment grouping whose values are served
    #[serde(default = "default_cluster")]
    pub cluster: String,

    /// Access key secret used by the built-in request signer
    #[serde(default)]
    pub secret: Option<String>,

    /// Client address reported to the service for gray releases
    #[serde(default)]
    pub client_ip: Option<String>,

    /// Namespaces fetched during `start()` and polled from then on
    #[serde(default = "default_preload_namespaces")]
    pub preload_namespaces: Vec<String>,

    /// Fetch untracked namespaces on first read instead of returning the default
    #[serde(default = "default_true")]
    pub fetch_on_cache_miss: bool,

    /// Serve the on-disk snapshot when the service cannot be reached
    #[serde(default = "default_true")]
    pub fallback_to_backup_on_connect_failure: bool,

    /// Root directory of the last-known-good snapshots
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Explicit formats for namespaces whose name does not carry a reliable extension
    #[serde(default)]
    pub namespace_formats: HashMap<String, NamespaceFormat>,

    /// Timeouts for the remote service
    #[serde(default)]
    pub network: NetworkConfig,

    /// Backoff applied after transport failures
    #[serde(default)]
    pub retry: BackoffPolicy,

    /// Change notification buffers
    #[serde(default)]
    pub watch: WatchConfig,

    /// Caller-supplied signing hook, takes precedence over `secret`
    #[serde(skip)]
    pub signer: Option<Arc<dyn RequestSigner>>,
}

impl Debug for ClientConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("provider", &self.provider)
            .field("endpoint", &self.endpoint)
            .field("app_id", &self.app_id)
            .field("cluster", &self.cluster)
            .field("preload_namespaces", &self.preload_namespaces)
            .field("fetch_on_cache_miss", &self.fetch_on_cache_miss)
            .field(
                "fallback_to_backup_on_connect_failure",
                &self.fallback_to_backup_on_connect_failure,
            )
            .field("backup_dir", &self.backup_dir)
            .finish_non_exhaustive()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            provider: RemoteProvider::default(),
            endpoint: String::new(),
            app_id: String::new(),
            cluster: default_cluster(),
            secret: None,
            client_ip: None,
            preload_namespaces: default_preload_namespaces(),
            fetch_on_cache_miss: true,
            fallback_to_backup_on_connect_failure: true,
            backup_dir: default_backup_dir(),
            namespace_formats: HashMap::new(),
            network: NetworkConfig::default(),
            retry: BackoffPolicy::default(),
            watch: WatchConfig::default(),
            signer: None,
        }
    }
}

impl ClientConfig {
    /// Convenience constructor for the two required identity fields.
    pub fn with_identity(
        endpoint: impl Into<String>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            app_id: app_id.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from hierarchical sources without validation.
    ///
    /// # Note
    /// Validation is deferred so callers can apply `with_override_config()`
    /// first; `AppClient` construction validates before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("APOLLO__APP_ID", "SampleApp");
    /// std::env::set_var("APOLLO__ENDPOINT", "http://localhost:8080");
    /// let cfg = ClientConfig::new()?;
    /// cfg.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("APOLLO_CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// The current values are the base, the file comes next and the
    /// environment still wins.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let mut config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        config.signer = self.signer.clone();
        Ok(config)
    }

    /// Validates identity first, then every subsystem section.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ClientError::Misconfigured("endpoint is not set".into()).into());
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ClientError::Misconfigured(format!(
                "endpoint {} must start with http:// or https://",
                self.endpoint
            ))
            .into());
        }
        if self.app_id.trim().is_empty() {
            return Err(ClientError::Misconfigured("app_id is not set".into()).into());
        }
        if self.cluster.trim().is_empty() {
            return Err(ClientError::Misconfigured("cluster must not be empty".into()).into());
        }
        if self.preload_namespaces.iter().any(|ns| ns.trim().is_empty()) {
            return Err(Error::Config(ConfigError::Message(
                "preload_namespaces must not contain empty names".into(),
            )));
        }
        // Names are also backup file names
        if let Some(ns) = self
            .preload_namespaces
            .iter()
            .find(|ns| ns.contains(['/', '\\']) || ns.chars().all(|c| c == '.'))
        {
            return Err(Error::Config(ConfigError::Message(format!(
                "namespace {ns} must not contain path separators or consist of dots only"
            ))));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message("backup_dir must not be empty".into())));
        }

        self.network.validate()?;
        self.retry.validate()?;
        self.watch.validate()?;

        Ok(())
    }

    /// Format of `namespace`: explicit override first, then the name's extension.
    pub fn namespace_format(
        &self,
        namespace: &str,
    ) -> NamespaceFormat {
        self.namespace_formats
            .get(namespace)
            .copied()
            .unwrap_or_else(|| NamespaceFormat::infer(namespace))
    }

    /// Registry key: endpoint and application identity, cluster excluded.
    pub fn registry_key(&self) -> String {
        registry_key(&self.endpoint, &self.app_id)
    }
}

pub(crate) fn registry_key(
    endpoint: &str,
    app_id: &str,
) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), app_id)
}

fn env_source() -> Environment {
    Environment::with_prefix("APOLLO")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("preload_namespaces")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_cluster() -> String {
    DEFAULT_CLUSTER.to_string()
}
fn default_preload_namespaces() -> Vec<String> {
    vec![DEFAULT_NAMESPACE.to_string()]
}
fn default_backup_dir() -> PathBuf {
    PathBuf::from(DEFAULT_BACKUP_DIR)
}
fn default_true() -> bool {
    true
}
