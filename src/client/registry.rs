use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;
use tracing::info;

use super::AppClient;
use crate::config::registry_key;
use crate::ClientConfig;
use crate::Result;

/// Shares one [`AppClient`] per endpoint and application
///
/// Clients are keyed by `endpoint/app_id`; the cluster is not part of the
/// key. Construction happens under the map entry lock, so concurrent first
/// calls for one key converge on a single client.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: DashMap<String, Arc<AppClient>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered client for the identity in `config`, created on first use.
    ///
    /// A registered client that has been stopped is replaced.
    pub fn get_or_create(
        &self,
        config: ClientConfig,
    ) -> Result<Arc<AppClient>> {
        self.get_or_create_with(config, AppClient::new)
    }

    /// Like [`ClientRegistry::get_or_create`] with a custom constructor.
    pub fn get_or_create_with<F>(
        &self,
        config: ClientConfig,
        build: F,
    ) -> Result<Arc<AppClient>>
    where
        F: FnOnce(ClientConfig) -> Result<AppClient>,
    {
        config.validate()?;
        let key = config.registry_key();

        match self.clients.entry(key) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_stopped() {
                    return Ok(entry.get().clone());
                }
                debug!(key = %entry.key(), "replacing stopped client");
                let client = Arc::new(build(config)?);
                entry.insert(client.clone());
                Ok(client)
            }
            Entry::Vacant(entry) => {
                info!(key = %entry.key(), "registering configuration client");
                let client = Arc::new(build(config)?);
                entry.insert(client.clone());
                Ok(client)
            }
        }
    }

    pub fn get(
        &self,
        endpoint: &str,
        app_id: &str,
    ) -> Option<Arc<AppClient>> {
        self.clients.get(&registry_key(endpoint, app_id)).map(|c| c.value().clone())
    }

    /// Unregisters and stops the client.
    pub fn remove(
        &self,
        endpoint: &str,
        app_id: &str,
    ) -> Option<Arc<AppClient>> {
        let (_, client) = self.clients.remove(&registry_key(endpoint, app_id))?;
        client.stop();
        Some(client)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
