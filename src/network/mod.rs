//! Transport to the remote configuration service.
//!
//! The synchronizer only sees the [`RemoteFetcher`] trait: one long-poll on the
//! notification endpoint and one full-namespace fetch. [`HttpRemoteFetcher`]
//! implements both over HTTP; requests are optionally signed by a
//! [`RequestSigner`].

mod http_fetcher;
mod signature;
pub use http_fetcher::*;
pub use signature::*;


use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;

use crate::KeyValues;
use crate::NetworkError;

/// Per-namespace change marker exchanged with the notification endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub namespace_name: String,
    pub notification_id: i64,
}

impl Notification {
    pub fn new(
        namespace_name: impl Into<String>,
        notification_id: i64,
    ) -> Self {
        Self {
            namespace_name: namespace_name.into(),
            notification_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing changed before the server or the client gave up waiting
    Unchanged,
    /// Namespaces with a newer notification id than the one sent
    Changed(Vec<Notification>),
}

/// Complete content of a namespace as served by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteNamespace {
    pub values: KeyValues,
    pub release_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched(RemoteNamespace),
    /// The release key sent with the request is still current
    NotModified,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait RemoteFetcher: Send + Sync + 'static {
    /// Long-polls for namespaces whose notification id moved past the one sent.
    ///
    /// Namespace names are the client's own names; translating them to the
    /// service's naming is the implementation's job.
    ///
    /// # Errors
    /// - [`NetworkError::Connect`], [`NetworkError::Server`]: retryable
    /// - [`NetworkError::Auth`], [`NetworkError::MalformedResponse`]: not retryable
    async fn poll_for_changes(
        &self,
        notifications: Vec<Notification>,
        timeout: Duration,
    ) -> Result<PollOutcome, NetworkError>;

    /// Fetches the full content of `namespace`.
    ///
    /// `release_key` is the token of the content the caller already holds, so
    /// the service can answer [`FetchOutcome::NotModified`].
    ///
    /// # Errors
    /// - [`NetworkError::NamespaceNotFound`] when the service does not know the namespace
    /// - the same transport errors as [`RemoteFetcher::poll_for_changes`]
    async fn fetch_namespace(
        &self,
        namespace: &str,
        release_key: Option<String>,
    ) -> Result<FetchOutcome, NetworkError>;
}
