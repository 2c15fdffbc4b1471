use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;
use tracing::trace;

use super::AccessKeySigner;
use super::FetchOutcome;
use super::Notification;
use super::PollOutcome;
use super::RemoteFetcher;
use super::RemoteNamespace;
use super::RequestSigner;
use super::SignatureContext;
use crate::constants::CONFIGS_PATH;
use crate::constants::NOTIFICATIONS_PATH;
use crate::remote_namespace_name;
use crate::time::get_now_as_millis;
use crate::ClientConfig;
use crate::ClientError;
use crate::KeyValues;
use crate::NetworkError;
use crate::Result;

/// Longest server message kept in a [`NetworkError::Server`]
const MAX_ERROR_BODY_LEN: usize = 256;

/// Body of `GET /configs/{appId}/{cluster}/{namespace}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    #[serde(default)]
    configurations: KeyValues,
    #[serde(default)]
    release_key: Option<String>,
}

/// [`RemoteFetcher`] speaking the Apollo HTTP protocol
pub struct HttpRemoteFetcher {
    client: reqwest::Client,
    endpoint: Url,
    app_id: String,
    cluster: String,
    client_ip: Option<String>,
    request_timeout: Duration,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl std::fmt::Debug for HttpRemoteFetcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("HttpRemoteFetcher")
            .field("endpoint", &self.endpoint.as_str())
            .field("app_id", &self.app_id)
            .field("cluster", &self.cluster)
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl HttpRemoteFetcher {
    /// Builds a fetcher for the identity in `config`.
    ///
    /// A caller-supplied signer wins over the access-key secret.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            ClientError::Misconfigured(format!("invalid endpoint {}: {}", config.endpoint, e))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ClientError::Misconfigured(format!(
                "endpoint {} cannot carry a path",
                config.endpoint
            ))
            .into());
        }

        let client = reqwest::Client::builder()
            .connect_timeout(config.network.connect_timeout())
            .build()
            .map_err(|e| ClientError::Misconfigured(format!("failed to build http client: {e}")))?;

        let signer = config.signer.clone().or_else(|| {
            config
                .secret
                .as_ref()
                .filter(|secret| !secret.is_empty())
                .map(|secret| Arc::new(AccessKeySigner::new(secret.clone())) as Arc<dyn RequestSigner>)
        });

        Ok(Self {
            client,
            endpoint,
            app_id: config.app_id.clone(),
            cluster: config.cluster.clone(),
            client_ip: config.client_ip.clone(),
            request_timeout: config.network.request_timeout(),
            signer,
        })
    }

    pub(crate) fn url_for(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> std::result::Result<Url, NetworkError> {
        let mut url = self.endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| NetworkError::InvalidRequest(format!("{} cannot carry a path", self.endpoint)))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(
        &self,
        url: &Url,
        timeout: Duration,
    ) -> std::result::Result<reqwest::Response, NetworkError> {
        let mut request = self.client.get(url.clone()).timeout(timeout);

        if let Some(signer) = &self.signer {
            let path_with_query = match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            };
            let ctx = SignatureContext {
                method: "GET".to_string(),
                path_with_query,
                timestamp_ms: get_now_as_millis(),
                app_id: self.app_id.clone(),
            };
            for (name, value) in signer.sign(&ctx) {
                request = request.header(name, value);
            }
        }

        trace!("GET {}", url);
        request.send().await.map_err(|e| classify_transport_error(url, e))
    }
}

#[async_trait]
impl RemoteFetcher for HttpRemoteFetcher {
    async fn poll_for_changes(
        &self,
        notifications: Vec<Notification>,
        timeout: Duration,
    ) -> std::result::Result<PollOutcome, NetworkError> {
        // The service knows properties namespaces without their extension
        let mut local_names: HashMap<String, String> = HashMap::with_capacity(notifications.len());
        let wire: Vec<Notification> = notifications
            .into_iter()
            .map(|n| {
                let remote = remote_namespace_name(&n.namespace_name).to_string();
                local_names.insert(remote.clone(), n.namespace_name);
                Notification::new(remote, n.notification_id)
            })
            .collect();
        let encoded = serde_json::to_string(&wire)
            .map_err(|e| NetworkError::InvalidRequest(format!("failed to encode notifications: {e}")))?;

        let url = self.url_for(
            &NOTIFICATIONS_PATH.split('/').collect::<Vec<_>>(),
            &[
                ("appId", self.app_id.as_str()),
                ("cluster", self.cluster.as_str()),
                ("notifications", encoded.as_str()),
            ],
        )?;

        let response = match self.send(&url, timeout).await {
            Ok(response) => response,
            Err(NetworkError::Timeout { .. }) => {
                debug!("long poll timed out after {:?} without changes", timeout);
                return Ok(PollOutcome::Unchanged);
            }
            Err(e) => return Err(e),
        };

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(PollOutcome::Unchanged);
        }
        check_status(&url, status)?;

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(PollOutcome::Unchanged),
            Err(e) => return Err(classify_transport_error(&url, e)),
        };
        if body.trim().is_empty() {
            return Ok(PollOutcome::Unchanged);
        }

        let changed: Vec<Notification> =
            serde_json::from_str(&body).map_err(|e| NetworkError::MalformedResponse {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        if changed.is_empty() {
            return Ok(PollOutcome::Unchanged);
        }

        Ok(PollOutcome::Changed(
            changed
                .into_iter()
                .map(|n| {
                    let local = local_names
                        .get(&n.namespace_name)
                        .cloned()
                        .unwrap_or(n.namespace_name);
                    Notification::new(local, n.notification_id)
                })
                .collect(),
        ))
    }

    async fn fetch_namespace(
        &self,
        namespace: &str,
        release_key: Option<String>,
    ) -> std::result::Result<FetchOutcome, NetworkError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(release_key) = release_key.as_deref() {
            query.push(("releaseKey", release_key));
        }
        if let Some(ip) = self.client_ip.as_deref() {
            query.push(("ip", ip));
        }
        let url = self.url_for(
            &[
                CONFIGS_PATH,
                self.app_id.as_str(),
                self.cluster.as_str(),
                remote_namespace_name(namespace),
            ],
            &query,
        )?;

        let response = self.send(&url, self.request_timeout).await?;
        let status = response.status();
        match status {
            StatusCode::NOT_MODIFIED => return Ok(FetchOutcome::NotModified),
            StatusCode::NOT_FOUND => return Err(NetworkError::NamespaceNotFound(namespace.to_string())),
            _ => {}
        }
        if let Err(e) = check_status(&url, status) {
            return Err(match e {
                NetworkError::Server { url, status, .. } => NetworkError::Server {
                    url,
                    status,
                    message: truncated_body(response).await,
                },
                other => other,
            });
        }

        let body: ConfigResponse = response.json().await.map_err(|e| {
            if e.is_decode() {
                NetworkError::MalformedResponse {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            } else {
                classify_transport_error(&url, e)
            }
        })?;

        debug!(
            namespace,
            release_key = ?body.release_key,
            keys = body.configurations.len(),
            "namespace fetched"
        );
        Ok(FetchOutcome::Fetched(RemoteNamespace {
            values: body.configurations,
            release_key: body.release_key,
        }))
    }
}

/// Maps a non-2xx status onto the error taxonomy.
fn check_status(
    url: &Url,
    status: StatusCode,
) -> std::result::Result<(), NetworkError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NetworkError::Auth {
            url: url.to_string(),
            status: status.as_u16(),
        },
        s if s.is_server_error() => NetworkError::Server {
            url: url.to_string(),
            status: s.as_u16(),
            message: s.canonical_reason().unwrap_or_default().to_string(),
        },
        s => NetworkError::MalformedResponse {
            url: url.to_string(),
            reason: format!("unexpected status {s}"),
        },
    })
}

fn classify_transport_error(
    url: &Url,
    e: reqwest::Error,
) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout { url: url.to_string() }
    } else if e.is_builder() {
        NetworkError::InvalidRequest(e.to_string())
    } else if e.is_decode() {
        NetworkError::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        NetworkError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

async fn truncated_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}
