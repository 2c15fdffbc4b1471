//! Configuration Client Error Hierarchy
//!
//! Defines the error types surfaced by the mirror client, categorized by the
//! layer that produced them: the remote transport, the on-disk backup, client
//! construction and configuration loading.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (remote service, backup storage)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Client construction and lifecycle failures
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl Error {
    /// Whether the failure is transient and should go through the backoff policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::System(SystemError::Network(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns the transport error, if this is one.
    pub fn as_network(&self) -> Option<&NetworkError> {
        match self {
            Error::System(SystemError::Network(e)) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Remote configuration service
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Local last-known-good snapshots
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

/// Failures talking to the remote configuration service.
///
/// `Connect`, `Timeout` and `Server` are transient; everything else needs an
/// operator to fix credentials, routing or the server itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Remote endpoint unreachable (DNS, refused, reset)
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// Request exceeded its deadline
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Remote returned a 5xx status
    #[error("Server error ({status}) from {url}: {message}")]
    Server { url: String, status: u16, message: String },

    /// Signature or access key rejected
    #[error("Request to {url} was rejected with status {status}, check app id and access key")]
    Auth { url: String, status: u16 },

    /// Response could not be decoded or had an unexpected status
    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    /// Namespace does not exist on the remote service
    #[error("Namespace {0} not found")]
    NamespaceNotFound(String),

    /// Request could not be built (bad endpoint, bad header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl NetworkError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::Connect { .. } | NetworkError::Timeout { .. } | NetworkError::Server { .. }
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// No usable snapshot exists for the namespace
    #[error("No backup available for namespace {namespace}")]
    Unavailable { namespace: String },

    /// Disk I/O failures while reading or writing a snapshot
    #[error("Backup I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Provider name does not map to a supported remote service
    #[error("Unsupported configuration provider: {0}")]
    UnsupportedProvider(String),

    /// Required identity or option missing or invalid
    #[error("Misconfigured client: {0}")]
    Misconfigured(String),

    /// Operation attempted on a client after `stop()`
    #[error("Client {key} has been stopped")]
    Stopped { key: String },
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<BackupError> for Error {
    fn from(e: BackupError) -> Self {
        Error::System(SystemError::Backup(e))
    }
}
