// -
// Identity defaults

pub const DEFAULT_CLUSTER: &str = "default";
pub const DEFAULT_NAMESPACE: &str = "application";
pub const DEFAULT_BACKUP_DIR: &str = ".apollo";

// -
// Namespace content

/// Reserved key holding the raw payload of non-properties namespaces
pub const CONTENT_KEY: &str = "content";

/// Notification id sent for a namespace the client has never been notified about
pub(crate) const INITIAL_NOTIFICATION_ID: i64 = -1;

// -
// Remote protocol

pub(crate) const NOTIFICATIONS_PATH: &str = "notifications/v2";
pub(crate) const CONFIGS_PATH: &str = "configs";

pub(crate) const AUTHORIZATION_HEADER: &str = "Authorization";
pub(crate) const TIMESTAMP_HEADER: &str = "Timestamp";

// -
// Backup files

pub(crate) const RELEASE_KEY_HEADER: &str = "# release-key: ";
pub(crate) const BACKUP_TMP_SUFFIX: &str = ".tmp";
