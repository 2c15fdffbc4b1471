//! Last-known-good snapshots of namespaces on local disk.
//!
//! Snapshots are written after every successful fetch and read only when the
//! remote service cannot provide a namespace that has no in-memory content
//! yet. Durability is best-effort: a failed write is logged and never fails
//! the fetch that produced it.

mod file_backup_store;
mod properties;
pub use file_backup_store::*;
pub(crate) use properties::*;


#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::KeyValues;
use crate::NamespaceFormat;

/// Durable copy of a namespace's content plus its release token
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BackupSnapshot {
    pub values: KeyValues,
    pub release_key: Option<String>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait BackupStore: Send + Sync + 'static {
    /// Reads the snapshot of `namespace`; unreadable or missing is `None`.
    async fn load(
        &self,
        namespace: &str,
        format: NamespaceFormat,
    ) -> Option<BackupSnapshot>;

    /// Overwrites the snapshot of `namespace`. Failures are logged and swallowed.
    async fn save(
        &self,
        namespace: &str,
        format: NamespaceFormat,
        snapshot: &BackupSnapshot,
    );
}
