use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::trace;

use super::KeyValues;
use super::NamespaceFormat;

/// Where the currently visible content of a namespace came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Nothing installed yet
    Empty,
    /// Last successful fetch from the remote service
    Remote,
    /// Last-known-good snapshot read from disk
    Backup,
}

/// Immutable view of a namespace at one instant
#[derive(Debug, Clone)]
pub struct NamespaceSnapshot {
    pub values: Arc<KeyValues>,
    pub release_key: Option<String>,
    pub source: SnapshotSource,
}

impl NamespaceSnapshot {
    pub fn empty() -> Self {
        Self {
            values: Arc::new(KeyValues::new()),
            release_key: None,
            source: SnapshotSource::Empty,
        }
    }
}

/// In-memory holder of one namespace's current content
///
/// Readers load the current snapshot without locking; writers install a
/// complete new mapping with a single pointer swap, so a reader sees either
/// the whole old mapping or the whole new one.
#[derive(Debug)]
pub struct NamespaceStore {
    name: String,
    format: NamespaceFormat,
    current: ArcSwap<NamespaceSnapshot>,
}

impl NamespaceStore {
    pub fn new(
        name: impl Into<String>,
        format: NamespaceFormat,
    ) -> Self {
        Self {
            name: name.into(),
            format,
            current: ArcSwap::from_pointee(NamespaceSnapshot::empty()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> NamespaceFormat {
        self.format
    }

    pub fn snapshot(&self) -> Arc<NamespaceSnapshot> {
        self.current.load_full()
    }

    /// Installs `values` as the complete content and returns what was visible before.
    pub fn replace(
        &self,
        values: Arc<KeyValues>,
        release_key: Option<String>,
        source: SnapshotSource,
    ) -> Arc<NamespaceSnapshot> {
        let previous = self.current.swap(Arc::new(NamespaceSnapshot {
            values,
            release_key,
            source,
        }));
        trace!(
            namespace = %self.name,
            previous_release = ?previous.release_key,
            ?source,
            "namespace content replaced"
        );
        previous
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<String> {
        self.current.load().values.get(key).cloned()
    }

    pub fn release_key(&self) -> Option<String> {
        self.current.load().release_key.clone()
    }

    pub fn source(&self) -> SnapshotSource {
        self.current.load().source
    }

    /// Whether content from the remote service or a backup has been installed.
    pub fn is_loaded(&self) -> bool {
        self.source() != SnapshotSource::Empty
    }
}
