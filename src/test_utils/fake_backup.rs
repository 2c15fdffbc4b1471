use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::BackupSnapshot;
use crate::BackupStore;
use crate::NamespaceFormat;

/// In-memory [`BackupStore`] recording every save
#[derive(Debug, Default)]
pub struct MemoryBackupStore {
    snapshots: Mutex<HashMap<String, BackupSnapshot>>,
    saves: AtomicUsize,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(
        self,
        namespace: &str,
        snapshot: BackupSnapshot,
    ) -> Self {
        self.snapshots.lock().insert(namespace.to_string(), snapshot);
        self
    }

    pub fn snapshot(
        &self,
        namespace: &str,
    ) -> Option<BackupSnapshot> {
        self.snapshots.lock().get(namespace).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackupStore for MemoryBackupStore {
    async fn load(
        &self,
        namespace: &str,
        _format: NamespaceFormat,
    ) -> Option<BackupSnapshot> {
        self.snapshot(namespace)
    }

    async fn save(
        &self,
        namespace: &str,
        _format: NamespaceFormat,
        snapshot: &BackupSnapshot,
    ) {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().insert(namespace.to_string(), snapshot.clone());
    }
}
