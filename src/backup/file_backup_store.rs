use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

use super::decode_properties;
use super::encode_properties;
use super::BackupSnapshot;
use super::BackupStore;
use crate::constants::CONTENT_KEY;
use crate::file_io::read_file_if_exists;
use crate::file_io::write_file_atomically;
use crate::KeyValues;
use crate::NamespaceFormat;

/// Stores one file per namespace under `<root>/<app_id>/<cluster>/`
///
/// Properties namespaces are written as `key=value` lines with a release key
/// header; raw formats are written verbatim so the file is a valid document
/// of its own format.
#[derive(Debug, Clone)]
pub struct FileBackupStore {
    dir: PathBuf,
}

impl FileBackupStore {
    pub fn new(
        root: impl AsRef<Path>,
        app_id: &str,
        cluster: &str,
    ) -> Self {
        Self {
            dir: root.as_ref().join(sanitize(app_id)).join(sanitize(cluster)),
        }
    }

    /// Location of the snapshot for `namespace`.
    pub fn path_for(
        &self,
        namespace: &str,
        format: NamespaceFormat,
    ) -> PathBuf {
        let file_name = sanitize(namespace);
        if format == NamespaceFormat::Properties && !file_name.ends_with(".properties") {
            self.dir.join(format!("{file_name}.properties"))
        } else {
            self.dir.join(file_name)
        }
    }
}

#[async_trait]
impl BackupStore for FileBackupStore {
    async fn load(
        &self,
        namespace: &str,
        format: NamespaceFormat,
    ) -> Option<BackupSnapshot> {
        let path = self.path_for(namespace, format);
        let content = read_file_if_exists(&path).await?;

        let snapshot = if format.is_raw() {
            let mut values = KeyValues::new();
            values.insert(CONTENT_KEY.to_string(), content);
            BackupSnapshot {
                values,
                release_key: None,
            }
        } else {
            let (values, release_key) = decode_properties(&content);
            BackupSnapshot { values, release_key }
        };

        debug!(namespace, ?path, keys = snapshot.values.len(), "backup loaded");
        Some(snapshot)
    }

    async fn save(
        &self,
        namespace: &str,
        format: NamespaceFormat,
        snapshot: &BackupSnapshot,
    ) {
        let path = self.path_for(namespace, format);
        let content = if format.is_raw() {
            snapshot.values.get(CONTENT_KEY).cloned().unwrap_or_default()
        } else {
            encode_properties(&snapshot.values, snapshot.release_key.as_deref())
        };

        if let Err(e) = write_file_atomically(&path, content.as_bytes()).await {
            warn!(namespace, ?path, "failed to write backup: {}", e);
        }
    }
}

/// Keeps identity strings usable as a single path component.
///
/// Reserved characters become `_` and leading dots are dropped, so `a/b` and
/// `a_b` share a file; [`ClientConfig::validate`](crate::ClientConfig::validate)
/// rejects preloaded names with separators. A name with nothing left maps to `_`.
fn sanitize(component: &str) -> String {
    let sanitized: String = component
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    match sanitized.trim_start_matches('.') {
        "" => "_".to_string(),
        rest => rest.to_string(),
    }
}
