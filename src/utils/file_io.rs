use std::path::Path;
use std::path::PathBuf;

use tokio::io::AsyncWriteExt;
use tracing::debug;
use tracing::error;

use crate::constants::BACKUP_TMP_SUFFIX;
use crate::BackupError;

pub(crate) async fn create_parent_dir_if_not_exist(path: &Path) -> Result<(), BackupError> {
    if let Some(parent_dir) = path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent_dir).await {
            error!("Failed to create directory {:?}: {:?}", parent_dir, e);
            return Err(BackupError::Io {
                path: parent_dir.to_path_buf(),
                source: e,
            });
        }
    }
    Ok(())
}

/// Writes `buf` to a temporary sibling, then renames it over `path`.
///
/// Readers either see the previous file or the complete new one.
pub(crate) async fn write_file_atomically(
    path: &Path,
    buf: &[u8],
) -> Result<(), BackupError> {
    create_parent_dir_if_not_exist(path).await?;

    let tmp_path = tmp_path_for(path);
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| BackupError::Io { path: p, source }
    };

    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(io_err(&tmp_path))?;
    file.write_all(buf).await.map_err(io_err(&tmp_path))?;
    file.sync_all().await.map_err(io_err(&tmp_path))?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await.map_err(io_err(path))?;
    debug!("written successfully: {:?}", path);
    Ok(())
}

/// Reads a whole file; a missing or unreadable file is `None`.
pub(crate) async fn read_file_if_exists(path: &Path) -> Option<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            error!("failed to read {:?}: {}", path, e);
            None
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(BACKUP_TMP_SUFFIX);
    path.with_file_name(name)
}
