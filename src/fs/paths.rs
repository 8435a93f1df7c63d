//! Directory listing and safe file writes.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::media::classify::has_image_extension;

/// Write `bytes` to `path` without ever leaving a partial file there.
///
/// The data goes to a hidden `.{uuid}.part` file in the same directory and
/// is renamed onto `path` once fully flushed. The temp name does not grow
/// with `path`, so any name [`destination_path`](super::destination_path)
/// produces can be persisted. Fails if `path` already exists.
pub async fn persist_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        return Err(Error::Download(format!(
            "Destination already exists: {}",
            path.display()
        )));
    }

    let temp_path = temp_path_for(path);
    let written = write_and_rename(&temp_path, path, bytes).await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(&temp_path).await;
    }
    written
}

async fn write_and_rename(temp_path: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(temp_path, path).await?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    path.with_file_name(format!(".{}.part", uuid::Uuid::new_v4()))
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let is_image = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| !name.starts_with('.') && has_image_extension(name));
        if is_image {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Creation time of a file, falling back to its modification time.
pub fn file_created(path: &Path) -> Result<SystemTime> {
    let metadata = std::fs::metadata(path)?;
    Ok(metadata.created().or_else(|_| metadata.modified())?)
}
