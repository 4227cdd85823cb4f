use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use crate::error::RecorderError;

use super::model::BUFFER_FILE_EXTENSIONS;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferFileInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    #[serde(skip)]
    pub modified_at: SystemTime,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted_count: usize,
    pub freed_bytes: u64,
    pub deleted_files: Vec<PathBuf>,
}

fn is_buffer_video(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            BUFFER_FILE_EXTENSIONS
                .iter()
                .any(|candidate| extension.eq_ignore_ascii_case(candidate))
        })
}

fn cleanup_error(path: &Path) -> impl FnOnce(std::io::Error) -> RecorderError + '_ {
    move |source| RecorderError::BufferCleanup {
        path: path.to_path_buf(),
        source,
    }
}

/// Buffer videos in `directory`, oldest first.
pub fn list_buffer_files(directory: &Path) -> Result<Vec<BufferFileInfo>, RecorderError> {
    if !directory.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(cleanup_error(directory))? {
        let entry = entry.map_err(cleanup_error(directory))?;
        let path = entry.path();
        if !is_buffer_video(&path) {
            continue;
        }

        let metadata = entry.metadata().map_err(cleanup_error(&path))?;
        if !metadata.is_file() {
            continue;
        }

        files.push(BufferFileInfo {
            modified_at: metadata.modified().map_err(cleanup_error(&path))?,
            size_bytes: metadata.len(),
            path,
        });
    }

    files.sort_by_key(|file| file.modified_at);
    Ok(files)
}

/// Deletes all but the `keep` newest buffer videos.
pub fn cleanup_buffer_directory(
    directory: &Path,
    keep: usize,
) -> Result<CleanupResult, RecorderError> {
    let mut files = list_buffer_files(directory)?;
    let mut result = CleanupResult::default();

    let excess = files.len().saturating_sub(keep);
    for oldest in files.drain(..excess) {
        if let Err(error) = std::fs::remove_file(&oldest.path) {
            tracing::warn!(
                path = %oldest.path.display(),
                "Failed to delete buffer file: {error}"
            );
            continue;
        }

        result.freed_bytes = result.freed_bytes.saturating_add(oldest.size_bytes);
        result.deleted_files.push(oldest.path);
    }
    result.deleted_count = result.deleted_files.len();

    if result.deleted_count > 0 {
        tracing::debug!(
            directory = %directory.display(),
            deleted_count = result.deleted_count,
            freed_bytes = result.freed_bytes,
            "Cleaned buffer directory"
        );
    }

    Ok(result)
}
