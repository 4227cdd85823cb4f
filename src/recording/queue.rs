use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::RecorderError;

use super::metadata::write_metadata;
use super::model::VideoQueueItem;

/// Receiver of finished clips; trimming and encoding happen downstream.
pub trait VideoQueue: Send + 'static {
    fn enqueue(&mut self, item: VideoQueueItem) -> Result<(), RecorderError>;
}

impl VideoQueue for mpsc::UnboundedSender<VideoQueueItem> {
    fn enqueue(&mut self, item: VideoQueueItem) -> Result<(), RecorderError> {
        let file_name = item.file_name.clone();
        self.send(item).map_err(|_| RecorderError::Queue {
            filename: file_name,
            reason: "video queue receiver dropped".to_string(),
        })
    }
}

/// Writes each clip's metadata next to its future output file, then forwards the item.
pub struct SidecarQueue<Q: VideoQueue> {
    output_directory: PathBuf,
    inner: Q,
}

impl<Q: VideoQueue> SidecarQueue<Q> {
    pub fn new(output_directory: impl Into<PathBuf>, inner: Q) -> Self {
        Self {
            output_directory: output_directory.into(),
            inner,
        }
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_directory.join(format!("{file_name}.mp4"))
    }
}

impl<Q: VideoQueue> VideoQueue for SidecarQueue<Q> {
    fn enqueue(&mut self, item: VideoQueueItem) -> Result<(), RecorderError> {
        let output_path = self.output_path(&item.file_name);
        write_metadata(&output_path, &item.metadata).map_err(|source| RecorderError::Sidecar {
            filename: item.file_name.clone(),
            source,
        })?;
        self.inner.enqueue(item)
    }
}

/// Replaces characters that are invalid in file names with spaces and collapses runs of
/// spaces.
pub fn sanitize_file_name(file_name: &str) -> String {
    let replaced: String = file_name
        .chars()
        .map(|character| match character {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => ' ',
            other => other,
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<&str>>().join(" ")
}
