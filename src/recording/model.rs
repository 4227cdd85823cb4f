use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use super::metadata::Metadata;

pub(crate) const BUFFER_RESTART_INTERVAL: Duration = Duration::from_secs(300);
pub(crate) const ENCODER_SETTLE_DELAY: Duration = Duration::from_secs(5);
pub(crate) const WROTE_FILE_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const BUFFER_FILE_EXTENSIONS: &[&str] = &["mp4", "mkv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncoderState {
    Offline,
    Starting,
    Recording,
    Stopping,
}

/// Acknowledgements from the capture engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    Started,
    Stopped,
    WroteFile(PathBuf),
}

pub type EngineSignalSender = mpsc::UnboundedSender<EngineSignal>;
pub type EngineSignalReceiver = mpsc::UnboundedReceiver<EngineSignal>;

pub fn engine_signal_channel() -> (EngineSignalSender, EngineSignalReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    BufferRestart,
    BufferResume,
}

/// Fired by a coordinator timer task. Stale generations are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerEvent {
    pub(crate) kind: TimerKind,
    pub(crate) generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeMode {
    /// Clean end: trim from the activity start and apply duration filters.
    Normal,
    /// No clean end: keep the buffer from the start, skip filters.
    Forced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoQueueItem {
    pub buffer_file: PathBuf,
    pub metadata: Metadata,
    pub file_name: String,
    /// Seconds into the buffer file where the activity starts.
    pub relative_start: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecorderStatus {
    WaitingForGame,
    ReadyToRecord,
    Recording,
    SavingVideo,
}
