use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a derived activity field. Scoped to the query that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("Activity has no end date yet")]
    MissingEndDate,
    #[error("Activity has no player set")]
    PlayerNotSet,
    #[error("Player '{0}' is not in the combatant registry")]
    PlayerNotFound(String),
    #[error("Player has no team id")]
    UnknownTeam,
    #[error("Raid encounter has no encounter id")]
    MissingEncounterId,
    #[error("No raid found for encounter id {0}")]
    UnknownEncounter(u32),
    #[error("No keystone timer table for map id {0}")]
    NoTimerTable(u32),
    #[error("Activity result has not been determined yet")]
    ResultNotSet,
    #[error("Solo shuffle has no current round")]
    NoCurrentRound,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Capture engine failed to start: {0}")]
    EngineStart(String),
    #[error("Capture engine failed to stop: {0}")]
    EngineStop(String),
    #[error("Capture engine did not report a written file within {0:?}")]
    WroteTimeout(Duration),
    #[error("Capture engine signal channel closed")]
    EngineSignalsClosed,
    #[error("Shutdown requested while waiting for the capture engine")]
    ShutdownRequested,
    #[error("Failed to queue video '{filename}': {reason}")]
    Queue { filename: String, reason: String },
    #[error("Failed to clean buffer directory '{}': {source}", path.display())]
    BufferCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to compute activity metadata: {0}")]
    Metadata(#[from] ActivityError),
    #[error("Failed to write metadata sidecar for '{filename}': {source}")]
    Sidecar {
        filename: String,
        #[source]
        source: MetadataError,
    },
}

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read video metadata '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse video metadata '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize video metadata: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("Failed to write video metadata '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse settings '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to write settings '{}': {reason}", path.display())]
    Write { path: PathBuf, reason: String },
    #[error("Invalid settings: {0}")]
    Invalid(String),
}
