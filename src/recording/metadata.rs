use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::activity::{
    Combatant, PlayerDeath, SegmentKind, ShuffleRoundSummary, TimelineSegment, VideoCategory,
};
use crate::error::MetadataError;

pub(crate) const METADATA_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegmentMetadata {
    pub segment_type: SegmentKind,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
}

impl From<&TimelineSegment> for TimelineSegmentMetadata {
    fn from(segment: &TimelineSegment) -> Self {
        Self {
            segment_type: segment.kind,
            timestamp: segment.timestamp,
            duration: segment
                .length_ms()
                .map(|length_ms| length_ms as f64 / 1000.0),
            encounter_id: segment.encounter_id,
            result: segment.result,
        }
    }
}

/// Snapshot of a finished activity, handed to the video queue alongside the buffer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub schema_version: u32,
    pub category: VideoCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keystone_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affixes: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub challenge_mode_timeline: Vec<TimelineSegmentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solo_shuffle_rounds_won: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solo_shuffle_rounds_played: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solo_shuffle_timeline: Vec<ShuffleRoundSummary>,
    pub duration: f64,
    pub result: bool,
    pub overrun: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deaths: Vec<PlayerDeath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<Combatant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combatants: Vec<Combatant>,
    /// Activity start as unix milliseconds.
    pub start: i64,
}

impl Metadata {
    pub(crate) fn new(
        category: VideoCategory,
        start_date: DateTime<Utc>,
        duration: f64,
        result: bool,
        overrun: u64,
    ) -> Self {
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            category,
            zone_id: None,
            zone_name: None,
            encounter_id: None,
            encounter_name: None,
            difficulty_id: None,
            difficulty: None,
            map_id: None,
            keystone_level: None,
            upgrade_level: None,
            affixes: Vec::new(),
            challenge_mode_timeline: Vec::new(),
            solo_shuffle_rounds_won: None,
            solo_shuffle_rounds_played: None,
            solo_shuffle_timeline: Vec::new(),
            duration,
            result,
            overrun,
            deaths: Vec::new(),
            player: None,
            combatants: Vec::new(),
            start: start_date.timestamp_millis(),
        }
    }
}

pub fn metadata_sidecar_path(video_path: &Path) -> PathBuf {
    video_path.with_extension("meta.json")
}

pub fn read_metadata(video_path: &Path) -> Result<Option<Metadata>, MetadataError> {
    let sidecar_path = metadata_sidecar_path(video_path);
    let raw_json = match std::fs::read_to_string(&sidecar_path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(MetadataError::Read {
                path: sidecar_path,
                source,
            });
        }
    };

    let metadata = serde_json::from_str::<Metadata>(&raw_json).map_err(|source| {
        MetadataError::Parse {
            path: sidecar_path.clone(),
            source,
        }
    })?;

    Ok(Some(metadata))
}

/// Writes the sidecar through a temporary file so readers never see a partial document.
pub fn write_metadata(video_path: &Path, metadata: &Metadata) -> Result<PathBuf, MetadataError> {
    let sidecar_path = metadata_sidecar_path(video_path);
    if let Some(parent_directory) = sidecar_path.parent() {
        std::fs::create_dir_all(parent_directory).map_err(|source| MetadataError::Write {
            path: parent_directory.to_path_buf(),
            source,
        })?;
    }

    let temp_path = temporary_sidecar_path(&sidecar_path);
    let serialized = serde_json::to_string_pretty(metadata).map_err(MetadataError::Serialize)?;

    std::fs::write(&temp_path, serialized).map_err(|source| MetadataError::Write {
        path: temp_path.clone(),
        source,
    })?;

    if let Err(source) = std::fs::rename(&temp_path, &sidecar_path) {
        if let Err(cleanup_error) = std::fs::remove_file(&temp_path) {
            tracing::warn!(
                path = %temp_path.display(),
                "Failed to remove temporary video metadata: {cleanup_error}"
            );
        }
        return Err(MetadataError::Write {
            path: sidecar_path,
            source,
        });
    }

    Ok(sidecar_path)
}

fn temporary_sidecar_path(sidecar_path: &Path) -> PathBuf {
    let Some(file_name) = sidecar_path.file_name().and_then(|value| value.to_str()) else {
        return sidecar_path.with_extension("meta.json.tmp");
    };

    sidecar_path.with_file_name(format!("{file_name}.tmp"))
}
