use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::activity::VideoCategory;
use crate::error::SettingsError;
use crate::game_data::RaidDifficulty;
use crate::recording::{BUFFER_RESTART_INTERVAL, ENCODER_SETTLE_DELAY, WROTE_FILE_TIMEOUT};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecorderSettings {
    pub buffer_directory: PathBuf,
    pub data_timeout_ms: u64,
    pub process_poll_ms: u64,
    pub buffer_restart_interval_secs: u64,
    pub settle_delay_secs: u64,
    pub stop_ack_timeout_secs: u64,
    pub buffer_files_to_keep: usize,
    pub min_keystone_level: u32,
    pub min_encounter_duration_secs: u64,
    pub raid_overrun_secs: u64,
    pub dungeon_overrun_secs: u64,
    #[serde(rename = "record2v2")]
    pub record_two_v_two: bool,
    #[serde(rename = "record3v3")]
    pub record_three_v_three: bool,
    pub record_skirmish: bool,
    pub record_solo_shuffle: bool,
    pub record_mythic_plus: bool,
    pub record_raids: bool,
    pub record_battlegrounds: bool,
    pub min_raid_difficulty: RaidDifficulty,
    pub record_current_raid_encounters_only: bool,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            buffer_directory: default_buffer_directory(),
            data_timeout_ms: 120_000,
            process_poll_ms: 5_000,
            buffer_restart_interval_secs: BUFFER_RESTART_INTERVAL.as_secs(),
            settle_delay_secs: ENCODER_SETTLE_DELAY.as_secs(),
            stop_ack_timeout_secs: WROTE_FILE_TIMEOUT.as_secs(),
            buffer_files_to_keep: 1,
            min_keystone_level: 2,
            min_encounter_duration_secs: 15,
            raid_overrun_secs: 15,
            dungeon_overrun_secs: 5,
            record_two_v_two: true,
            record_three_v_three: true,
            record_skirmish: true,
            record_solo_shuffle: true,
            record_mythic_plus: true,
            record_raids: true,
            record_battlegrounds: true,
            min_raid_difficulty: RaidDifficulty::Lfr,
            record_current_raid_encounters_only: false,
        }
    }
}

impl RecorderSettings {
    pub fn allows_category(&self, category: VideoCategory) -> bool {
        match category {
            VideoCategory::TwoVTwo => self.record_two_v_two,
            VideoCategory::ThreeVThree => self.record_three_v_three,
            VideoCategory::Skirmish => self.record_skirmish,
            VideoCategory::SoloShuffle => self.record_solo_shuffle,
            VideoCategory::MythicPlus => self.record_mythic_plus,
            VideoCategory::Raids => self.record_raids,
            VideoCategory::Battlegrounds => self.record_battlegrounds,
            VideoCategory::Manual => true,
        }
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    pub fn process_poll_interval(&self) -> Duration {
        Duration::from_millis(self.process_poll_ms)
    }

    pub fn buffer_restart_interval(&self) -> Duration {
        Duration::from_secs(self.buffer_restart_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn stop_ack_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_ack_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.buffer_restart_interval_secs == 0 {
            return Err(SettingsError::Invalid(
                "bufferRestartIntervalSecs must be greater than zero".to_string(),
            ));
        }
        if self.stop_ack_timeout_secs == 0 {
            return Err(SettingsError::Invalid(
                "stopAckTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        if self.buffer_files_to_keep == 0 {
            return Err(SettingsError::Invalid(
                "bufferFilesToKeep must keep at least one file".to_string(),
            ));
        }

        Ok(())
    }
}

fn default_buffer_directory() -> PathBuf {
    std::env::temp_dir().join("combat-recorder").join("buffer")
}

/// Loads settings from a JSON file, falling back to defaults when the file does not exist.
pub fn load_settings(path: &Path) -> Result<RecorderSettings, SettingsError> {
    let raw_json = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(RecorderSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let settings = serde_json::from_str::<RecorderSettings>(&raw_json).map_err(|source| {
        SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    settings.validate()?;

    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &RecorderSettings) -> Result<(), SettingsError> {
    let write_error = |reason: String| SettingsError::Write {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent_directory) = path.parent() {
        std::fs::create_dir_all(parent_directory)
            .map_err(|error| write_error(format!("failed to create directory: {error}")))?;
    }

    let serialized = serde_json::to_string_pretty(settings)
        .map_err(|error| write_error(format!("failed to serialize: {error}")))?;
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, serialized)
        .map_err(|error| write_error(format!("failed to write temporary file: {error}")))?;

    if let Err(error) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(write_error(format!("failed to finalize: {error}")));
    }

    Ok(())
}
