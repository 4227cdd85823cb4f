use chrono::{DateTime, Utc};

use crate::error::ActivityError;
use crate::game_data::{dungeon_name, keystone_timers};

use super::timeline::{ChallengeModeTimeline, TimelineSegment};

#[derive(Debug, Clone)]
pub struct ChallengeModeRun {
    pub map_id: u32,
    pub level: u32,
    pub affixes: Vec<u32>,
    pub timings: Option<&'static [u32]>,
    /// In-game completion time in seconds, 0 until the run ends successfully.
    pub completion_secs: u64,
    pub timeline: ChallengeModeTimeline,
}

impl ChallengeModeRun {
    pub fn new(map_id: u32, level: u32, affixes: Vec<u32>, start_date: DateTime<Utc>) -> Self {
        let mut timeline = ChallengeModeTimeline::default();
        timeline.push(TimelineSegment::trash(start_date, start_date));

        Self {
            map_id,
            level,
            affixes,
            timings: keystone_timers(map_id),
            completion_secs: 0,
            timeline,
        }
    }

    pub fn dungeon_name(&self) -> &'static str {
        dungeon_name(self.map_id).unwrap_or("Unknown Dungeon")
    }

    pub fn upgrade_level(&self) -> Result<u8, ActivityError> {
        let timings = self.timings.ok_or(ActivityError::NoTimerTable(self.map_id))?;
        Ok(keystone_upgrade_level(timings, self.completion_secs))
    }

    pub fn result_info(&self, result: bool) -> Result<String, ActivityError> {
        if !result {
            return Ok("Abandoned".to_string());
        }

        Ok(format!("+{}", self.upgrade_level()?))
    }
}

/// Scans deadlines from the highest index down; the first one the duration fits within
/// gives tier `index + 1`. A zero duration never finished and is tier 0.
pub fn keystone_upgrade_level(timings: &[u32], completion_secs: u64) -> u8 {
    if completion_secs == 0 {
        return 0;
    }

    for index in (0..timings.len()).rev() {
        if completion_secs <= u64::from(timings[index]) {
            return u8::try_from(index + 1).unwrap_or(u8::MAX);
        }
    }

    0
}
