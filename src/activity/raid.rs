use crate::error::ActivityError;
use crate::game_data::{instance_difficulty, raid_encounter};

#[derive(Debug, Clone)]
pub struct RaidEncounter {
    pub encounter_id: Option<u32>,
    pub difficulty_id: u32,
}

impl RaidEncounter {
    pub fn new(encounter_id: u32, difficulty_id: u32) -> Self {
        Self {
            encounter_id: Some(encounter_id),
            difficulty_id,
        }
    }

    fn lookup(&self) -> Result<(&'static str, &'static str), ActivityError> {
        let encounter_id = self.encounter_id.ok_or(ActivityError::MissingEncounterId)?;
        raid_encounter(encounter_id).ok_or(ActivityError::UnknownEncounter(encounter_id))
    }

    pub fn raid_name(&self) -> Result<&'static str, ActivityError> {
        self.lookup().map(|(raid_name, _)| raid_name)
    }

    pub fn encounter_name(&self) -> Result<&'static str, ActivityError> {
        self.lookup().map(|(_, encounter_name)| encounter_name)
    }

    pub fn difficulty_label(&self) -> Option<&'static str> {
        instance_difficulty(self.difficulty_id).map(|difficulty| difficulty.label)
    }
}

pub(crate) fn raid_result_info(result: bool) -> &'static str {
    if result {
        "Kill"
    } else {
        "Wipe"
    }
}
