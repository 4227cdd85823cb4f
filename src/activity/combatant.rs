use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deaths are logged a little after they happen on screen.
pub const DEATH_TIMESTAMP_OFFSET_MS: i64 = 2_000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Combatant {
    #[serde(rename = "_GUID")]
    pub guid: String,
    #[serde(rename = "_teamID", skip_serializing_if = "Option::is_none")]
    pub team_id: Option<u32>,
    #[serde(rename = "_specID", skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<u32>,
    #[serde(rename = "_name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "_realm", skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(rename = "_region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Combatant {
    pub fn new(guid: impl Into<String>, team_id: Option<u32>, spec_id: Option<u32>) -> Self {
        Self {
            guid: guid.into(),
            team_id,
            spec_id,
            ..Self::default()
        }
    }

    /// Fills attributes this combatant does not know yet from a later sighting.
    fn merge(&mut self, other: Combatant) {
        if other.team_id.is_some() {
            self.team_id = other.team_id;
        }
        if other.spec_id.is_some() {
            self.spec_id = other.spec_id;
        }
        if other.name.is_some() {
            self.name = other.name;
        }
        if other.realm.is_some() {
            self.realm = other.realm;
        }
        if other.region.is_some() {
            self.region = other.region;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CombatantRegistry {
    combatants: BTreeMap<String, Combatant>,
}

impl CombatantRegistry {
    pub fn get(&self, guid: &str) -> Option<&Combatant> {
        self.combatants.get(guid)
    }

    pub fn get_mut(&mut self, guid: &str) -> Option<&mut Combatant> {
        self.combatants.get_mut(guid)
    }

    pub fn upsert(&mut self, combatant: Combatant) {
        match self.combatants.get_mut(&combatant.guid) {
            Some(existing) => existing.merge(combatant),
            None => {
                self.combatants.insert(combatant.guid.clone(), combatant);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDeath {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec_id: Option<u32>,
    pub date: DateTime<Utc>,
    /// Seconds since the owning activity started, never negative.
    pub timestamp: f64,
    pub friendly: bool,
}

impl PlayerDeath {
    pub fn new(
        name: impl Into<String>,
        spec_id: Option<u32>,
        date: DateTime<Utc>,
        activity_start: DateTime<Utc>,
        friendly: bool,
    ) -> Self {
        let offset_ms = (date - activity_start).num_milliseconds() - DEATH_TIMESTAMP_OFFSET_MS;
        let timestamp = (offset_ms.max(0) as f64) / 1000.0;

        Self {
            name: name.into(),
            spec_id,
            date,
            timestamp,
            friendly,
        }
    }
}
