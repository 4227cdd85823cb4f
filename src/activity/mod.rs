mod arena;
mod battleground;
mod challenge_mode;
mod combatant;
mod raid;
mod solo_shuffle;
mod timeline;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ActivityError;
use crate::recording::metadata::{Metadata, TimelineSegmentMetadata};

pub use arena::ARENA_OVERRUN_SECS;
pub use battleground::BATTLEGROUND_OVERRUN_SECS;
pub use challenge_mode::{keystone_upgrade_level, ChallengeModeRun};
pub use combatant::{Combatant, CombatantRegistry, PlayerDeath, DEATH_TIMESTAMP_OFFSET_MS};
pub use raid::RaidEncounter;
pub use solo_shuffle::{
    ShuffleRoundSummary, SoloShuffle, SOLO_SHUFFLE_OVERRUN_SECS, SOLO_SHUFFLE_ROUNDS,
};
pub use timeline::{ChallengeModeTimeline, SegmentKind, TimelineSegment, MIN_SEGMENT_LENGTH_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCategory {
    #[serde(rename = "2v2")]
    TwoVTwo,
    #[serde(rename = "3v3")]
    ThreeVThree,
    Skirmish,
    #[serde(rename = "Solo Shuffle")]
    SoloShuffle,
    #[serde(rename = "Mythic+")]
    MythicPlus,
    Raids,
    Battlegrounds,
    Manual,
}

impl VideoCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::TwoVTwo => "2v2",
            Self::ThreeVThree => "3v3",
            Self::Skirmish => "Skirmish",
            Self::SoloShuffle => "Solo Shuffle",
            Self::MythicPlus => "Mythic+",
            Self::Raids => "Raids",
            Self::Battlegrounds => "Battlegrounds",
            Self::Manual => "Manual",
        }
    }

    /// Maps the arena type text of a match start line. 5v5 is filed with 3v3.
    pub fn from_arena_type(arena_type: &str) -> Option<Self> {
        match arena_type.trim().trim_matches('"') {
            "Rated Solo Shuffle" => Some(Self::SoloShuffle),
            "2v2" => Some(Self::TwoVTwo),
            "3v3" | "5v5" => Some(Self::ThreeVThree),
            "Skirmish" => Some(Self::Skirmish),
            _ => None,
        }
    }

    pub fn is_arena(self) -> bool {
        matches!(
            self,
            Self::TwoVTwo | Self::ThreeVThree | Self::Skirmish | Self::SoloShuffle
        )
    }
}

impl fmt::Display for VideoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields shared by every activity and by each solo shuffle round.
#[derive(Debug, Clone)]
pub struct ActivityCore {
    pub category: VideoCategory,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub result: bool,
    pub combatants: CombatantRegistry,
    pub deaths: Vec<PlayerDeath>,
    pub overrun: u64,
    pub zone_id: Option<u32>,
    pub player_guid: Option<String>,
}

impl ActivityCore {
    pub fn new(category: VideoCategory, start_date: DateTime<Utc>) -> Self {
        Self {
            category,
            start_date,
            end_date: None,
            result: false,
            combatants: CombatantRegistry::default(),
            deaths: Vec::new(),
            overrun: 0,
            zone_id: None,
            player_guid: None,
        }
    }

    pub fn end(&mut self, end_date: DateTime<Utc>, result: bool) {
        self.end_date = Some(end_date);
        self.result = result;
    }

    /// `(end - start) / 1000 + overrun`, in seconds.
    pub fn duration_secs(&self) -> Result<f64, ActivityError> {
        let end_date = self.end_date.ok_or(ActivityError::MissingEndDate)?;
        let elapsed_ms = (end_date - self.start_date).num_milliseconds();
        Ok(elapsed_ms as f64 / 1000.0 + self.overrun as f64)
    }

    pub fn player(&self) -> Result<&Combatant, ActivityError> {
        let guid = self
            .player_guid
            .as_deref()
            .ok_or(ActivityError::PlayerNotSet)?;
        self.combatants
            .get(guid)
            .ok_or_else(|| ActivityError::PlayerNotFound(guid.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum ActivityKind {
    Arena,
    ChallengeMode(ChallengeModeRun),
    Raid(RaidEncounter),
    SoloShuffle(SoloShuffle),
    Battleground,
    Manual,
}

#[derive(Debug, Clone)]
pub struct Activity {
    core: ActivityCore,
    kind: ActivityKind,
}

impl Activity {
    pub fn arena(category: VideoCategory, zone_id: u32, start_date: DateTime<Utc>) -> Self {
        let mut core = ActivityCore::new(category, start_date);
        core.zone_id = Some(zone_id);
        core.overrun = ARENA_OVERRUN_SECS;
        Self {
            core,
            kind: ActivityKind::Arena,
        }
    }

    pub fn solo_shuffle(zone_id: u32, start_date: DateTime<Utc>) -> Self {
        let mut core = ActivityCore::new(VideoCategory::SoloShuffle, start_date);
        core.zone_id = Some(zone_id);
        core.overrun = SOLO_SHUFFLE_OVERRUN_SECS;
        Self {
            core,
            kind: ActivityKind::SoloShuffle(SoloShuffle::new(start_date, zone_id)),
        }
    }

    pub fn keystone(
        zone_id: u32,
        map_id: u32,
        level: u32,
        affixes: Vec<u32>,
        start_date: DateTime<Utc>,
    ) -> Self {
        let mut core = ActivityCore::new(VideoCategory::MythicPlus, start_date);
        core.zone_id = Some(zone_id);
        Self {
            core,
            kind: ActivityKind::ChallengeMode(ChallengeModeRun::new(
                map_id, level, affixes, start_date,
            )),
        }
    }

    pub fn raid(encounter_id: u32, difficulty_id: u32, start_date: DateTime<Utc>) -> Self {
        let mut core = ActivityCore::new(VideoCategory::Raids, start_date);
        core.zone_id = crate::game_data::raid_zone_id(encounter_id);
        Self {
            core,
            kind: ActivityKind::Raid(RaidEncounter::new(encounter_id, difficulty_id)),
        }
    }

    pub fn battleground(zone_id: u32, start_date: DateTime<Utc>) -> Self {
        let mut core = ActivityCore::new(VideoCategory::Battlegrounds, start_date);
        core.zone_id = Some(zone_id);
        core.overrun = BATTLEGROUND_OVERRUN_SECS;
        Self {
            core,
            kind: ActivityKind::Battleground,
        }
    }

    pub fn manual(start_date: DateTime<Utc>) -> Self {
        Self {
            core: ActivityCore::new(VideoCategory::Manual, start_date),
            kind: ActivityKind::Manual,
        }
    }

    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    pub fn core(&self) -> &ActivityCore {
        &self.core
    }

    pub fn category(&self) -> VideoCategory {
        self.core.category
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.core.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.core.end_date
    }

    pub fn result(&self) -> bool {
        self.core.result
    }

    pub fn overrun(&self) -> u64 {
        self.core.overrun
    }

    pub fn set_overrun(&mut self, overrun: u64) {
        self.core.overrun = overrun;
    }

    pub fn zone_id(&self) -> Option<u32> {
        self.core.zone_id
    }

    pub fn duration_secs(&self) -> Result<f64, ActivityError> {
        self.core.duration_secs()
    }

    pub fn challenge_mode(&self) -> Option<&ChallengeModeRun> {
        match &self.kind {
            ActivityKind::ChallengeMode(run) => Some(run),
            _ => None,
        }
    }

    pub fn challenge_mode_mut(&mut self) -> Option<&mut ChallengeModeRun> {
        match &mut self.kind {
            ActivityKind::ChallengeMode(run) => Some(run),
            _ => None,
        }
    }

    pub fn solo_shuffle_mut(&mut self) -> Option<&mut SoloShuffle> {
        match &mut self.kind {
            ActivityKind::SoloShuffle(shuffle) => Some(shuffle),
            _ => None,
        }
    }

    /// The record holding roster, player and per-round deaths: the current round for a
    /// solo shuffle, the activity itself otherwise.
    fn roster(&self) -> &ActivityCore {
        let Activity { core, kind } = self;
        match kind {
            ActivityKind::SoloShuffle(shuffle) => shuffle.current_round().unwrap_or(core),
            _ => core,
        }
    }

    fn roster_mut(&mut self) -> &mut ActivityCore {
        let Activity { core, kind } = self;
        match kind {
            ActivityKind::SoloShuffle(shuffle) => shuffle.current_round_mut().unwrap_or(core),
            _ => core,
        }
    }

    pub fn combatants(&self) -> &CombatantRegistry {
        &self.roster().combatants
    }

    pub fn combatant(&self, guid: &str) -> Option<&Combatant> {
        self.roster().combatants.get(guid)
    }

    pub fn combatant_mut(&mut self, guid: &str) -> Option<&mut Combatant> {
        self.roster_mut().combatants.get_mut(guid)
    }

    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.roster_mut().combatants.upsert(combatant);
    }

    pub fn player_guid(&self) -> Option<&str> {
        self.roster().player_guid.as_deref()
    }

    pub fn set_player_guid(&mut self, guid: impl Into<String>) {
        self.roster_mut().player_guid = Some(guid.into());
    }

    pub fn player(&self) -> Result<&Combatant, ActivityError> {
        self.roster().player()
    }

    pub fn deaths(&self) -> &[PlayerDeath] {
        &self.core.deaths
    }

    pub fn add_death(&mut self, death: PlayerDeath) -> Result<(), ActivityError> {
        let Activity { core, kind } = self;
        if let ActivityKind::SoloShuffle(shuffle) = kind {
            if !shuffle.add_death(&death)? {
                return Ok(());
            }
        }

        core.deaths.push(death);
        Ok(())
    }

    pub fn end(&mut self, end_date: DateTime<Utc>, result: bool) {
        self.core.end(end_date, result);
    }

    /// Ends an arena from the reported winning team.
    pub fn end_arena(&mut self, end_date: DateTime<Utc>, winning_team_id: u32) {
        let result = arena::determine_arena_result(&self.core, winning_team_id);
        self.core.end(end_date, result);
    }

    /// Ends the activity without a clean end event: closes any open segment, drops the
    /// overrun and keeps the result as a loss.
    pub fn force_end(&mut self, end_date: DateTime<Utc>) {
        if let ActivityKind::ChallengeMode(run) = &mut self.kind {
            run.timeline.close_current(end_date);
        }
        self.core.overrun = 0;
        let end_date = self.core.end_date.unwrap_or(end_date);
        self.core.end(end_date, false);
    }

    pub fn result_info(&self) -> Result<String, ActivityError> {
        if self.core.end_date.is_none() {
            return Err(ActivityError::ResultNotSet);
        }

        let result = self.core.result;
        match &self.kind {
            ActivityKind::Arena => Ok(arena::arena_result_info(result).to_string()),
            ActivityKind::ChallengeMode(run) => run.result_info(result),
            ActivityKind::Raid(_) => Ok(raid::raid_result_info(result).to_string()),
            ActivityKind::SoloShuffle(shuffle) => Ok(shuffle.result_info()),
            ActivityKind::Battleground | ActivityKind::Manual => {
                Ok(if result { "Win" } else { "Loss" }.to_string())
            }
        }
    }

    pub fn file_name(&self) -> Result<String, ActivityError> {
        let file_name = match &self.kind {
            ActivityKind::Arena => format!(
                "{} {} ({})",
                self.core.category,
                arena::arena_zone_name(self.core.zone_id),
                self.result_info()?
            ),
            ActivityKind::ChallengeMode(run) => self.with_player_prefix(format!(
                "{} +{} ({})",
                run.dungeon_name(),
                run.level,
                self.result_info()?
            )),
            ActivityKind::Raid(raid) => format!(
                "{}, {} ({})",
                raid.raid_name()?,
                raid.encounter_name()?,
                self.result_info()?
            ),
            ActivityKind::SoloShuffle(shuffle) => self.with_player_prefix(format!(
                "{} {} ({})",
                self.core.category,
                arena::arena_zone_name(self.core.zone_id),
                shuffle.result_info()
            )),
            ActivityKind::Battleground => {
                battleground::battleground_display_name(self.core.zone_id)
            }
            ActivityKind::Manual => "Manual".to_string(),
        };

        Ok(file_name)
    }

    fn with_player_prefix(&self, file_name: String) -> String {
        match self.player().ok().and_then(|player| player.name.as_deref()) {
            Some(name) => format!("{name} - {file_name}"),
            None => file_name,
        }
    }

    /// Unset player degrades to `None`; a player id missing from the roster is an error.
    fn player_snapshot(&self) -> Result<Option<Combatant>, ActivityError> {
        match self.roster().player() {
            Ok(player) => Ok(Some(player.clone())),
            Err(ActivityError::PlayerNotSet) => {
                tracing::warn!(category = %self.core.category, "No player set for activity metadata");
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    pub fn metadata(&self) -> Result<Metadata, ActivityError> {
        let mut metadata = Metadata::new(
            self.core.category,
            self.core.start_date,
            self.duration_secs()?,
            self.core.result,
            self.core.overrun,
        );
        metadata.zone_id = self.core.zone_id;
        metadata.deaths = self.core.deaths.clone();

        match &self.kind {
            ActivityKind::Arena => {
                metadata.zone_name = Some(arena::arena_zone_name(self.core.zone_id));
            }
            ActivityKind::ChallengeMode(run) => {
                metadata.zone_name = Some(run.dungeon_name().to_string());
                metadata.map_id = Some(run.map_id);
                metadata.keystone_level = Some(run.level);
                metadata.upgrade_level = Some(run.upgrade_level()?);
                metadata.affixes = run.affixes.clone();
                metadata.challenge_mode_timeline = run
                    .timeline
                    .segments()
                    .iter()
                    .map(TimelineSegmentMetadata::from)
                    .collect();
            }
            ActivityKind::Raid(raid) => {
                metadata.zone_name = Some(raid.raid_name()?.to_string());
                metadata.encounter_id = raid.encounter_id;
                metadata.encounter_name = Some(raid.encounter_name()?.to_string());
                metadata.difficulty_id = Some(raid.difficulty_id);
                metadata.difficulty = raid.difficulty_label().map(str::to_string);
            }
            ActivityKind::SoloShuffle(shuffle) => {
                metadata.zone_name = Some(arena::arena_zone_name(self.core.zone_id));
                metadata.solo_shuffle_rounds_won = Some(shuffle.rounds_won());
                metadata.solo_shuffle_rounds_played = Some(shuffle.rounds().len());
                metadata.solo_shuffle_timeline = shuffle.round_summaries(self.core.start_date);
            }
            ActivityKind::Battleground => {
                metadata.zone_name = Some(battleground::battleground_display_name(
                    self.core.zone_id,
                ));
            }
            ActivityKind::Manual => return Ok(metadata),
        }

        metadata.player = self.player_snapshot()?;
        metadata.combatants = self.combatants().values().cloned().collect();

        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::{Activity, Combatant, PlayerDeath, VideoCategory};
    use crate::error::ActivityError;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 22, 20, 0, 0)
            .single()
            .expect("Expected a valid test timestamp")
    }

    fn named_player(guid: &str, team_id: u32, name: &str) -> Combatant {
        let mut combatant = Combatant::new(guid, Some(team_id), Some(65));
        combatant.name = Some(name.to_string());
        combatant.realm = Some("Draenor".to_string());
        combatant
    }

    #[test]
    fn duration_is_elapsed_seconds_plus_overrun() {
        for (elapsed_ms, overrun) in [(0, 0), (1_500, 3), (90_000, 15), (3_600_250, 5)] {
            let mut activity = Activity::manual(start());
            assert_eq!(activity.duration_secs(), Err(ActivityError::MissingEndDate));

            activity.set_overrun(overrun);
            activity.end(start() + Duration::milliseconds(elapsed_ms), true);
            let expected = elapsed_ms as f64 / 1000.0 + overrun as f64;
            assert_eq!(activity.duration_secs(), Ok(expected));
            assert_eq!(activity.duration_secs(), Ok(expected));
        }
    }

    #[test]
    fn maps_arena_type_text_to_categories() {
        assert_eq!(
            VideoCategory::from_arena_type("Rated Solo Shuffle"),
            Some(VideoCategory::SoloShuffle)
        );
        assert_eq!(
            VideoCategory::from_arena_type("5v5"),
            Some(VideoCategory::ThreeVThree)
        );
        assert_eq!(VideoCategory::from_arena_type("Brawl"), None);
        assert!(VideoCategory::Skirmish.is_arena());
        assert!(!VideoCategory::Battlegrounds.is_arena());
    }

    #[test]
    fn arena_win_and_file_name() {
        let mut activity = Activity::arena(VideoCategory::TwoVTwo, 1672, start());
        activity.add_combatant(named_player("Player-1", 0, "Alice"));
        activity.set_player_guid("Player-1");
        activity.end_arena(start() + Duration::seconds(180), 0);

        assert!(activity.result());
        assert_eq!(
            activity.file_name(),
            Ok("2v2 Blade's Edge (Win)".to_string())
        );

        let metadata = activity.metadata().expect("Expected arena metadata");
        assert_eq!(metadata.duration, 183.0);
        assert_eq!(metadata.zone_name.as_deref(), Some("Blade's Edge"));
        assert_eq!(
            metadata.player.map(|player| player.guid),
            Some("Player-1".to_string())
        );
    }

    #[test]
    fn raid_result_info_requires_an_end() {
        let mut activity = Activity::raid(2922, 16, start());
        assert_eq!(activity.result_info(), Err(ActivityError::ResultNotSet));

        activity.end(start() + Duration::seconds(400), false);
        assert_eq!(
            activity.file_name(),
            Ok("Nerub-ar Palace, Queen Ansurek (Wipe)".to_string())
        );
        assert_eq!(activity.zone_id(), Some(2657));
    }

    #[test]
    fn unknown_raid_fails_metadata_but_not_duration() {
        let mut activity = Activity::raid(1, 14, start());
        activity.end(start() + Duration::seconds(60), true);

        assert_eq!(activity.duration_secs(), Ok(60.0));
        assert_eq!(
            activity.metadata().map(|_| ()),
            Err(ActivityError::UnknownEncounter(1))
        );
    }

    #[test]
    fn player_set_but_missing_from_roster_fails_metadata() {
        let mut activity = Activity::arena(VideoCategory::ThreeVThree, 980, start());
        activity.set_player_guid("Player-404");
        activity.end(start() + Duration::seconds(30), false);

        assert_eq!(
            activity.metadata().map(|_| ()),
            Err(ActivityError::PlayerNotFound("Player-404".to_string()))
        );
    }

    #[test]
    fn unset_player_degrades_to_empty_metadata_field() {
        let mut activity = Activity::battleground(489, start());
        activity.end(start() + Duration::seconds(600), false);

        let metadata = activity.metadata().expect("Expected battleground metadata");
        assert!(metadata.player.is_none());
        assert_eq!(activity.file_name(), Ok("Warsong Gulch".to_string()));
    }

    #[test]
    fn challenge_mode_file_name_carries_player_and_tier() {
        let mut activity = Activity::keystone(2652, 501, 12, vec![9, 152], start());
        activity.add_combatant(named_player("Player-1", 0, "Alice"));
        activity.set_player_guid("Player-1");
        if let Some(run) = activity.challenge_mode_mut() {
            run.completion_secs = 1_500;
        }
        activity.end(start() + Duration::seconds(1_500), true);

        assert_eq!(
            activity.file_name(),
            Ok("Alice - The Stonevault +12 (+2)".to_string())
        );
    }

    #[test]
    fn shuffle_deaths_are_visible_on_the_composite() {
        let mut activity = Activity::solo_shuffle(1505, start());
        activity.add_combatant(named_player("Player-1", 0, "Alice"));
        activity.set_player_guid("Player-1");

        let death = PlayerDeath::new("Foe", None, start() + Duration::seconds(50), start(), false);
        activity.add_death(death).expect("Expected death to be recorded");

        assert_eq!(activity.deaths().len(), 1);
        activity.end(start() + Duration::seconds(60), true);
        assert_eq!(
            activity.file_name(),
            Ok("Alice - Solo Shuffle Nagrand (1-0)".to_string())
        );
    }

    #[test]
    fn force_end_drops_overrun_and_closes_segment() {
        let mut activity = Activity::keystone(2652, 501, 10, Vec::new(), start());
        activity.force_end(start() + Duration::seconds(300));

        assert_eq!(activity.overrun(), 0);
        assert!(!activity.result());
        let run = activity.challenge_mode().expect("Expected a challenge mode run");
        assert_eq!(run.timeline.open_count(), 0);
        assert_eq!(activity.result_info(), Ok("Abandoned".to_string()));
    }
}
