use chrono::{DateTime, Duration, Utc};

use crate::activity::{Activity, ActivityKind, Combatant, PlayerDeath, TimelineSegment, VideoCategory};
use crate::combat_log::{
    is_unit_friendly, is_unit_player, is_unit_self, split_player_name, LogEventType, LogLine,
    NULL_GUID,
};
use crate::game_data::{
    dungeon_name, instance_difficulty, is_battleground_zone, is_current_raid_encounter,
    keystone_timers, raid_difficulty, PartyType,
};
use crate::settings::RecorderSettings;

/// What the recording side has to do after the dispatcher handled an input.
#[derive(Debug)]
pub enum DispatchAction {
    /// An activity was opened; promote the running buffer.
    StartRecording,
    /// An activity ended cleanly.
    StopRecording(Box<Activity>),
    /// An activity ended without a clean end event; keep the whole buffer.
    ForceStop(Box<Activity>),
}

/// Turns the ordered stream of log lines and process signals into activity lifecycle
/// actions. Owns the single open activity; a keystone run is that activity while it lasts.
pub struct ActivityDispatcher {
    settings: RecorderSettings,
    activity: Option<Activity>,
    last_line_at: Option<DateTime<Utc>>,
}

impl ActivityDispatcher {
    pub fn new(settings: RecorderSettings) -> Self {
        Self {
            settings,
            activity: None,
            last_line_at: None,
        }
    }

    pub fn activity(&self) -> Option<&Activity> {
        self.activity.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.activity.is_some()
    }

    pub fn challenge_mode_open(&self) -> bool {
        self.activity
            .as_ref()
            .is_some_and(|activity| activity.challenge_mode().is_some())
    }

    /// Forgets the open activity, used when the recorder refused to promote.
    pub fn drop_activity(&mut self) {
        if let Some(activity) = self.activity.take() {
            tracing::warn!(
                category = %activity.category(),
                "Dropping activity because recording could not start"
            );
        }
    }

    pub fn handle_line(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        self.last_line_at = Some(line.timestamp);

        match line.event_type {
            LogEventType::ArenaMatchStart => self.handle_arena_match_start(line),
            LogEventType::ArenaMatchEnd => self.handle_arena_match_end(line),
            LogEventType::ChallengeModeStart => self.handle_challenge_mode_start(line),
            LogEventType::ChallengeModeEnd => self.handle_challenge_mode_end(line),
            LogEventType::EncounterStart => self.handle_encounter_start(line),
            LogEventType::EncounterEnd => self.handle_encounter_end(line),
            LogEventType::ZoneChange => self.handle_zone_change(line),
            LogEventType::CombatantInfo => {
                self.handle_combatant_info(line);
                Vec::new()
            }
            LogEventType::AuraApplied => {
                self.handle_aura_applied(line);
                Vec::new()
            }
            LogEventType::UnitDied => {
                self.handle_unit_died(line);
                Vec::new()
            }
        }
    }

    /// No log line for `elapsed`: close an open keystone run or battleground.
    pub fn handle_data_timeout(&mut self, elapsed: std::time::Duration) -> Vec<DispatchAction> {
        let Some(activity) = self.activity.as_ref() else {
            return Vec::new();
        };

        let times_out = activity.challenge_mode().is_some()
            || activity.category() == VideoCategory::Battlegrounds;
        if !times_out {
            return Vec::new();
        }

        let elapsed = Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero());
        let at = self
            .last_line_at
            .map(|last_line_at| last_line_at + elapsed)
            .unwrap_or_else(Utc::now);

        tracing::info!(
            category = %activity.category(),
            elapsed_ms = elapsed.num_milliseconds(),
            "Log went quiet, force stopping activity"
        );
        self.force_stop(at).into_iter().collect()
    }

    pub fn handle_process_stopped(&mut self) -> Vec<DispatchAction> {
        let at = self.last_line_at.unwrap_or_else(Utc::now);
        self.force_stop(at).into_iter().collect()
    }

    /// Toggles a manual recording. Ignored while another kind of activity is open.
    pub fn handle_manual_hotkey(&mut self, at: DateTime<Utc>) -> Vec<DispatchAction> {
        match self.activity.as_ref().map(Activity::kind) {
            None => self.start_activity(Activity::manual(at)),
            Some(ActivityKind::Manual) => {
                let Some(mut activity) = self.activity.take() else {
                    return Vec::new();
                };
                activity.end(at, false);
                tracing::info!("Stopping manual recording");
                vec![DispatchAction::StopRecording(Box::new(activity))]
            }
            Some(_) => {
                tracing::debug!("Ignoring manual hotkey during an activity");
                Vec::new()
            }
        }
    }

    fn start_activity(&mut self, activity: Activity) -> Vec<DispatchAction> {
        let category = activity.category();
        if !self.settings.allows_category(category) {
            tracing::debug!(category = %category, "Recording disabled for category");
            return Vec::new();
        }

        tracing::info!(
            category = %category,
            zone_id = ?activity.zone_id(),
            start = %activity.start_date(),
            "Starting activity"
        );
        self.activity = Some(activity);
        vec![DispatchAction::StartRecording]
    }

    fn stop_activity(&mut self) -> Option<DispatchAction> {
        let activity = self.activity.take()?;
        tracing::info!(
            category = %activity.category(),
            result = activity.result(),
            "Stopping activity"
        );
        Some(DispatchAction::StopRecording(Box::new(activity)))
    }

    fn force_stop(&mut self, at: DateTime<Utc>) -> Option<DispatchAction> {
        let mut activity = self.activity.take()?;
        activity.force_end(at);
        tracing::info!(category = %activity.category(), "Force stopping activity");
        Some(DispatchAction::ForceStop(Box::new(activity)))
    }

    fn handle_arena_match_start(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(zone_id) = line.arg_u32(1) else {
            tracing::debug!("Arena match start without zone id");
            return Vec::new();
        };
        let Some(category) = line.arg_str(3).and_then(VideoCategory::from_arena_type) else {
            tracing::debug!(arena_type = ?line.arg_str(3), "Unsupported arena type");
            return Vec::new();
        };

        if category == VideoCategory::SoloShuffle {
            if let Some(shuffle) = self.activity.as_mut().and_then(Activity::solo_shuffle_mut) {
                shuffle.start_round(line.timestamp, zone_id);
                return Vec::new();
            }
        }

        if let Some(activity) = &self.activity {
            tracing::debug!(
                current = %activity.category(),
                "Arena match start while already recording"
            );
            return Vec::new();
        }

        let activity = if category == VideoCategory::SoloShuffle {
            Activity::solo_shuffle(zone_id, line.timestamp)
        } else {
            Activity::arena(category, zone_id, line.timestamp)
        };
        self.start_activity(activity)
    }

    fn handle_arena_match_end(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(activity) = self.activity.as_mut() else {
            return Vec::new();
        };
        if !activity.category().is_arena() {
            tracing::debug!(current = %activity.category(), "Arena match end outside an arena");
            return Vec::new();
        }

        let is_shuffle = matches!(activity.kind(), ActivityKind::SoloShuffle(_));
        if is_shuffle {
            tracing::info!("Ending solo shuffle");
            activity.end(line.timestamp, true);
        } else {
            match line.arg_u32(1) {
                Some(winning_team_id) => activity.end_arena(line.timestamp, winning_team_id),
                None => {
                    tracing::warn!("Arena match end without winning team, treating as loss");
                    activity.end(line.timestamp, false);
                }
            }
        }

        self.stop_activity().into_iter().collect()
    }

    fn handle_challenge_mode_start(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let (Some(zone_id), Some(map_id), Some(level)) =
            (line.arg_u32(2), line.arg_u32(3), line.arg_u32(4))
        else {
            tracing::debug!("Challenge mode start with missing fields");
            return Vec::new();
        };

        let mut abandoned = None;
        match self.activity.as_ref().map(Activity::challenge_mode) {
            Some(Some(run)) => {
                tracing::warn!(
                    map_id = run.map_id,
                    level = run.level,
                    "New challenge mode started, abandoning the previous run"
                );
                abandoned = self.activity.take();
            }
            Some(None) => {
                tracing::debug!("Challenge mode start during another activity");
                return Vec::new();
            }
            None => {}
        }

        let actions = if level < self.settings.min_keystone_level {
            tracing::debug!(
                level,
                min_level = self.settings.min_keystone_level,
                "Keystone below minimum level"
            );
            Vec::new()
        } else if dungeon_name(map_id).is_none() || keystone_timers(map_id).is_none() {
            tracing::warn!(map_id, level, "Unknown keystone dungeon, not recording");
            Vec::new()
        } else {
            let affixes = line.arg_u32_list(5);
            self.start_activity(Activity::keystone(
                zone_id,
                map_id,
                level,
                affixes,
                line.timestamp,
            ))
        };

        // The buffer stays promoted for a replacing run; otherwise the abandoned one is kept.
        match abandoned {
            Some(mut previous) if actions.is_empty() => {
                previous.force_end(line.timestamp);
                vec![DispatchAction::ForceStop(Box::new(previous))]
            }
            _ => actions,
        }
    }

    fn handle_challenge_mode_end(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(activity) = self.activity.as_mut() else {
            return Vec::new();
        };
        let Some(run) = activity.challenge_mode_mut() else {
            tracing::debug!("Challenge mode end without an open run");
            return Vec::new();
        };

        let success = line.arg_bool(2).unwrap_or(false);
        let completion_ms = line.arg_i64(4).unwrap_or(0).max(0);

        run.timeline.close_current(line.timestamp);
        run.completion_secs = u64::try_from((completion_ms + 500) / 1000).unwrap_or(0);

        let overrun = if success {
            self.settings.dungeon_overrun_secs
        } else {
            0
        };
        activity.set_overrun(overrun);
        activity.end(line.timestamp, success);

        self.stop_activity().into_iter().collect()
    }

    fn handle_encounter_start(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(encounter_id) = line.arg_u32(1) else {
            tracing::debug!("Encounter start without encounter id");
            return Vec::new();
        };

        if let Some(activity) = self.activity.as_mut() {
            let start_date = activity.start_date();
            match activity.challenge_mode_mut() {
                Some(run) => {
                    run.timeline.push(TimelineSegment::boss_encounter(
                        line.timestamp,
                        start_date,
                        encounter_id,
                    ));
                }
                None => tracing::debug!(
                    encounter_id,
                    current = %activity.category(),
                    "Encounter start during another activity"
                ),
            }
            return Vec::new();
        }

        let difficulty_id = line.arg_u32(3).unwrap_or(0);
        let is_raid = instance_difficulty(difficulty_id)
            .is_some_and(|difficulty| difficulty.party_type == PartyType::Raid);
        if !is_raid {
            tracing::debug!(encounter_id, difficulty_id, "Not a raid encounter");
            return Vec::new();
        }

        let below_minimum = raid_difficulty(difficulty_id)
            .map_or(true, |difficulty| difficulty < self.settings.min_raid_difficulty);
        if below_minimum {
            tracing::debug!(
                encounter_id,
                difficulty_id,
                min_difficulty = ?self.settings.min_raid_difficulty,
                "Raid difficulty below minimum"
            );
            return Vec::new();
        }
        if self.settings.record_current_raid_encounters_only
            && !is_current_raid_encounter(encounter_id)
        {
            tracing::debug!(encounter_id, "Not a current raid encounter");
            return Vec::new();
        }

        self.start_activity(Activity::raid(encounter_id, difficulty_id, line.timestamp))
    }

    fn handle_encounter_end(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(activity) = self.activity.as_mut() else {
            return Vec::new();
        };
        let success = line.arg_bool(5).unwrap_or(false);

        let start_date = activity.start_date();
        if let Some(run) = activity.challenge_mode_mut() {
            run.timeline.close_boss_encounter(line.timestamp, success);
            run.timeline
                .push(TimelineSegment::trash(line.timestamp, start_date));
            return Vec::new();
        }

        if activity.category() != VideoCategory::Raids {
            return Vec::new();
        }

        let overrun = if success {
            self.settings.raid_overrun_secs
        } else {
            0
        };
        activity.set_overrun(overrun);
        activity.end(line.timestamp, success);

        self.stop_activity().into_iter().collect()
    }

    fn handle_zone_change(&mut self, line: &LogLine) -> Vec<DispatchAction> {
        let Some(zone_id) = line.arg_u32(1) else {
            return Vec::new();
        };
        let entering_battleground = is_battleground_zone(zone_id);
        let mut actions = Vec::new();

        if let Some(activity) = &self.activity {
            let category = activity.category();
            let same_zone = activity.zone_id() == Some(zone_id);

            if category == VideoCategory::Battlegrounds {
                // Battleground to battleground transfers keep the same recording.
                if same_zone || entering_battleground {
                    return actions;
                }
                if let Some(activity) = self.activity.as_mut() {
                    activity.end(line.timestamp, false);
                }
                actions.extend(self.stop_activity());
            } else if category.is_arena() {
                if same_zone {
                    return actions;
                }
                tracing::info!(zone_id, "Left the arena without an end event, treating as loss");
                if let Some(activity) = self.activity.as_mut() {
                    activity.end(line.timestamp, false);
                }
                actions.extend(self.stop_activity());
            } else if entering_battleground {
                actions.extend(self.force_stop(line.timestamp));
            }
        }

        if entering_battleground && self.activity.is_none() {
            actions.extend(self.start_activity(Activity::battleground(zone_id, line.timestamp)));
        }

        actions
    }

    fn handle_combatant_info(&mut self, line: &LogLine) {
        let Some(activity) = self.activity.as_mut() else {
            return;
        };
        let Some(guid) = line.arg_str(1) else {
            return;
        };

        activity.add_combatant(Combatant::new(guid, line.arg_u32(2), line.arg_u32(24)));
    }

    fn handle_aura_applied(&mut self, line: &LogLine) {
        let Some(activity) = self.activity.as_mut() else {
            return;
        };
        if activity.player_guid().is_some() {
            return;
        }

        let Some(guid) = line.arg_str(1).filter(|guid| *guid != NULL_GUID) else {
            return;
        };
        let Some(flags) = line.arg_flags(3) else {
            return;
        };
        if !is_unit_player(flags) {
            return;
        }

        let is_self = is_unit_self(flags);
        if activity.combatant(guid).is_none() {
            if !is_self && activity.category() != VideoCategory::Battlegrounds {
                return;
            }
            activity.add_combatant(Combatant::new(guid, None, None));
        }

        if let (Some(name_realm), Some(combatant)) =
            (line.arg_str(2), activity.combatant_mut(guid))
        {
            if combatant.name.is_none() {
                let identity = split_player_name(name_realm);
                combatant.name = Some(identity.name);
                combatant.realm = identity.realm;
                combatant.region = identity.region;
            }
        }

        if is_self && !activity.combatants().is_empty() {
            tracing::info!(guid, "Bound logging player");
            activity.set_player_guid(guid);
        }
    }

    fn handle_unit_died(&mut self, line: &LogLine) {
        let Some(activity) = self.activity.as_mut() else {
            return;
        };
        let Some(flags) = line.arg_flags(7) else {
            return;
        };
        if !is_unit_player(flags) {
            return;
        }
        if line.arg_bool(9).unwrap_or(false) {
            tracing::debug!("Ignoring feigned death");
            return;
        }

        let guid = line.arg_str(5).unwrap_or_default();
        let name = line
            .arg_str(6)
            .map(|name_realm| split_player_name(name_realm).name)
            .unwrap_or_default();
        let spec_id = activity
            .combatant(guid)
            .and_then(|combatant| combatant.spec_id);

        let death = PlayerDeath::new(
            name,
            spec_id,
            line.timestamp,
            activity.start_date(),
            is_unit_friendly(flags),
        );
        if let Err(error) = activity.add_death(death) {
            tracing::warn!(guid, "Failed to record player death: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityDispatcher, DispatchAction};
    use crate::activity::{Activity, SegmentKind, VideoCategory};
    use crate::combat_log::{LogArg, LogEventType, LogLine};
    use crate::game_data::RaidDifficulty;
    use crate::settings::RecorderSettings;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const SELF_GUID: &str = "Player-1-0001";
    const SELF_FLAGS: &str = "0x511";
    const ALLY_FLAGS: &str = "0x512";
    const ENEMY_FLAGS: &str = "0x548";

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 22, 20, 0, 0)
            .single()
            .expect("Expected a valid test timestamp")
    }

    fn build_line(event_type: LogEventType, offset_secs: i64, fields: &[&str]) -> LogLine {
        let args = fields
            .iter()
            .map(|value| match value.parse::<i64>() {
                Ok(number) => LogArg::Number(number),
                Err(_) => LogArg::from(*value),
            })
            .collect();
        LogLine::new(
            event_type,
            base_time() + Duration::seconds(offset_secs),
            args,
        )
    }

    fn combatant_info(offset_secs: i64, guid: &str, team_id: &str) -> LogLine {
        let mut fields = vec![guid, team_id];
        fields.extend(std::iter::repeat("0").take(21));
        fields.push("71");
        build_line(LogEventType::CombatantInfo, offset_secs, &fields)
    }

    fn aura_applied(offset_secs: i64, guid: &str, name: &str, flags: &str) -> LogLine {
        build_line(LogEventType::AuraApplied, offset_secs, &[guid, name, flags, "0x0"])
    }

    fn unit_died(offset_secs: i64, guid: &str, name: &str, flags: &str, unconscious: &str) -> LogLine {
        build_line(
            LogEventType::UnitDied,
            offset_secs,
            &[NULL_SOURCE, "nil", "0x0", "0x0", guid, name, flags, "0x0", unconscious],
        )
    }

    const NULL_SOURCE: &str = "0000000000000000";

    fn dispatcher() -> ActivityDispatcher {
        ActivityDispatcher::new(RecorderSettings::default())
    }

    fn feed(dispatcher: &mut ActivityDispatcher, lines: &[LogLine]) -> Vec<DispatchAction> {
        lines
            .iter()
            .flat_map(|line| dispatcher.handle_line(line))
            .collect()
    }

    fn expect_stopped(actions: Vec<DispatchAction>) -> Activity {
        match actions.into_iter().last() {
            Some(DispatchAction::StopRecording(activity)) => *activity,
            other => panic!("Expected a stop action, got {other:?}"),
        }
    }

    fn start_arena(dispatcher: &mut ActivityDispatcher, arena_type: &str) {
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ArenaMatchStart,
            0,
            &["1672", "33", arena_type, "0"],
        ));
        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));
    }

    #[test]
    fn arena_win_when_player_team_wins() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "3v3");

        feed(
            &mut dispatcher,
            &[
                combatant_info(1, SELF_GUID, "0"),
                combatant_info(1, "Player-1-0002", "1"),
                aura_applied(2, SELF_GUID, "Alice-Draenor-EU", SELF_FLAGS),
            ],
        );
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ArenaMatchEnd,
            200,
            &["0", "200", "1850", "1790"],
        ));

        let activity = expect_stopped(actions);
        assert!(activity.result());
        assert_eq!(activity.category(), VideoCategory::ThreeVThree);
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn arena_loss_without_resolved_player() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ArenaMatchEnd,
            200,
            &["0", "200", "1850", "1790"],
        ));

        let activity = expect_stopped(actions);
        assert!(!activity.result());
        assert_eq!(
            activity.file_name(),
            Ok("2v2 Blade's Edge (Loss)".to_string())
        );
    }

    #[test]
    fn second_arena_start_is_ignored_while_recording() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ArenaMatchStart,
            5,
            &["980", "33", "3v3", "0"],
        ));
        assert!(actions.is_empty());
        assert_eq!(
            dispatcher.activity().map(Activity::zone_id),
            Some(Some(1672))
        );
    }

    #[test]
    fn self_binding_happens_once() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        feed(
            &mut dispatcher,
            &[
                aura_applied(1, SELF_GUID, "Alice-Draenor", SELF_FLAGS),
                combatant_info(1, SELF_GUID, "0"),
                combatant_info(1, "Player-2", "0"),
                aura_applied(2, SELF_GUID, "Alice-Draenor", SELF_FLAGS),
                aura_applied(3, "Player-2", "Bob-Draenor", SELF_FLAGS),
            ],
        );

        let activity = dispatcher.activity().expect("Expected an open activity");
        assert_eq!(activity.player_guid(), Some(SELF_GUID));
        let player = activity.player().expect("Expected player to resolve");
        assert_eq!(player.name.as_deref(), Some("Alice"));
        assert_eq!(player.realm.as_deref(), Some("Draenor"));
    }

    #[test]
    fn aura_from_party_member_does_not_bind_self() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");
        feed(
            &mut dispatcher,
            &[
                combatant_info(1, "Player-2", "0"),
                aura_applied(2, "Player-2", "Bob-Draenor", ALLY_FLAGS),
            ],
        );

        let activity = dispatcher.activity().expect("Expected an open activity");
        assert_eq!(activity.player_guid(), None);
    }

    #[test]
    fn deaths_are_clamped_and_feigns_ignored() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "3v3");

        feed(
            &mut dispatcher,
            &[
                unit_died(0, "Player-3", "Carol-Draenor", ENEMY_FLAGS, "0"),
                unit_died(30, "Player-4", "Dave-Draenor", ENEMY_FLAGS, "1"),
                unit_died(62, "Player-5", "Eve-Draenor", ALLY_FLAGS, "0"),
                unit_died(70, "Creature-0-1", "Boar", "0xa48", "0"),
            ],
        );

        let activity = dispatcher.activity().expect("Expected an open activity");
        let deaths = activity.deaths();
        assert_eq!(deaths.len(), 2);
        assert_eq!(deaths[0].timestamp, 0.0);
        assert!(!deaths[0].friendly);
        assert_eq!(deaths[1].name, "Eve");
        assert_eq!(deaths[1].timestamp, 60.0);
        assert!(deaths[1].friendly);
    }

    #[test]
    fn timed_keystone_reports_tier_and_drops_short_final_trash() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"The Stonevault\"", "2652", "501", "12"],
        ));
        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));

        feed(&mut dispatcher, &[combatant_info(1, SELF_GUID, "0")]);
        feed(
            &mut dispatcher,
            &[aura_applied(2, SELF_GUID, "Alice-Draenor-EU", SELF_FLAGS)],
        );
        for index in 1..=5 {
            dispatcher.handle_line(&unit_died(
                index * 60,
                SELF_GUID,
                "Alice-Draenor-EU",
                SELF_FLAGS,
                "0",
            ));
        }
        feed(
            &mut dispatcher,
            &[
                build_line(LogEventType::EncounterStart, 900, &["2854", "\"E.D.N.A\"", "8", "5", "2652"]),
                build_line(LogEventType::EncounterEnd, 1_095, &["2854", "\"E.D.N.A\"", "8", "5", "1", "0"]),
            ],
        );

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeEnd,
            1_100,
            &["2652", "1", "12", "1098000", "310.5", "2150.0"],
        ));
        let activity = expect_stopped(actions);

        assert!(activity.result());
        assert_eq!(activity.deaths().len(), 5);
        assert_eq!(activity.overrun(), 5);
        let run = activity.challenge_mode().expect("Expected a challenge mode run");
        assert_eq!(run.completion_secs, 1_098);
        assert_eq!(run.upgrade_level(), Ok(3));

        let kinds: Vec<SegmentKind> = run.timeline.segments().iter().map(|segment| segment.kind).collect();
        assert_eq!(kinds, vec![SegmentKind::Trash, SegmentKind::BossEncounter]);
        assert_eq!(run.timeline.open_count(), 0);
        assert_eq!(
            activity.file_name(),
            Ok("Alice - The Stonevault +12 (+3)".to_string())
        );
    }

    #[test]
    fn final_trash_shorter_than_ten_seconds_is_dropped() {
        let mut dispatcher = dispatcher();
        feed(
            &mut dispatcher,
            &[
                build_line(LogEventType::ChallengeModeStart, 0, &["\"The Stonevault\"", "2652", "501", "7"]),
                build_line(LogEventType::EncounterStart, 600, &["2888", "\"Void Speaker Eirich\"", "8", "5", "2652"]),
                build_line(LogEventType::EncounterEnd, 700, &["2888", "\"Void Speaker Eirich\"", "8", "5", "1", "0"]),
            ],
        );
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeEnd,
            705,
            &["2652", "1", "7", "705000"],
        ));

        let activity = expect_stopped(actions);
        let run = activity.challenge_mode().expect("Expected a challenge mode run");
        let last = run.timeline.segments().last().expect("Expected segments");
        assert_eq!(last.kind, SegmentKind::BossEncounter);
        assert_eq!(last.result, Some(true));
    }

    #[test]
    fn keystones_below_minimum_level_are_not_recorded() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"The Stonevault\"", "2652", "501", "1"],
        ));

        assert!(actions.is_empty());
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn restarting_a_keystone_abandons_the_previous_run() {
        let mut dispatcher = dispatcher();
        let start = build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"The Stonevault\"", "2652", "501", "10"],
        );
        dispatcher.handle_line(&start);

        let restart = build_line(
            LogEventType::ChallengeModeStart,
            90,
            &["\"City of Threads\"", "2669", "502", "11"],
        );
        let actions = dispatcher.handle_line(&restart);

        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));
        let run = dispatcher
            .activity()
            .and_then(Activity::challenge_mode)
            .expect("Expected the new run to be open");
        assert_eq!(run.map_id, 502);
        assert_eq!(run.timeline.len(), 1);
    }

    #[test]
    fn data_timeout_force_stops_an_open_run_at_the_timeout_moment() {
        let mut dispatcher = dispatcher();
        feed(
            &mut dispatcher,
            &[
                build_line(LogEventType::ChallengeModeStart, 0, &["\"The Stonevault\"", "2652", "501", "10"]),
                build_line(LogEventType::EncounterStart, 300, &["2854", "\"E.D.N.A\"", "8", "5", "2652"]),
            ],
        );

        let actions = dispatcher.handle_data_timeout(std::time::Duration::from_millis(120_000));
        let activity = match actions.into_iter().next() {
            Some(DispatchAction::ForceStop(activity)) => *activity,
            other => panic!("Expected a force stop, got {other:?}"),
        };

        let expected_end = base_time() + Duration::seconds(420);
        assert_eq!(activity.end_date(), Some(expected_end));
        assert_eq!(activity.overrun(), 0);
        let run = activity.challenge_mode().expect("Expected a challenge mode run");
        assert_eq!(run.timeline.open_count(), 0);
        let boss = run.timeline.last_boss_encounter().expect("Expected boss segment");
        assert_eq!(boss.log_end, Some(expected_end));
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn data_timeout_ignores_arenas_and_raids() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        let actions = dispatcher.handle_data_timeout(std::time::Duration::from_secs(120));
        assert!(actions.is_empty());
        assert!(dispatcher.is_recording());
    }

    #[test]
    fn raid_encounter_records_kill_with_overrun() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            0,
            &["2902", "\"Ulgrax the Devourer\"", "16", "20", "2657"],
        ));
        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::EncounterEnd,
            300,
            &["2902", "\"Ulgrax the Devourer\"", "16", "20", "1", "300000"],
        ));
        let activity = expect_stopped(actions);

        assert!(activity.result());
        assert_eq!(activity.overrun(), 15);
        assert_eq!(activity.duration_secs(), Ok(315.0));
        assert_eq!(
            activity.file_name(),
            Ok("Nerub-ar Palace, Ulgrax the Devourer (Kill)".to_string())
        );
    }

    #[test]
    fn dungeon_boss_outside_a_keystone_is_ignored() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            0,
            &["2854", "\"E.D.N.A\"", "23", "5", "2652"],
        ));

        assert!(actions.is_empty());
    }

    #[test]
    fn encounter_start_during_arena_is_rejected() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            5,
            &["2902", "\"Ulgrax the Devourer\"", "16", "20", "2657"],
        ));
        assert!(actions.is_empty());
        assert_eq!(
            dispatcher.activity().map(Activity::category),
            Some(VideoCategory::TwoVTwo)
        );
    }

    #[test]
    fn solo_shuffle_first_round_lost_to_friendly_death() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "Rated Solo Shuffle");

        for round in 0..6 {
            let round_start = round * 150;
            if round > 0 {
                let actions = dispatcher.handle_line(&build_line(
                    LogEventType::ArenaMatchStart,
                    round_start,
                    &["1672", "33", "Rated Solo Shuffle", "0"],
                ));
                assert!(actions.is_empty());
            }
            feed(
                &mut dispatcher,
                &[
                    combatant_info(round_start + 1, SELF_GUID, "0"),
                    combatant_info(round_start + 1, "Player-2", "1"),
                    aura_applied(round_start + 2, SELF_GUID, "Alice-Draenor", SELF_FLAGS),
                ],
            );

            let flags = if round == 0 || round == 3 { ALLY_FLAGS } else { ENEMY_FLAGS };
            feed(
                &mut dispatcher,
                &[
                    unit_died(round_start + 60, "Player-9", "Someone-Draenor", flags, "0"),
                    unit_died(round_start + 61, "Player-8", "Other-Draenor", ENEMY_FLAGS, "0"),
                ],
            );

            if round == 0 {
                let activity = dispatcher.activity().expect("Expected an open shuffle");
                let crate::activity::ActivityKind::SoloShuffle(shuffle) = activity.kind() else {
                    panic!("Expected a solo shuffle");
                };
                let first = shuffle.current_round().expect("Expected a round");
                assert!(!first.result);
                assert_eq!(shuffle.rounds_won(), 0);
            }
        }

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ArenaMatchEnd,
            900,
            &["0", "900", "0", "0"],
        ));
        let activity = expect_stopped(actions);

        assert!(activity.result());
        assert_eq!(activity.deaths().len(), 6);
        assert_eq!(activity.result_info(), Ok("4-2".to_string()));
        assert_eq!(
            activity.file_name(),
            Ok("Alice - Solo Shuffle Blade's Edge (4-2)".to_string())
        );
    }

    #[test]
    fn battleground_enter_and_leave_by_zone_change() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 0, &["489", "\"Warsong Gulch\"", "0"]));
        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));

        feed(
            &mut dispatcher,
            &[aura_applied(5, SELF_GUID, "Alice-Draenor", SELF_FLAGS)],
        );
        assert_eq!(
            dispatcher.activity().and_then(Activity::player_guid),
            Some(SELF_GUID)
        );

        let same = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 10, &["489", "\"Warsong Gulch\"", "0"]));
        assert!(same.is_empty());

        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 900, &["1670", "\"Oribos\"", "0"]));
        let activity = expect_stopped(actions);
        assert_eq!(activity.file_name(), Ok("Warsong Gulch".to_string()));
    }

    #[test]
    fn leaving_an_arena_by_zone_change_stops_as_loss() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");

        assert!(dispatcher
            .handle_line(&build_line(LogEventType::ZoneChange, 1, &["1672", "\"Blade's Edge\"", "0"]))
            .is_empty());

        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 60, &["1670", "\"Oribos\"", "0"]));
        let activity = expect_stopped(actions);
        assert!(!activity.result());
        assert_eq!(activity.start_date(), base_time());
        assert_eq!(activity.end_date(), Some(base_time() + Duration::seconds(60)));
        assert_eq!(activity.overrun(), 3);
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn moving_between_battlegrounds_keeps_recording() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 0, &["489", "\"Warsong Gulch\"", "0"]));
        assert!(matches!(actions.as_slice(), [DispatchAction::StartRecording]));

        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 600, &["726", "\"Twin Peaks\"", "0"]));
        assert!(actions.is_empty());
        let activity = dispatcher.activity().expect("Expected the battleground to stay open");
        assert_eq!(activity.zone_id(), Some(489));
        assert_eq!(activity.start_date(), base_time());
    }

    #[test]
    fn unknown_keystone_dungeon_is_not_recorded() {
        let mut dispatcher = dispatcher();
        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"Nowhere\"", "9999", "9999", "12"],
        ));

        assert!(actions.is_empty());
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn unknown_keystone_dungeon_still_closes_the_previous_run() {
        let mut dispatcher = dispatcher();
        dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"The Stonevault\"", "2652", "501", "10"],
        ));

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            90,
            &["\"Nowhere\"", "9999", "9999", "12"],
        ));
        let previous = match actions.as_slice() {
            [DispatchAction::ForceStop(activity)] => activity,
            other => panic!("Expected a force stop, got {other:?}"),
        };
        assert_eq!(previous.challenge_mode().map(|run| run.map_id), Some(501));
        previous.metadata().expect("Expected metadata for the abandoned run");
        assert!(!dispatcher.is_recording());
    }

    #[test]
    fn raids_below_minimum_difficulty_are_not_recorded() {
        let settings = RecorderSettings {
            min_raid_difficulty: RaidDifficulty::Heroic,
            ..RecorderSettings::default()
        };
        let mut dispatcher = ActivityDispatcher::new(settings);

        let normal = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            0,
            &["3009", "\"Vexie and the Geargrinders\"", "14", "20", "2769"],
        ));
        assert!(normal.is_empty());

        let heroic = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            10,
            &["3009", "\"Vexie and the Geargrinders\"", "15", "20", "2769"],
        ));
        assert!(matches!(heroic.as_slice(), [DispatchAction::StartRecording]));
    }

    #[test]
    fn current_raid_filter_skips_older_tiers() {
        let settings = RecorderSettings {
            record_current_raid_encounters_only: true,
            ..RecorderSettings::default()
        };
        let mut dispatcher = ActivityDispatcher::new(settings);

        let old_tier = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            0,
            &["2902", "\"Ulgrax the Devourer\"", "16", "20", "2657"],
        ));
        assert!(old_tier.is_empty());

        let current = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            10,
            &["3016", "\"Chrome King Gallywix\"", "17", "25", "2769"],
        ));
        assert!(matches!(current.as_slice(), [DispatchAction::StartRecording]));
    }

    #[test]
    fn zoning_into_a_battleground_ends_the_previous_activity_first() {
        let mut dispatcher = dispatcher();
        dispatcher.handle_line(&build_line(
            LogEventType::ChallengeModeStart,
            0,
            &["\"The Stonevault\"", "2652", "501", "10"],
        ));

        let actions = dispatcher.handle_line(&build_line(LogEventType::ZoneChange, 30, &["726", "\"Twin Peaks\"", "0"]));
        assert!(matches!(
            actions.as_slice(),
            [DispatchAction::ForceStop(_), DispatchAction::StartRecording]
        ));
        assert_eq!(
            dispatcher.activity().map(Activity::category),
            Some(VideoCategory::Battlegrounds)
        );
    }

    #[test]
    fn disabled_categories_do_not_start() {
        let settings = RecorderSettings {
            record_raids: false,
            ..RecorderSettings::default()
        };
        let mut dispatcher = ActivityDispatcher::new(settings);

        let actions = dispatcher.handle_line(&build_line(
            LogEventType::EncounterStart,
            0,
            &["2902", "\"Ulgrax the Devourer\"", "16", "20", "2657"],
        ));
        assert!(actions.is_empty());
    }

    #[test]
    fn manual_hotkey_toggles_and_process_stop_force_stops() {
        let mut dispatcher = dispatcher();
        let started = dispatcher.handle_manual_hotkey(base_time());
        assert!(matches!(started.as_slice(), [DispatchAction::StartRecording]));

        let stopped = dispatcher.handle_manual_hotkey(base_time() + Duration::seconds(30));
        let activity = expect_stopped(stopped);
        assert_eq!(activity.file_name(), Ok("Manual".to_string()));

        start_arena(&mut dispatcher, "Skirmish");
        let actions = dispatcher.handle_process_stopped();
        assert!(matches!(actions.as_slice(), [DispatchAction::ForceStop(_)]));
    }

    #[test]
    fn dropping_activity_after_refused_promotion_clears_state() {
        let mut dispatcher = dispatcher();
        start_arena(&mut dispatcher, "2v2");
        dispatcher.drop_activity();

        assert!(!dispatcher.is_recording());
        assert!(dispatcher
            .handle_line(&build_line(LogEventType::ArenaMatchEnd, 60, &["0", "60", "0", "0"]))
            .is_empty());
    }
}
