use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ActivityError;

use super::arena::determine_arena_result;
use super::combatant::PlayerDeath;
use super::{ActivityCore, VideoCategory};

pub const SOLO_SHUFFLE_ROUNDS: usize = 6;
pub const SOLO_SHUFFLE_OVERRUN_SECS: u64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShuffleRoundSummary {
    pub round: usize,
    pub timestamp: f64,
    pub result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Six nested arena rounds; each round is decided by its first player death.
#[derive(Debug, Clone)]
pub struct SoloShuffle {
    rounds: Vec<ActivityCore>,
}

impl SoloShuffle {
    pub fn new(start_date: DateTime<Utc>, zone_id: u32) -> Self {
        let mut shuffle = Self { rounds: Vec::new() };
        shuffle.start_round(start_date, zone_id);
        shuffle
    }

    pub fn start_round(&mut self, start_date: DateTime<Utc>, zone_id: u32) {
        let mut round = ActivityCore::new(VideoCategory::SoloShuffle, start_date);
        round.zone_id = Some(zone_id);
        // Teams change between rounds; combatant info lines refresh them.
        if let Some(previous) = self.rounds.last() {
            round.combatants = previous.combatants.clone();
            round.player_guid = previous.player_guid.clone();
        }
        self.rounds.push(round);

        tracing::info!(
            round = self.rounds.len(),
            of = SOLO_SHUFFLE_ROUNDS,
            "Starting solo shuffle round"
        );
    }

    pub fn current_round(&self) -> Option<&ActivityCore> {
        self.rounds.last()
    }

    pub fn current_round_mut(&mut self) -> Option<&mut ActivityCore> {
        self.rounds.last_mut()
    }

    pub fn rounds(&self) -> &[ActivityCore] {
        &self.rounds
    }

    pub fn rounds_won(&self) -> usize {
        self.rounds.iter().filter(|round| round.result).count()
    }

    pub fn rounds_lost(&self) -> usize {
        self.rounds.len() - self.rounds_won()
    }

    pub fn result_info(&self) -> String {
        format!("{}-{}", self.rounds_won(), self.rounds_lost())
    }

    /// Ends the current round at the first meaningful death. Later deaths in the same round
    /// are ignored. Returns whether the death decided the round.
    pub fn add_death(&mut self, death: &PlayerDeath) -> Result<bool, ActivityError> {
        let round = self.rounds.last_mut().ok_or(ActivityError::NoCurrentRound)?;

        if !round.deaths.is_empty() || round.end_date.is_some() {
            tracing::debug!(name = %death.name, "Round already decided, ignoring death");
            return Ok(false);
        }

        let player_team = round.player()?.team_id.ok_or(ActivityError::UnknownTeam)?;
        let winning_team_id = if death.friendly {
            if player_team == 0 {
                1
            } else {
                0
            }
        } else {
            player_team
        };

        round.deaths.push(death.clone());
        let result = determine_arena_result(round, winning_team_id);
        round.end(death.date, result);

        tracing::info!(
            round = self.rounds.len(),
            winning_team_id,
            friendly = death.friendly,
            result,
            "Solo shuffle round decided"
        );

        Ok(true)
    }

    pub fn round_summaries(&self, game_start: DateTime<Utc>) -> Vec<ShuffleRoundSummary> {
        self.rounds
            .iter()
            .enumerate()
            .map(|(index, round)| ShuffleRoundSummary {
                round: index + 1,
                timestamp: (round.start_date - game_start).num_milliseconds() as f64 / 1000.0,
                result: round.result,
                duration: round.end_date.map(|end_date| {
                    (end_date - round.start_date).num_milliseconds() as f64 / 1000.0
                }),
            })
            .collect()
    }
}
