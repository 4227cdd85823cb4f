use crate::game_data::arena_name;

use super::ActivityCore;

pub const ARENA_OVERRUN_SECS: u64 = 3;

/// Win iff the logging player's team is the reported winner. Unknown player or team is a
/// loss, not an error.
pub(crate) fn determine_arena_result(core: &ActivityCore, winning_team_id: u32) -> bool {
    let player = match core.player() {
        Ok(player) => player,
        Err(error) => {
            tracing::warn!(
                winning_team_id,
                "Cannot determine arena result, treating as loss: {error}"
            );
            return false;
        }
    };

    let Some(team_id) = player.team_id else {
        tracing::warn!(
            guid = %player.guid,
            winning_team_id,
            "Player has no team id, treating arena as loss"
        );
        return false;
    };

    team_id == winning_team_id
}

pub(crate) fn arena_zone_name(zone_id: Option<u32>) -> String {
    zone_id
        .and_then(arena_name)
        .unwrap_or("Unknown Arena")
        .to_string()
}

pub(crate) fn arena_result_info(result: bool) -> &'static str {
    if result {
        "Win"
    } else {
        "Loss"
    }
}
