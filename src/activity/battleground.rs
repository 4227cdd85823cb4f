use crate::game_data::battleground_name;

pub const BATTLEGROUND_OVERRUN_SECS: u64 = 3;

pub(crate) fn battleground_display_name(zone_id: Option<u32>) -> String {
    zone_id
        .and_then(battleground_name)
        .unwrap_or("Unknown Battleground")
        .to_string()
}
