use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// GUID the game writes for "no unit".
pub const NULL_GUID: &str = "0000000000000000";

const AFFILIATION_MINE: u32 = 0x0000_0001;
const REACTION_FRIENDLY: u32 = 0x0000_0010;
const CONTROL_PLAYER: u32 = 0x0000_0100;
const TYPE_PLAYER: u32 = 0x0000_0400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogEventType {
    ArenaMatchStart,
    ArenaMatchEnd,
    ChallengeModeStart,
    ChallengeModeEnd,
    EncounterStart,
    EncounterEnd,
    ZoneChange,
    CombatantInfo,
    AuraApplied,
    UnitDied,
}

impl LogEventType {
    pub fn from_log_name(name: &str) -> Option<Self> {
        match name.trim() {
            "ARENA_MATCH_START" => Some(Self::ArenaMatchStart),
            "ARENA_MATCH_END" => Some(Self::ArenaMatchEnd),
            "CHALLENGE_MODE_START" => Some(Self::ChallengeModeStart),
            "CHALLENGE_MODE_END" => Some(Self::ChallengeModeEnd),
            "ENCOUNTER_START" => Some(Self::EncounterStart),
            "ENCOUNTER_END" => Some(Self::EncounterEnd),
            "ZONE_CHANGE" => Some(Self::ZoneChange),
            "COMBATANT_INFO" => Some(Self::CombatantInfo),
            "SPELL_AURA_APPLIED" => Some(Self::AuraApplied),
            "UNIT_DIED" => Some(Self::UnitDied),
            _ => None,
        }
    }

    pub fn log_name(self) -> &'static str {
        match self {
            Self::ArenaMatchStart => "ARENA_MATCH_START",
            Self::ArenaMatchEnd => "ARENA_MATCH_END",
            Self::ChallengeModeStart => "CHALLENGE_MODE_START",
            Self::ChallengeModeEnd => "CHALLENGE_MODE_END",
            Self::EncounterStart => "ENCOUNTER_START",
            Self::EncounterEnd => "ENCOUNTER_END",
            Self::ZoneChange => "ZONE_CHANGE",
            Self::CombatantInfo => "COMBATANT_INFO",
            Self::AuraApplied => "SPELL_AURA_APPLIED",
            Self::UnitDied => "UNIT_DIED",
        }
    }
}

/// A positional field of a parsed log line.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    Number(i64),
    Text(String),
    List(Vec<LogArg>),
    Nil,
}

impl From<i64> for LogArg {
    fn from(value: i64) -> Self {
        LogArg::Number(value)
    }
}

impl From<&str> for LogArg {
    fn from(value: &str) -> Self {
        LogArg::Text(value.to_string())
    }
}

impl From<String> for LogArg {
    fn from(value: String) -> Self {
        LogArg::Text(value)
    }
}

/// One already-parsed combat log line. Argument positions are 1-based, counted after the
/// event name, matching how the game documents its log fields.
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub event_type: LogEventType,
    pub timestamp: DateTime<Utc>,
    pub args: Vec<LogArg>,
}

impl LogLine {
    pub fn new(event_type: LogEventType, timestamp: DateTime<Utc>, args: Vec<LogArg>) -> Self {
        Self {
            event_type,
            timestamp,
            args,
        }
    }

    pub fn arg(&self, position: usize) -> Option<&LogArg> {
        position.checked_sub(1).and_then(|index| self.args.get(index))
    }

    pub fn arg_i64(&self, position: usize) -> Option<i64> {
        match self.arg(position)? {
            LogArg::Number(value) => Some(*value),
            LogArg::Text(value) => value.trim().trim_matches('"').parse::<i64>().ok(),
            LogArg::List(_) | LogArg::Nil => None,
        }
    }

    pub fn arg_u32(&self, position: usize) -> Option<u32> {
        self.arg_i64(position)
            .and_then(|value| u32::try_from(value).ok())
    }

    pub fn arg_bool(&self, position: usize) -> Option<bool> {
        self.arg_i64(position).map(|value| value != 0)
    }

    pub fn arg_str(&self, position: usize) -> Option<&str> {
        match self.arg(position)? {
            LogArg::Text(value) => {
                let value = value.trim().trim_matches('"');
                if value.is_empty() || value == "nil" {
                    None
                } else {
                    Some(value)
                }
            }
            _ => None,
        }
    }

    pub fn arg_flags(&self, position: usize) -> Option<u32> {
        match self.arg(position)? {
            LogArg::Number(value) => u32::try_from(*value).ok(),
            LogArg::Text(value) => parse_combat_log_flags(Some(value)),
            LogArg::List(_) | LogArg::Nil => None,
        }
    }

    pub fn arg_u32_list(&self, position: usize) -> Vec<u32> {
        match self.arg(position) {
            Some(LogArg::List(values)) => values
                .iter()
                .filter_map(|value| match value {
                    LogArg::Number(number) => u32::try_from(*number).ok(),
                    LogArg::Text(text) => text.trim().parse::<u32>().ok(),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

pub(crate) fn parse_combat_log_flags(raw_flags: Option<&str>) -> Option<u32> {
    let value = raw_flags?.trim();
    if value.is_empty() || value == "nil" {
        return None;
    }

    let unquoted = value.trim_matches('"');
    if let Some(hex_value) = unquoted
        .strip_prefix("0x")
        .or_else(|| unquoted.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex_value, 16).ok();
    }

    unquoted.parse::<u32>().ok()
}

/// The unit is the logging player: friendly reaction and "mine" affiliation.
pub fn is_unit_self(flags: u32) -> bool {
    flags & REACTION_FRIENDLY != 0 && flags & AFFILIATION_MINE != 0
}

pub fn is_unit_player(flags: u32) -> bool {
    flags & CONTROL_PLAYER != 0 && flags & TYPE_PLAYER != 0
}

pub fn is_unit_friendly(flags: u32) -> bool {
    flags & REACTION_FRIENDLY != 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerIdentity {
    pub name: String,
    pub realm: Option<String>,
    pub region: Option<String>,
}

/// Splits a `Name-Realm-...-Region` unit name. The realm may contain no dashes; the region
/// is the fourth dash-separated component when present.
pub fn split_player_name(name_realm: &str) -> PlayerIdentity {
    let trimmed = name_realm.trim().trim_matches('"');
    let parts: Vec<&str> = trimmed.split('-').collect();
    let non_empty = |value: Option<&&str>| {
        value
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    PlayerIdentity {
        name: parts.first().map(|value| value.to_string()).unwrap_or_default(),
        realm: non_empty(parts.get(1)),
        region: non_empty(parts.get(3)),
    }
}
