//! Static lookup tables for zones, encounters and keystone timers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyType {
    Party,
    Raid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceDifficulty {
    pub label: &'static str,
    pub party_type: PartyType,
}

/// Raid difficulties in increasing order, as used by the minimum difficulty setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RaidDifficulty {
    #[serde(rename = "LFR", alias = "lfr")]
    Lfr,
    #[serde(alias = "normal")]
    Normal,
    #[serde(alias = "heroic")]
    Heroic,
    #[serde(alias = "mythic")]
    Mythic,
}

pub struct RaidInstance {
    pub zone_id: u32,
    pub name: &'static str,
    pub encounters: &'static [(u32, &'static str)],
}

const RAID_INSTANCES: &[RaidInstance] = &[
    RaidInstance {
        zone_id: 2481,
        name: "Sepulcher of the First Ones",
        encounters: &[
            (2512, "Vigilant Guardian"),
            (2540, "Dausegne"),
            (2553, "Artificer Xy'mox"),
            (2544, "Prototype Pantheon"),
            (2539, "Lihuvim"),
            (2542, "Skolex"),
            (2529, "Halondrus"),
            (2546, "Anduin Wrynn"),
            (2543, "Lords of Dread"),
            (2549, "Rygelon"),
            (2537, "The Jailer"),
        ],
    },
    RaidInstance {
        zone_id: 2657,
        name: "Nerub-ar Palace",
        encounters: &[
            (2902, "Ulgrax the Devourer"),
            (2917, "The Bloodbound Horror"),
            (2898, "Sikran"),
            (2918, "Rasha'nan"),
            (2919, "Broodtwister Ovi'nax"),
            (2920, "Nexus-Princess Ky'veza"),
            (2921, "The Silken Court"),
            (2922, "Queen Ansurek"),
        ],
    },
    RaidInstance {
        zone_id: 2769,
        name: "Liberation of Undermine",
        encounters: &[
            (3009, "Vexie and the Geargrinders"),
            (3010, "Cauldron of Carnage"),
            (3011, "Rik Reverb"),
            (3012, "Stix Bunkjunker"),
            (3013, "Sprocketmonger Lockenstock"),
            (3014, "One-Armed Bandit"),
            (3015, "Mug'Zee, Heads of Security"),
            (3016, "Chrome King Gallywix"),
        ],
    },
];

/// Zone of the raid tier currently in season.
pub const CURRENT_RAID_ZONE_ID: u32 = 2769;

/// Returns `(raid name, encounter name)` for a raid boss encounter id.
pub fn raid_encounter(encounter_id: u32) -> Option<(&'static str, &'static str)> {
    RAID_INSTANCES.iter().find_map(|raid| {
        raid.encounters
            .iter()
            .find(|(id, _)| *id == encounter_id)
            .map(|(_, encounter_name)| (raid.name, *encounter_name))
    })
}

pub fn raid_zone_id(encounter_id: u32) -> Option<u32> {
    RAID_INSTANCES
        .iter()
        .find(|raid| raid.encounters.iter().any(|(id, _)| *id == encounter_id))
        .map(|raid| raid.zone_id)
}

pub fn is_current_raid_encounter(encounter_id: u32) -> bool {
    raid_zone_id(encounter_id) == Some(CURRENT_RAID_ZONE_ID)
}

pub fn arena_name(zone_id: u32) -> Option<&'static str> {
    match zone_id {
        1672 => Some("Blade's Edge"),
        617 => Some("Dalaran"),
        1505 => Some("Nagrand"),
        572 => Some("Ruins of Lordaeron"),
        2167 => Some("The Robodrome"),
        1134 => Some("Tiger's Peak"),
        980 => Some("Tol'Viron"),
        1504 => Some("Black Rook Hold"),
        2373 => Some("Empyrean Domain"),
        1552 => Some("Ashamane's Fall"),
        1911 => Some("Mugambala"),
        1825 => Some("Hook Point"),
        2509 => Some("Maldraxxus Coliseum"),
        2547 => Some("Enigma Crucible"),
        2563 => Some("Nokhudon Proving Grounds"),
        2759 => Some("Cage of Carnage"),
        _ => None,
    }
}

pub fn battleground_name(zone_id: u32) -> Option<&'static str> {
    match zone_id {
        30 => Some("Alterac Valley"),
        2107 | 1681 => Some("Arathi Basin"),
        1105 | 2245 => Some("Deepwind Gorge"),
        566 | 968 => Some("Eye of the Storm"),
        628 => Some("Isle of Conquest"),
        1803 => Some("Seething Shore"),
        727 => Some("Silvershard Mines"),
        998 => Some("Temple of Kotmogu"),
        761 => Some("The Battle for Gilneas"),
        726 => Some("Twin Peaks"),
        489 => Some("Warsong Gulch"),
        _ => None,
    }
}

pub fn is_battleground_zone(zone_id: u32) -> bool {
    battleground_name(zone_id).is_some()
}

pub fn dungeon_name(map_id: u32) -> Option<&'static str> {
    match map_id {
        353 => Some("Siege of Boralus"),
        375 => Some("Mists of Tirna Scithe"),
        376 => Some("The Necrotic Wake"),
        501 => Some("The Stonevault"),
        502 => Some("City of Threads"),
        503 => Some("Ara-Kara, City of Echoes"),
        505 => Some("The Dawnbreaker"),
        507 => Some("Grim Batol"),
        _ => None,
    }
}

/// Keystone deadlines in seconds, loosest first: index `i` is the deadline for tier `i + 1`.
pub fn keystone_timers(map_id: u32) -> Option<&'static [u32]> {
    match map_id {
        353 => Some(&[1980, 1584, 1188]),
        375 => Some(&[1800, 1440, 1080]),
        376 => Some(&[2160, 1728, 1296]),
        501 => Some(&[1980, 1584, 1188]),
        502 => Some(&[2280, 1824, 1368]),
        503 => Some(&[1800, 1440, 1080]),
        505 => Some(&[2100, 1680, 1260]),
        507 => Some(&[2040, 1632, 1224]),
        _ => None,
    }
}

pub fn instance_difficulty(difficulty_id: u32) -> Option<InstanceDifficulty> {
    let (label, party_type) = match difficulty_id {
        1 => ("Normal", PartyType::Party),
        2 => ("Heroic", PartyType::Party),
        3 => ("10 Player", PartyType::Raid),
        4 => ("25 Player", PartyType::Raid),
        5 => ("10 Player Heroic", PartyType::Raid),
        6 => ("25 Player Heroic", PartyType::Raid),
        7 | 17 => ("Looking For Raid", PartyType::Raid),
        8 => ("Mythic Keystone", PartyType::Party),
        9 => ("40 Player", PartyType::Raid),
        14 => ("Normal", PartyType::Raid),
        15 => ("Heroic", PartyType::Raid),
        16 => ("Mythic", PartyType::Raid),
        23 => ("Mythic", PartyType::Party),
        24 => ("Timewalking", PartyType::Party),
        33 => ("Timewalking", PartyType::Raid),
        _ => return None,
    };

    Some(InstanceDifficulty { label, party_type })
}

/// Tier of a raid difficulty id; legacy 10/25/40 player sizes count as normal.
pub fn raid_difficulty(difficulty_id: u32) -> Option<RaidDifficulty> {
    match difficulty_id {
        7 | 17 => Some(RaidDifficulty::Lfr),
        3 | 4 | 9 | 14 | 33 => Some(RaidDifficulty::Normal),
        5 | 6 | 15 => Some(RaidDifficulty::Heroic),
        16 => Some(RaidDifficulty::Mythic),
        _ => None,
    }
}
