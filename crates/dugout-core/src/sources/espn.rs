// ESPN fantasy payloads: the roster/league service.
//
// Two payloads feed one set of records: the player pool (names, MLB team,
// eligible slots, injury status, ownership percentage) and the league's
// mRoster view (which fantasy team owns which player id).

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::player::{stat, InjuryField, PositionSet, RawPlayerRecord, SourceId};
use crate::sources::ProviderError;

/// ESPN `proTeamId` → MLB abbreviation. Id 0 is the free-agent pool.
const ESPN_PRO_TEAMS: &[(u32, &str)] = &[
    (1, "BAL"),
    (2, "BOS"),
    (3, "LAA"),
    (4, "CHW"),
    (5, "CLE"),
    (6, "DET"),
    (7, "KC"),
    (8, "MIL"),
    (9, "MIN"),
    (10, "NYY"),
    (11, "ATH"),
    (12, "SEA"),
    (13, "TEX"),
    (14, "TOR"),
    (15, "ATL"),
    (16, "CHC"),
    (17, "CIN"),
    (18, "HOU"),
    (19, "LAD"),
    (20, "WSH"),
    (21, "NYM"),
    (22, "PHI"),
    (23, "PIT"),
    (24, "STL"),
    (25, "SD"),
    (26, "SF"),
    (27, "COL"),
    (28, "MIA"),
    (29, "ARI"),
    (30, "TB"),
];

pub fn pro_team_abbr(pro_team_id: u32) -> Option<&'static str> {
    ESPN_PRO_TEAMS
        .iter()
        .find(|(id, _)| *id == pro_team_id)
        .map(|(_, abbr)| *abbr)
}

/// ESPN player id → owning fantasy team label.
pub type OwnerMap = HashMap<i64, String>;

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnPlayer {
    id: i64,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    pro_team_id: Option<u32>,
    #[serde(default)]
    eligible_slots: Vec<u16>,
    #[serde(default)]
    ownership: Option<EspnOwnership>,
    /// Everything else, including `injuryStatus` whose presence matters.
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnOwnership {
    #[serde(default)]
    percent_owned: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EspnLeague {
    #[serde(default)]
    teams: Vec<EspnTeam>,
}

#[derive(Debug, Deserialize)]
struct EspnTeam {
    id: i64,
    #[serde(default)]
    abbrev: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roster: Option<EspnRoster>,
}

#[derive(Debug, Deserialize)]
struct EspnRoster {
    #[serde(default)]
    entries: Vec<EspnRosterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnRosterEntry {
    player_id: i64,
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Read the mRoster view into a player id → fantasy team map. Teams are
/// labelled by abbreviation, then name, then "Team {id}".
pub fn parse_roster_owners(payload: &Value) -> Result<OwnerMap, ProviderError> {
    let league =
        EspnLeague::deserialize(payload).map_err(|e| ProviderError::decode(SourceId::Roster, e))?;

    let mut owners = OwnerMap::new();
    for team in league.teams {
        let label = team
            .abbrev
            .filter(|s| !s.trim().is_empty())
            .or(team.name.filter(|s| !s.trim().is_empty()))
            .unwrap_or_else(|| format!("Team {}", team.id));
        let entries = team.roster.map(|r| r.entries).unwrap_or_default();
        debug!(team = %label, players = entries.len(), "read fantasy roster");
        for entry in entries {
            owners.insert(entry.player_id, label.clone());
        }
    }
    Ok(owners)
}

/// Read the player pool. Entries that fail to decode are skipped with a
/// warning; a payload that is not a list fails the whole source.
pub fn parse_players(payload: &Value, owners: &OwnerMap) -> Result<Vec<RawPlayerRecord>, ProviderError> {
    let entries = payload
        .as_array()
        .ok_or_else(|| ProviderError::decode(SourceId::Roster, "player pool is not a list"))?;

    let mut records = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;
    for entry in entries {
        let player = match EspnPlayer::deserialize(entry) {
            Ok(p) => p,
            Err(e) => {
                skipped += 1;
                debug!(error = %e, "skipping undecodable ESPN player");
                continue;
            }
        };
        if player.full_name.trim().is_empty() {
            skipped += 1;
            continue;
        }
        records.push(to_record(player, owners));
    }

    if skipped > 0 {
        warn!(skipped, "ESPN player pool entries skipped");
    }
    Ok(records)
}

fn to_record(player: EspnPlayer, owners: &OwnerMap) -> RawPlayerRecord {
    let team = player
        .pro_team_id
        .and_then(pro_team_abbr)
        .unwrap_or_default();
    let positions = PositionSet::from_espn_slots(&player.eligible_slots);
    let injury = InjuryField::from_json(player.extra.get("injuryStatus"));

    let mut record = RawPlayerRecord::new(SourceId::Roster, player.full_name, team, positions.display())
        .with_injury(injury);
    if let Some(pct) = player
        .ownership
        .and_then(|o| o.percent_owned)
        .filter(|p| p.is_finite())
    {
        record = record.with_stat(stat::PERCENT_OWNED, pct);
    }
    if let Some(owner) = owners.get(&player.id) {
        record = record.with_owner(owner.clone());
    }
    record
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
