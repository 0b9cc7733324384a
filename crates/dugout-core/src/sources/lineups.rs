// FanGraphs past-lineup payloads: the league-play service.
//
// Each team's recent lineups become one record per hitter, with the number
// of lineups the hitter appeared in as the `appearances` stat.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::player::{stat, RawPlayerRecord, RecordKind, SourceId};
use crate::sources::ProviderError;

/// Canonical MLB abbreviation → FanGraphs team id.
pub const FANGRAPHS_TEAM_IDS: &[(&str, u32)] = &[
    ("LAA", 1),
    ("BAL", 2),
    ("BOS", 3),
    ("CHW", 4),
    ("CLE", 5),
    ("DET", 6),
    ("KCR", 7),
    ("MIN", 8),
    ("NYY", 9),
    ("ATH", 10),
    ("SEA", 11),
    ("TBR", 12),
    ("TEX", 13),
    ("TOR", 14),
    ("ARI", 15),
    ("ATL", 16),
    ("CHC", 17),
    ("CIN", 18),
    ("COL", 19),
    ("MIA", 20),
    ("HOU", 21),
    ("LAD", 22),
    ("MIL", 23),
    ("WSN", 24),
    ("NYM", 25),
    ("PHI", 26),
    ("PIT", 27),
    ("STL", 28),
    ("SDP", 29),
    ("SFG", 30),
];

/// Lineup slots that do not count as an appearance.
const INACTIVE_OVERRIDES: &[&str] = &["INJ", "AAA"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PastLineup {
    #[serde(default)]
    data_players: Vec<LineupPlayer>,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LineupPlayer {
    #[serde(default)]
    player_name: Option<String>,
    #[serde(default)]
    value_override: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

impl LineupPlayer {
    fn is_active(&self) -> bool {
        match &self.value_override {
            Some(v) => !INACTIVE_OVERRIDES.contains(&v.trim()),
            None => true,
        }
    }
}

/// Parse one team's past-lineup list into league-play records.
pub fn parse_past_lineups(team: &str, payload: &Value) -> Result<Vec<RawPlayerRecord>, ProviderError> {
    let lineups = Vec::<PastLineup>::deserialize(payload)
        .map_err(|e| ProviderError::decode(SourceId::LeaguePlay, format!("{team}: {e}")))?;

    // name -> (appearances, first listed position)
    let mut seen: BTreeMap<String, (u32, String)> = BTreeMap::new();
    for lineup in &lineups {
        for player in lineup.data_players.iter().filter(|p| p.is_active()) {
            let Some(name) = player.player_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let entry = seen.entry(name.to_string()).or_insert((0, String::new()));
            entry.0 += 1;
            if entry.1.is_empty() {
                if let Some(pos) = &player.position {
                    entry.1 = pos.trim().to_string();
                }
            }
        }
    }

    debug!(team, lineups = lineups.len(), hitters = seen.len(), "parsed past lineups");
    Ok(seen
        .into_iter()
        .map(|(name, (count, position))| {
            RawPlayerRecord::new(SourceId::LeaguePlay, name, team, position)
                .with_kind(RecordKind::Batter)
                .with_stat(stat::APPEARANCES, f64::from(count))
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_appearances_across_lineups() {
        let payload = json!([
            { "dataPlayers": [
                { "playerName": "Mookie Betts", "position": "SS" },
                { "playerName": "Freddie Freeman", "position": "1B" },
                { "playerName": "Injured Guy", "valueOverride": "INJ" }
            ]},
            { "dataPlayers": [
                { "playerName": "Mookie Betts", "position": "2B" },
                { "playerName": "Prospect", "valueOverride": "AAA" },
                { "playerName": "" },
                { "valueOverride": "" }
            ]},
            { "date": "2025-04-01" }
        ]);
        let records = parse_past_lineups("LAD", &payload).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.raw_name.as_str()).collect();
        assert_eq!(names, vec!["Freddie Freeman", "Mookie Betts"]);

        let betts = &records[1];
        assert_eq!(betts.source_id, SourceId::LeaguePlay);
        assert_eq!(betts.team, "LAD");
        assert_eq!(betts.position, "SS");
        assert_eq!(betts.kind, RecordKind::Batter);
        assert_eq!(betts.stats[stat::APPEARANCES], 2.0);
    }

    #[test]
    fn non_list_payload_is_a_decode_error() {
        let err = parse_past_lineups("NYY", &json!({ "error": "rate limited" })).unwrap_err();
        assert_eq!(err.source_id(), SourceId::LeaguePlay);
        assert!(err.to_string().contains("NYY"));
    }

    #[test]
    fn team_id_table_covers_thirty_franchises() {
        assert_eq!(FANGRAPHS_TEAM_IDS.len(), 30);
        assert!(FANGRAPHS_TEAM_IDS.iter().any(|(t, id)| *t == "SFG" && *id == 30));
    }
}
