// MLB Stats API schedule payloads: probable starting pitchers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("schedule request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("schedule returned HTTP {status}")]
    Status { status: u16 },

    #[error("could not decode schedule: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One announced start, as named by the schedule provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbableStart {
    pub date: NaiveDate,
    pub pitcher_name: String,
    /// The pitcher's team.
    pub team: String,
    pub opponent: String,
    /// Home team of the game.
    pub park: String,
}

#[derive(Debug, Deserialize)]
struct Schedule {
    #[serde(default)]
    dates: Vec<ScheduleDate>,
}

#[derive(Debug, Deserialize)]
struct ScheduleDate {
    date: String,
    #[serde(default)]
    games: Vec<Game>,
}

#[derive(Debug, Deserialize)]
struct Game {
    teams: GameTeams,
    #[serde(flatten)]
    _extra: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GameTeams {
    away: GameSide,
    home: GameSide,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameSide {
    team: TeamRef,
    #[serde(default)]
    probable_pitcher: Option<PersonRef>,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    #[serde(default)]
    abbreviation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonRef {
    #[serde(default)]
    full_name: String,
}

fn announced(side: &GameSide) -> Option<&str> {
    let name = side.probable_pitcher.as_ref()?.full_name.trim();
    (!name.is_empty() && !name.eq_ignore_ascii_case("TBD")).then_some(name)
}

/// Every announced start in the payload, away side first within a game.
/// Unannounced (TBD) starters and dates that fail to parse are skipped.
pub fn parse_schedule(payload: &Value) -> Result<Vec<ProbableStart>, ScheduleError> {
    let schedule = Schedule::deserialize(payload)?;

    let mut starts = Vec::new();
    let mut unannounced = 0usize;
    for day in &schedule.dates {
        let Ok(date) = NaiveDate::parse_from_str(&day.date, "%Y-%m-%d") else {
            warn!(date = %day.date, "skipping schedule date that does not parse");
            continue;
        };
        for game in &day.games {
            let away = &game.teams.away;
            let home = &game.teams.home;
            let park = home.team.abbreviation.clone();
            for (side, opponent) in [(away, home), (home, away)] {
                match announced(side) {
                    Some(name) => starts.push(ProbableStart {
                        date,
                        pitcher_name: name.to_string(),
                        team: side.team.abbreviation.clone(),
                        opponent: opponent.team.abbreviation.clone(),
                        park: park.clone(),
                    }),
                    None => unannounced += 1,
                }
            }
        }
    }

    debug!(starts = starts.len(), unannounced, "parsed schedule");
    Ok(starts)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn side(abbr: &str, pitcher: Option<&str>) -> Value {
        match pitcher {
            Some(name) => json!({ "team": { "abbreviation": abbr }, "probablePitcher": { "fullName": name } }),
            None => json!({ "team": { "abbreviation": abbr } }),
        }
    }

    #[test]
    fn both_sides_of_a_game() {
        let payload = json!({
            "dates": [ { "date": "2025-06-01", "games": [
                { "gamePk": 1, "teams": { "away": side("NYY", Some("Gerrit Cole")), "home": side("BOS", Some("Brayan Bello")) } }
            ] } ]
        });
        let starts = parse_schedule(&payload).unwrap();
        assert_eq!(starts.len(), 2);
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(
            starts[0],
            ProbableStart {
                date,
                pitcher_name: "Gerrit Cole".into(),
                team: "NYY".into(),
                opponent: "BOS".into(),
                park: "BOS".into(),
            }
        );
        assert_eq!(starts[1].pitcher_name, "Brayan Bello");
        assert_eq!(starts[1].opponent, "NYY");
        assert_eq!(starts[1].park, "BOS");
    }

    #[test]
    fn unannounced_starters_skipped() {
        let payload = json!({
            "dates": [
                { "date": "2025-06-02", "games": [
                    { "teams": { "away": side("SF", None), "home": side("LAD", Some("TBD")) } },
                    { "teams": { "away": side("SEA", Some("  ")), "home": side("HOU", Some("Framber Valdez")) } }
                ] },
                { "date": "June 3", "games": [
                    { "teams": { "away": side("CHC", Some("A")), "home": side("STL", Some("B")) } }
                ] }
            ]
        });
        let starts = parse_schedule(&payload).unwrap();
        assert_eq!(starts.len(), 1);
        assert_eq!(starts[0].pitcher_name, "Framber Valdez");
        assert_eq!(starts[0].opponent, "SEA");
    }

    #[test]
    fn empty_and_malformed_payloads() {
        assert!(parse_schedule(&json!({})).unwrap().is_empty());
        assert!(parse_schedule(&json!({ "dates": "nope" })).is_err());
    }
}
