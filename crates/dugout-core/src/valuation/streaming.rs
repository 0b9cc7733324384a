// Streaming score: rank probable starts for pitchers.
//
// score = pitcher expected points - opponent expected points, where the
// opponent's expected points are scaled by the home park's factor. A start
// with no usable data scores negative infinity and sorts last.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::error::ValidationError;
use crate::player::{stat, CanonicalPlayerId, RecordKind, SourceId};
use crate::teams::TeamTable;
use crate::valuation::offense::{OffenseTable, AVG_PA_PER_INNING, AVG_STARTER_INNINGS};

// ---------------------------------------------------------------------------
// Park factors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ParkFactorError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

/// Run-environment multipliers by home team (1.0 = neutral).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParkFactors {
    factors: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
#[allow(non_snake_case)]
struct RawParkFactor {
    Team: String,
    Factor: f64,
    #[serde(flatten)]
    _extra: HashMap<String, serde_json::Value>,
}

impl ParkFactors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a factor under the team's canonical code. Unknown teams are
    /// ignored.
    pub fn insert(&mut self, team: &str, factor: f64, teams: &TeamTable) {
        if let Some(code) = teams.canonical(team) {
            self.factors.insert(code, factor);
        }
    }

    pub fn get(&self, team: &str) -> Option<f64> {
        self.factors.get(team).copied()
    }

    pub fn factor_or(&self, team: &str, default: f64) -> f64 {
        self.get(team).unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

/// Parse a `Team,Factor` CSV. Malformed and non-positive rows are skipped.
fn load_park_factors_from_reader<R: Read>(rdr: R, teams: &TeamTable) -> Result<ParkFactors, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut parks = ParkFactors::new();
    for result in reader.deserialize::<RawParkFactor>() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("skipping malformed park factor row: {e}");
                continue;
            }
        };
        if !row.Factor.is_finite() || row.Factor <= 0.0 {
            warn!(team = %row.Team, factor = row.Factor, "skipping invalid park factor");
            continue;
        }
        parks.insert(&row.Team, row.Factor, teams);
    }
    Ok(parks)
}

/// Load park factors from `path`. A missing file yields an empty table so
/// every park falls back to the configured default.
pub fn load_park_factors(path: &Path, teams: &TeamTable) -> Result<ParkFactors, ParkFactorError> {
    if !path.exists() {
        warn!(path = %path.display(), "park factor file not found; using default factor");
        return Ok(ParkFactors::new());
    }
    let file = std::fs::File::open(path).map_err(|e| ParkFactorError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_park_factors_from_reader(file, teams).map_err(|e| ParkFactorError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StreamingParams {
    pub starter_innings: f64,
    pub pa_per_inning: f64,
    pub default_park_factor: f64,
    pub park_factors: ParkFactors,
}

impl Default for StreamingParams {
    fn default() -> Self {
        StreamingParams {
            starter_innings: AVG_STARTER_INNINGS,
            pa_per_inning: AVG_PA_PER_INNING,
            default_park_factor: 1.0,
            park_factors: ParkFactors::new(),
        }
    }
}

/// One scheduled start, with team codes already canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamingMatchup {
    pub pitcher: CanonicalPlayerId,
    pub date: NaiveDate,
    pub opponent: String,
    /// Home team of the game; its park factor applies.
    pub park: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamingScore {
    pub pitcher: CanonicalPlayerId,
    pub display_name: String,
    pub team: String,
    pub date: Option<NaiveDate>,
    pub opponent: Option<String>,
    pub park: Option<String>,
    pub pitcher_points: Option<f64>,
    pub opponent_points: Option<f64>,
    pub park_factor: f64,
    /// `f64::NEG_INFINITY` when any input is missing.
    pub score: f64,
}

impl StreamingScore {
    pub fn is_scored(&self) -> bool {
        self.score.is_finite()
    }
}

/// Expected points for one start from the projected points-per-inning rate.
pub fn pitcher_expected_points(player: &UnifiedPlayer, starter_innings: f64) -> Option<f64> {
    let rate = player
        .stat(RecordKind::Pitcher, SourceId::Projections, stat::PTS_PER_IP)
        .or_else(|| {
            let pts = player.stat(RecordKind::Pitcher, SourceId::Projections, stat::PROJ_PTS)?;
            let ip = player.stat(RecordKind::Pitcher, SourceId::Projections, stat::IP)?;
            (ip > 0.0).then(|| pts / ip)
        })?;
    rate.is_finite().then(|| rate * starter_innings)
}

/// Score every scheduled start of the given pitchers.
///
/// Each id must name a pitcher in `db`. A pitcher with no scheduled start
/// still appears once, unscored.
pub fn streaming_scores(
    db: &PlayerDatabase,
    pitchers: &[CanonicalPlayerId],
    schedule: &[StreamingMatchup],
    offense: &OffenseTable,
    params: &StreamingParams,
) -> Result<Vec<StreamingScore>, ValidationError> {
    let mut selected: Vec<&UnifiedPlayer> = Vec::with_capacity(pitchers.len());
    for id in pitchers {
        let player = db.require(id)?;
        if !player.is_pitcher() {
            return Err(ValidationError::NotAPitcher { id: id.clone() });
        }
        if !selected.iter().any(|p| p.canonical_id == *id) {
            selected.push(player);
        }
    }

    let mut scores = Vec::new();
    for player in selected {
        let pitcher_points = pitcher_expected_points(player, params.starter_innings);
        let starts: Vec<&StreamingMatchup> = schedule
            .iter()
            .filter(|m| m.pitcher == player.canonical_id)
            .collect();

        if starts.is_empty() {
            scores.push(StreamingScore {
                pitcher: player.canonical_id.clone(),
                display_name: player.display_name.clone(),
                team: player.team.clone(),
                date: None,
                opponent: None,
                park: None,
                pitcher_points,
                opponent_points: None,
                park_factor: params.default_park_factor,
                score: f64::NEG_INFINITY,
            });
            continue;
        }

        for start in starts {
            let park_factor = params
                .park_factors
                .factor_or(&start.park, params.default_park_factor);
            let opponent_points = offense
                .expected_points(&start.opponent)
                .map(|points| points * park_factor);
            let score = match (pitcher_points, opponent_points) {
                (Some(p), Some(o)) if (p - o).is_finite() => p - o,
                _ => f64::NEG_INFINITY,
            };
            scores.push(StreamingScore {
                pitcher: player.canonical_id.clone(),
                display_name: player.display_name.clone(),
                team: player.team.clone(),
                date: Some(start.date),
                opponent: Some(start.opponent.clone()),
                park: Some(start.park.clone()),
                pitcher_points,
                opponent_points,
                park_factor,
                score,
            });
        }
    }

    scores.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.date.cmp(&b.date))
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.pitcher.cmp(&b.pitcher))
    });

    let unscored = scores.iter().filter(|s| !s.is_scored()).count();
    debug!(starts = scores.len(), unscored, "streaming scores ranked");
    Ok(scores)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
