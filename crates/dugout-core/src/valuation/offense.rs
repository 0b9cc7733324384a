// Team offense profiles from recent lineups.
//
// Each hitter's projected points per PA is weighted by how often the
// league-play service saw the hitter in the team's recent lineups. The profile's
// expected points are what that lineup scores against an average starter.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::player::{stat, RecordKind, SourceId};

/// Average innings pitched by a starter.
pub const AVG_STARTER_INNINGS: f64 = 5.5;
/// Average plate appearances per inning.
pub const AVG_PA_PER_INNING: f64 = 4.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOffense {
    pub team: String,
    /// Appearance-weighted mean projected points per plate appearance.
    pub avg_pts_per_pa: f64,
    /// Expected points scored against one starter.
    pub expected_points: f64,
    pub appearances: f64,
    pub hitters: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OffenseTable {
    teams: BTreeMap<String, TeamOffense>,
}

/// Projected points per PA: the explicit rate, else points over PA.
pub fn projected_pts_per_pa(player: &UnifiedPlayer) -> Option<f64> {
    let rate = player
        .stat(RecordKind::Batter, SourceId::Projections, stat::PTS_PER_PA)
        .or_else(|| {
            let pts = player.stat(RecordKind::Batter, SourceId::Projections, stat::PROJ_PTS)?;
            let pa = player.stat(RecordKind::Batter, SourceId::Projections, stat::PA)?;
            (pa > 0.0).then(|| pts / pa)
        })?;
    rate.is_finite().then_some(rate)
}

impl OffenseTable {
    /// Build profiles for every team with at least one lineup appearance by
    /// a hitter who also has a projection.
    pub fn from_database(db: &PlayerDatabase, starter_innings: f64, pa_per_inning: f64) -> Self {
        // team -> (weighted points, appearances, hitters)
        let mut totals: BTreeMap<String, (f64, f64, usize)> = BTreeMap::new();
        let mut unmatched = 0usize;

        for player in db.iter() {
            let Some(appearances) = player
                .stat(RecordKind::Batter, SourceId::LeaguePlay, stat::APPEARANCES)
                .filter(|a| a.is_finite() && *a > 0.0)
            else {
                continue;
            };
            if player.team.is_empty() {
                continue;
            }
            let Some(rate) = projected_pts_per_pa(player) else {
                unmatched += 1;
                debug!(player = %player.canonical_id, "lineup hitter has no projection");
                continue;
            };
            let entry = totals.entry(player.team.clone()).or_insert((0.0, 0.0, 0));
            entry.0 += rate * appearances;
            entry.1 += appearances;
            entry.2 += 1;
        }

        if unmatched > 0 {
            warn!(unmatched, "lineup hitters without projections were left out of team offense");
        }

        let expected_pa = starter_innings * pa_per_inning;
        let teams = totals
            .into_iter()
            .map(|(team, (weighted, appearances, hitters))| {
                let avg = weighted / appearances;
                let profile = TeamOffense {
                    team: team.clone(),
                    avg_pts_per_pa: avg,
                    expected_points: avg * expected_pa,
                    appearances,
                    hitters,
                };
                (team, profile)
            })
            .collect();
        OffenseTable { teams }
    }

    pub fn get(&self, team: &str) -> Option<&TeamOffense> {
        self.teams.get(team)
    }

    pub fn expected_points(&self, team: &str) -> Option<f64> {
        self.get(team).map(|t| t.expected_points)
    }

    /// Profiles, strongest offense first.
    pub fn ranked(&self) -> Vec<&TeamOffense> {
        let mut teams: Vec<&TeamOffense> = self.teams.values().collect();
        teams.sort_by(|a, b| {
            b.expected_points
                .total_cmp(&a.expected_points)
                .then_with(|| a.team.cmp(&b.team))
        });
        teams
    }

    pub fn len(&self) -> usize {
        self.teams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
