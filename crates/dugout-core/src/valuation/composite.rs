// Composite score: one rankable number per player.
//
// A weighted sum over (source, stat) pairs, computed separately for the
// batting and pitching families and added together for two-way players.
// Missing stats contribute nothing.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::database::{SourceStats, UnifiedPlayer};
use crate::player::{stat, RecordKind, SourceId};

/// Stat → weight, per source.
pub type SourceWeights = BTreeMap<SourceId, BTreeMap<String, f64>>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompositeWeights {
    pub batting: SourceWeights,
    pub pitching: SourceWeights,
    /// Stat used as the recent sample size for hitters.
    pub batting_sample_stat: String,
    /// Stat used as the recent sample size for pitchers.
    pub pitching_sample_stat: String,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        let single = |source: SourceId, stat: &str| -> SourceWeights {
            let mut stats = BTreeMap::new();
            stats.insert(stat.to_string(), 1.0);
            BTreeMap::from([(source, stats)])
        };
        CompositeWeights {
            batting: single(SourceId::Projections, stat::PROJ_PTS),
            pitching: single(SourceId::Projections, stat::PROJ_PTS),
            batting_sample_stat: stat::PA.to_string(),
            pitching_sample_stat: stat::IP.to_string(),
        }
    }
}

impl CompositeWeights {
    fn family(&self, kind: RecordKind) -> &SourceWeights {
        match kind {
            RecordKind::Batter => &self.batting,
            RecordKind::Pitcher => &self.pitching,
        }
    }

    fn sample_stat(&self, kind: RecordKind) -> &str {
        match kind {
            RecordKind::Batter => &self.batting_sample_stat,
            RecordKind::Pitcher => &self.pitching_sample_stat,
        }
    }
}

fn weighted_sum(stats: &SourceStats, weights: &SourceWeights) -> f64 {
    weights
        .iter()
        .filter_map(|(source, stat_weights)| Some((stats.get(source)?, stat_weights)))
        .flat_map(|(line, stat_weights)| {
            stat_weights
                .iter()
                .filter_map(move |(name, weight)| line.get(name).map(|v| v * weight))
        })
        .filter(|v| v.is_finite())
        .sum()
}

/// Composite score of a player under `weights`.
pub fn composite_score(player: &UnifiedPlayer, weights: &CompositeWeights) -> f64 {
    [RecordKind::Batter, RecordKind::Pitcher]
        .into_iter()
        .filter_map(|kind| Some(weighted_sum(player.stats(kind)?, weights.family(kind))))
        .sum()
}

/// Recent sample size: the configured sample stat from the most
/// authoritative source reporting it, summed over both families.
pub fn sample_size(player: &UnifiedPlayer, weights: &CompositeWeights) -> f64 {
    [RecordKind::Batter, RecordKind::Pitcher]
        .into_iter()
        .filter_map(|kind| player.first_stat(kind, weights.sample_stat(kind)))
        .filter(|v| v.is_finite())
        .sum()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
