// Waiver replacement: unrostered players who would outscore a rostered one.
//
// Sidelined free agents are left out unless asked for. A sidelined
// rostered player can be replaced by any eligible free agent, whatever the
// composite comparison says.

use serde::Serialize;
use tracing::debug;

use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::error::ValidationError;
use crate::player::{CanonicalPlayerId, Position};
use crate::valuation::composite::{composite_score, sample_size, CompositeWeights};

#[derive(Debug, Clone, PartialEq)]
pub struct WaiverParams {
    /// Maximum number of candidates returned.
    pub limit: usize,
    pub weights: CompositeWeights,
    /// Offer free agents who are on the injured list or suspended.
    pub include_injured: bool,
    /// Maximum add/drop pairs suggested after a trade.
    pub post_trade_limit: usize,
}

impl Default for WaiverParams {
    fn default() -> Self {
        WaiverParams {
            limit: 10,
            weights: CompositeWeights::default(),
            include_injured: false,
            post_trade_limit: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiverCandidate {
    pub canonical_id: CanonicalPlayerId,
    pub display_name: String,
    pub team: String,
    pub position: String,
    pub injury_status: Option<String>,
    pub percent_owned: Option<f64>,
    pub composite: f64,
    pub sample_size: f64,
    /// Composite gain over the player being replaced.
    pub improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaiverReplacement {
    pub target: CanonicalPlayerId,
    pub target_composite: f64,
    /// A sidelined target; candidates then need not outscore it.
    pub target_injured: bool,
    /// Best first.
    pub candidates: Vec<WaiverCandidate>,
}

/// Whether `candidate` could take over `target`'s lineup slot: a shared
/// position, the pitcher family, or any hitter for a DH.
pub fn can_replace(target: &UnifiedPlayer, candidate: &UnifiedPlayer) -> bool {
    if target.positions.is_empty() {
        return (target.is_hitter() && candidate.is_hitter())
            || (target.is_pitcher() && candidate.is_pitcher());
    }
    let shares_position = target
        .positions
        .positions()
        .iter()
        .any(|p| candidate.positions.contains(*p));
    shares_position
        || (target.positions.has_pitcher() && candidate.is_pitcher())
        || (target.positions.contains(Position::DesignatedHitter) && candidate.is_hitter())
}

/// Rank unrostered players who can replace `target` and outscore it.
/// When `target` is sidelined every eligible candidate qualifies, and
/// `improvement` may be negative.
///
/// Order: composite descending, then recent sample size descending, then
/// display name, then canonical id.
pub fn waiver_replacements(
    db: &PlayerDatabase,
    target: &CanonicalPlayerId,
    params: &WaiverParams,
) -> Result<WaiverReplacement, ValidationError> {
    if params.limit == 0 {
        return Err(ValidationError::InvalidParameter {
            field: "waiver.limit".into(),
            message: "must be greater than 0".into(),
        });
    }
    let current = db.require(target)?;
    if !current.is_rostered() {
        return Err(ValidationError::NotRostered { id: target.clone() });
    }
    let target_composite = composite_score(current, &params.weights);
    let target_injured = current.is_injured();

    let mut candidates: Vec<WaiverCandidate> = db
        .iter()
        .filter(|p| !p.is_rostered() && p.canonical_id != *target && can_replace(current, p))
        .filter(|p| params.include_injured || !p.is_injured())
        .map(|p| {
            let composite = composite_score(p, &params.weights);
            WaiverCandidate {
                canonical_id: p.canonical_id.clone(),
                display_name: p.display_name.clone(),
                team: p.team.clone(),
                position: p.position.clone(),
                injury_status: p.injury_status.clone(),
                percent_owned: p.percent_owned,
                composite,
                sample_size: sample_size(p, &params.weights),
                improvement: composite - target_composite,
            }
        })
        .filter(|c| target_injured || c.composite > target_composite)
        .collect();

    candidates.sort_by(|a, b| {
        b.composite
            .total_cmp(&a.composite)
            .then_with(|| b.sample_size.total_cmp(&a.sample_size))
            .then_with(|| a.display_name.cmp(&b.display_name))
            .then_with(|| a.canonical_id.cmp(&b.canonical_id))
    });
    candidates.truncate(params.limit);

    debug!(
        target = %target,
        target_composite,
        target_injured,
        candidates = candidates.len(),
        "waiver replacements ranked"
    );

    Ok(WaiverReplacement {
        target: target.clone(),
        target_composite,
        target_injured,
        candidates,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
