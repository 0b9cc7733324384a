// Trade impact: change in a team's lineup value from a proposed trade.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::error::ValidationError;
use crate::player::CanonicalPlayerId;
use crate::valuation::composite::{composite_score, CompositeWeights};
use crate::valuation::lineup::{optimize_lineup, Lineup, RosterSlots};

/// Deltas closer than this are called balanced.
pub const BALANCED_THRESHOLD: f64 = 3.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeProposal {
    pub outgoing: Vec<CanonicalPlayerId>,
    pub incoming: Vec<CanonicalPlayerId>,
}

impl TradeProposal {
    pub fn new(outgoing: Vec<CanonicalPlayerId>, incoming: Vec<CanonicalPlayerId>) -> Self {
        TradeProposal { outgoing, incoming }
    }

    /// The same trade seen from the other side.
    pub fn reversed(&self) -> Self {
        TradeProposal {
            outgoing: self.incoming.clone(),
            incoming: self.outgoing.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeImpact {
    pub outgoing_value: f64,
    pub incoming_value: f64,
    pub before: Lineup,
    pub after: Lineup,
    /// `after.total - before.total`.
    pub delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeVerdict {
    WinWin,
    LoseLose,
    Balanced,
    FavorsA,
    FavorsB,
}

impl TradeVerdict {
    /// Classify a two-team trade from each side's lineup delta.
    pub fn classify(delta_a: f64, delta_b: f64) -> Self {
        if delta_a > 0.0 && delta_b > 0.0 {
            TradeVerdict::WinWin
        } else if delta_a < 0.0 && delta_b < 0.0 {
            TradeVerdict::LoseLose
        } else if (delta_a - delta_b).abs() < BALANCED_THRESHOLD {
            TradeVerdict::Balanced
        } else if delta_a > delta_b {
            TradeVerdict::FavorsA
        } else {
            TradeVerdict::FavorsB
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            TradeVerdict::WinWin => "benefits both teams",
            TradeVerdict::LoseLose => "hurts both teams",
            TradeVerdict::Balanced => "fairly balanced",
            TradeVerdict::FavorsA => "favors the first team",
            TradeVerdict::FavorsB => "favors the second team",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwoTeamTrade {
    pub team_a: TradeImpact,
    pub team_b: TradeImpact,
    pub verdict: TradeVerdict,
}

pub(crate) fn require_all<'a>(
    db: &'a PlayerDatabase,
    ids: &[CanonicalPlayerId],
) -> Result<Vec<&'a UnifiedPlayer>, ValidationError> {
    ids.iter().map(|id| db.require(id)).collect()
}

/// The roster left once `proposal` goes through, in roster order with
/// incoming players last.
///
/// Every id must exist in `db`, and every outgoing id must be on `roster`;
/// the first offending id is reported.
pub fn roster_after(
    db: &PlayerDatabase,
    roster: &[CanonicalPlayerId],
    proposal: &TradeProposal,
) -> Result<Vec<CanonicalPlayerId>, ValidationError> {
    require_all(db, &proposal.outgoing)?;
    require_all(db, &proposal.incoming)?;
    require_all(db, roster)?;

    let on_roster: BTreeSet<&CanonicalPlayerId> = roster.iter().collect();
    if let Some(id) = proposal.outgoing.iter().find(|id| !on_roster.contains(id)) {
        return Err(ValidationError::NotOnRoster { id: id.clone() });
    }

    let leaving: BTreeSet<&CanonicalPlayerId> = proposal.outgoing.iter().collect();
    Ok(roster
        .iter()
        .filter(|id| !leaving.contains(id))
        .chain(proposal.incoming.iter())
        .cloned()
        .collect())
}

/// Evaluate `proposal` for the team currently rostering `roster`.
/// Validation follows [`roster_after`]; `db` is only read.
pub fn trade_impact(
    db: &PlayerDatabase,
    roster: &[CanonicalPlayerId],
    proposal: &TradeProposal,
    slots: &RosterSlots,
    weights: &CompositeWeights,
) -> Result<TradeImpact, ValidationError> {
    let after_ids = roster_after(db, roster, proposal)?;
    let outgoing = require_all(db, &proposal.outgoing)?;
    let incoming = require_all(db, &proposal.incoming)?;
    let current = require_all(db, roster)?;
    let after_roster = require_all(db, &after_ids)?;

    let before = optimize_lineup(&current, slots, weights);
    let after = optimize_lineup(&after_roster, slots, weights);
    let sum = |players: &[&UnifiedPlayer]| -> f64 {
        players.iter().map(|p| composite_score(p, weights)).sum()
    };
    let impact = TradeImpact {
        outgoing_value: sum(&outgoing),
        incoming_value: sum(&incoming),
        delta: after.total - before.total,
        before,
        after,
    };
    debug!(
        outgoing = proposal.outgoing.len(),
        incoming = proposal.incoming.len(),
        delta = impact.delta,
        "trade impact computed"
    );
    Ok(impact)
}

/// Evaluate a trade where team A sends `proposal.outgoing` to team B and
/// receives `proposal.incoming` from it.
pub fn two_team_trade(
    db: &PlayerDatabase,
    roster_a: &[CanonicalPlayerId],
    roster_b: &[CanonicalPlayerId],
    proposal: &TradeProposal,
    slots: &RosterSlots,
    weights: &CompositeWeights,
) -> Result<TwoTeamTrade, ValidationError> {
    let team_a = trade_impact(db, roster_a, proposal, slots, weights)?;
    let team_b = trade_impact(db, roster_b, &proposal.reversed(), slots, weights)?;
    let verdict = TradeVerdict::classify(team_a.delta, team_b.delta);
    Ok(TwoTeamTrade {
        team_a,
        team_b,
        verdict,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
