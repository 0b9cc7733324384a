// Greedy lineup optimizer.
//
// Players are ranked by composite score; each roster slot, in slot order,
// takes the best eligible players not yet placed. Whoever is left sits on
// the bench. A team's value is the summed composite of its starters.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::database::UnifiedPlayer;
use crate::player::{CanonicalPlayerId, Position};
use crate::valuation::composite::{composite_score, CompositeWeights};

/// Fill order for starting slots. Specific positions come before the flex
/// slots so a flex slot never takes a player a specific slot needed.
pub const SLOT_ORDER: &[&str] = &["C", "1B", "2B", "3B", "SS", "OF", "DH", "UTIL", "SP", "RP", "P"];

/// Roster keys that are not starting slots.
const NON_STARTING: &[&str] = &["BN", "BE", "IL", "NA"];

// ---------------------------------------------------------------------------
// Roster slots
// ---------------------------------------------------------------------------

/// Starting slots with their counts, in fill order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSlots(Vec<(String, usize)>);

impl Default for RosterSlots {
    fn default() -> Self {
        RosterSlots(
            [("C", 1), ("1B", 1), ("2B", 1), ("3B", 1), ("SS", 1), ("OF", 3), ("UTIL", 1), ("SP", 5), ("RP", 2)]
                .into_iter()
                .map(|(slot, count)| (slot.to_string(), count))
                .collect(),
        )
    }
}

impl RosterSlots {
    /// Build from a league roster map (slot key → count). Bench and injured
    /// slots are dropped; unknown keys fill after the known ones.
    pub fn from_counts(counts: &HashMap<String, usize>) -> Self {
        let mut slots: Vec<(String, usize)> = counts
            .iter()
            .map(|(key, &count)| (key.trim().to_uppercase(), count))
            .filter(|(key, count)| *count > 0 && !NON_STARTING.contains(&key.as_str()))
            .collect();
        slots.sort_by(|(a, _), (b, _)| {
            let rank = |key: &str| SLOT_ORDER.iter().position(|s| *s == key).unwrap_or(SLOT_ORDER.len());
            rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
        });
        RosterSlots(slots)
    }

    pub fn slots(&self) -> &[(String, usize)] {
        &self.0
    }

    pub fn starters(&self) -> usize {
        self.0.iter().map(|(_, count)| count).sum()
    }
}

/// Whether `player` may start in `slot`.
pub fn slot_accepts(slot: &str, player: &UnifiedPlayer) -> bool {
    match slot {
        "UTIL" => player.is_hitter(),
        "P" => player.is_pitcher(),
        other => Position::from_str_pos(other).is_some_and(|pos| player.positions.contains(pos)),
    }
}

// ---------------------------------------------------------------------------
// Lineup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotAssignment {
    pub slot: String,
    pub player: CanonicalPlayerId,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Lineup {
    pub starters: Vec<SlotAssignment>,
    pub bench: Vec<CanonicalPlayerId>,
    /// Summed composite of the starters.
    pub total: f64,
}

impl Lineup {
    pub fn slot_of(&self, id: &CanonicalPlayerId) -> Option<&str> {
        self.starters
            .iter()
            .find(|a| &a.player == id)
            .map(|a| a.slot.as_str())
    }

    pub fn is_starting(&self, id: &CanonicalPlayerId) -> bool {
        self.slot_of(id).is_some()
    }
}

/// Place `players` into `slots` greedily. Duplicate ids count once.
pub fn optimize_lineup(
    players: &[&UnifiedPlayer],
    slots: &RosterSlots,
    weights: &CompositeWeights,
) -> Lineup {
    let mut seen = BTreeSet::new();
    let mut ranked: Vec<(&UnifiedPlayer, f64)> = players
        .iter()
        .filter(|p| seen.insert(p.canonical_id.clone()))
        .map(|p| (*p, composite_score(p, weights)))
        .collect();
    ranked.sort_by(|(a, va), (b, vb)| vb.total_cmp(va).then_with(|| a.canonical_id.cmp(&b.canonical_id)));

    let mut placed = vec![false; ranked.len()];
    let mut lineup = Lineup::default();

    for (slot, count) in slots.slots() {
        let mut filled = 0;
        for (i, (player, value)) in ranked.iter().enumerate() {
            if filled == *count {
                break;
            }
            if placed[i] || !slot_accepts(slot, player) {
                continue;
            }
            placed[i] = true;
            filled += 1;
            lineup.total += value;
            lineup.starters.push(SlotAssignment {
                slot: slot.clone(),
                player: player.canonical_id.clone(),
                value: *value,
            });
        }
    }

    lineup.bench = ranked
        .iter()
        .zip(&placed)
        .filter(|(_, placed)| !**placed)
        .map(|((p, _), _)| p.canonical_id.clone())
        .collect();
    lineup
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
