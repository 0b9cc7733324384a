// Post-trade pickups: free agents worth adding once a trade goes through.
//
// The post-trade roster is optimized alone and again alongside the best
// free agents. Each free agent who starts in the combined lineup is paired
// with the strongest benched roster player who could have held that slot.
// Sidelined roster players are never offered as drops.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::error::ValidationError;
use crate::player::CanonicalPlayerId;
use crate::valuation::composite::composite_score;
use crate::valuation::lineup::{optimize_lineup, slot_accepts, Lineup, RosterSlots};
use crate::valuation::trade::require_all;
use crate::valuation::waiver::WaiverParams;

/// Free agents considered, best composite first.
pub const FREE_AGENT_POOL: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddDrop {
    pub add: CanonicalPlayerId,
    pub add_name: String,
    /// Slot the added player starts in.
    pub slot: String,
    pub drop: CanonicalPlayerId,
    pub drop_name: String,
    pub improvement: f64,
    pub percent_owned: Option<f64>,
    pub injury_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostTradeWaivers {
    /// Best first.
    pub pickups: Vec<AddDrop>,
    /// Lineup of the post-trade roster as is.
    pub before: Lineup,
    /// Lineup once every pickup is made.
    pub after: Lineup,
    /// `after.total - before.total`.
    pub gain: f64,
}

/// Suggest up to `params.post_trade_limit` add/drop pairs for
/// `roster_after`. Every roster id must exist in `db`.
pub fn post_trade_waivers(
    db: &PlayerDatabase,
    roster_after: &[CanonicalPlayerId],
    slots: &RosterSlots,
    params: &WaiverParams,
) -> Result<PostTradeWaivers, ValidationError> {
    if params.post_trade_limit == 0 {
        return Err(ValidationError::InvalidParameter {
            field: "waiver.post_trade_limit".into(),
            message: "must be greater than 0".into(),
        });
    }
    let weights = &params.weights;
    let roster = require_all(db, roster_after)?;
    let on_roster: BTreeSet<&CanonicalPlayerId> = roster_after.iter().collect();

    let mut pool: Vec<(&UnifiedPlayer, f64)> = db
        .iter()
        .filter(|p| !p.is_rostered() && !on_roster.contains(&p.canonical_id))
        .filter(|p| params.include_injured || !p.is_injured())
        .map(|p| (p, composite_score(p, weights)))
        .collect();
    pool.sort_by(|(a, va), (b, vb)| vb.total_cmp(va).then_with(|| a.canonical_id.cmp(&b.canonical_id)));
    pool.truncate(FREE_AGENT_POOL);

    let before = optimize_lineup(&roster, slots, weights);
    let combined_players: Vec<&UnifiedPlayer> = roster
        .iter()
        .copied()
        .chain(pool.iter().map(|(p, _)| *p))
        .collect();
    let combined = optimize_lineup(&combined_players, slots, weights);

    // Starters are listed slot by slot; strongest additions pick drops first.
    let mut additions: Vec<(&UnifiedPlayer, &str, f64)> = combined
        .starters
        .iter()
        .filter_map(|a| {
            let (player, value) = pool.iter().find(|(p, _)| p.canonical_id == a.player)?;
            Some((*player, a.slot.as_str(), *value))
        })
        .collect();
    additions.sort_by(|(a, _, va), (b, _, vb)| vb.total_cmp(va).then_with(|| a.canonical_id.cmp(&b.canonical_id)));

    let mut dropped: BTreeSet<&CanonicalPlayerId> = BTreeSet::new();
    let mut pickups = Vec::new();
    for (add, slot, add_value) in additions {
        let released = roster
            .iter()
            .filter(|p| !p.is_injured() && !combined.is_starting(&p.canonical_id))
            .filter(|p| !dropped.contains(&p.canonical_id) && slot_accepts(slot, p))
            .map(|p| (*p, composite_score(p, weights)))
            .max_by(|(a, va), (b, vb)| va.total_cmp(vb).then_with(|| b.canonical_id.cmp(&a.canonical_id)));
        let Some((out, out_value)) = released else {
            continue;
        };
        let improvement = add_value - out_value;
        if improvement <= 0.0 {
            continue;
        }
        dropped.insert(&out.canonical_id);
        pickups.push(AddDrop {
            add: add.canonical_id.clone(),
            add_name: add.display_name.clone(),
            slot: slot.to_string(),
            drop: out.canonical_id.clone(),
            drop_name: out.display_name.clone(),
            improvement,
            percent_owned: add.percent_owned,
            injury_status: add.injury_status.clone(),
        });
    }
    pickups.sort_by(|a, b| b.improvement.total_cmp(&a.improvement).then_with(|| a.add.cmp(&b.add)));
    pickups.truncate(params.post_trade_limit);

    let released: BTreeSet<&CanonicalPlayerId> = pickups.iter().map(|p| &p.drop).collect();
    let added: BTreeSet<&CanonicalPlayerId> = pickups.iter().map(|p| &p.add).collect();
    let final_roster: Vec<&UnifiedPlayer> = roster
        .iter()
        .copied()
        .filter(|p| !released.contains(&p.canonical_id))
        .chain(pool.iter().map(|(p, _)| *p).filter(|p| added.contains(&p.canonical_id)))
        .collect();
    let after = optimize_lineup(&final_roster, slots, weights);
    let gain = after.total - before.total;

    debug!(
        roster = roster_after.len(),
        pool = pool.len(),
        pickups = pickups.len(),
        gain,
        "post-trade pickups ranked"
    );

    Ok(PostTradeWaivers {
        pickups,
        before,
        after,
        gain,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ResolvedPlayers;
    use crate::player::{stat, InjuryField, RawPlayerRecord, SourceId};
    use crate::teams::TeamTable;
    use crate::valuation::trade::{roster_after, TradeProposal};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn id(s: &str) -> CanonicalPlayerId {
        CanonicalPlayerId::new(s)
    }

    fn ids(list: &[&str]) -> Vec<CanonicalPlayerId> {
        list.iter().map(|s| id(s)).collect()
    }

    /// (id, position, points, owner, injury)
    fn db(rows: &[(&str, &str, f64, Option<&str>, Option<&str>)]) -> PlayerDatabase {
        let resolved: ResolvedPlayers = rows
            .iter()
            .map(|(name, pos, pts, owner, injury)| {
                let mut roster = RawPlayerRecord::new(SourceId::Roster, *name, "NYY", *pos)
                    .with_injury(InjuryField::Reported(injury.map(String::from)));
                if let Some(owner) = owner {
                    roster = roster.with_owner(*owner);
                }
                let projection =
                    RawPlayerRecord::new(SourceId::Projections, *name, "NYY", *pos).with_stat(stat::PROJ_PTS, *pts);
                (id(name), vec![roster, projection])
            })
            .collect();
        PlayerDatabase::build(resolved, &TeamTable::mlb())
    }

    fn slots() -> RosterSlots {
        RosterSlots::from_counts(
            &[("SS".to_string(), 1), ("OF".to_string(), 2), ("UTIL".to_string(), 1), ("SP".to_string(), 1)].into(),
        )
    }

    fn league() -> PlayerDatabase {
        db(&[
            ("my-ss", "SS", 200.0, Some("Mine"), None),
            ("my-of1", "OF", 180.0, Some("Mine"), None),
            ("my-of2", "OF", 60.0, Some("Mine"), None),
            ("my-of3", "OF", 40.0, Some("Mine"), None),
            ("my-sp", "SP", 150.0, Some("Mine"), None),
            ("my-sp2", "SP", 30.0, Some("Mine"), None),
            ("their-of", "OF", 170.0, Some("Theirs"), None),
            ("fa-of", "OF", 120.0, None, None),
            ("fa-sp", "SP", 160.0, None, None),
            ("fa-ss", "SS", 50.0, None, None),
            ("fa-il", "OF", 400.0, None, Some("SIXTY_DAY_DL")),
        ])
    }

    #[test]
    fn free_agents_displace_weakest_eligible_bench_players() {
        let db = league();
        let roster = ids(&["my-ss", "my-of1", "my-of2", "my-of3", "my-sp", "my-sp2"]);
        let report = post_trade_waivers(&db, &roster, &slots(), &WaiverParams::default()).unwrap();

        // fa-of takes an OF slot and my-of2 slides to UTIL, so my-of3 goes.
        let pairs: Vec<(&str, &str, &str)> = report
            .pickups
            .iter()
            .map(|p| (p.add.as_str(), p.slot.as_str(), p.drop.as_str()))
            .collect();
        assert_eq!(pairs, vec![("fa-of", "OF", "my-of3"), ("fa-sp", "SP", "my-sp")]);
        assert!(approx_eq(report.pickups[0].improvement, 80.0));
        assert!(approx_eq(report.pickups[1].improvement, 10.0));

        // Before: 200 + 180 + 60 + 40 + 150. After: 200 + 180 + 120 + 60 + 160.
        assert!(approx_eq(report.before.total, 630.0));
        assert!(approx_eq(report.after.total, 720.0));
        assert!(approx_eq(report.gain, 90.0));
        assert!(report.pickups.iter().all(|p| p.add != id("fa-il")));
    }

    #[test]
    fn limit_and_injured_opt_in() {
        let db = league();
        let roster = ids(&["my-ss", "my-of1", "my-of2", "my-of3", "my-sp", "my-sp2"]);
        let params = WaiverParams {
            include_injured: true,
            post_trade_limit: 1,
            ..WaiverParams::default()
        };
        let report = post_trade_waivers(&db, &roster, &slots(), &params).unwrap();
        assert_eq!(report.pickups.len(), 1);
        assert_eq!(report.pickups[0].add, id("fa-il"));
        assert_eq!(report.pickups[0].drop, id("my-of2"));
        assert_eq!(report.pickups[0].injury_status.as_deref(), Some("SIXTY_DAY_DL"));
        assert!(approx_eq(report.pickups[0].improvement, 340.0));
    }

    #[test]
    fn sidelined_roster_players_are_never_dropped() {
        let db = db(&[
            ("my-of", "OF", 90.0, Some("Mine"), Some("TEN_DAY_DL")),
            ("my-of2", "OF", 20.0, Some("Mine"), None),
            ("fa-of", "OF", 100.0, None, None),
        ]);
        let slots = RosterSlots::from_counts(&[("OF".to_string(), 1)].into());
        let report =
            post_trade_waivers(&db, &ids(&["my-of", "my-of2"]), &slots, &WaiverParams::default()).unwrap();
        assert_eq!(report.pickups.len(), 1);
        assert_eq!(report.pickups[0].drop, id("my-of2"));
        assert!(approx_eq(report.pickups[0].improvement, 80.0));
    }

    #[test]
    fn runs_on_the_roster_a_trade_leaves() {
        let db = league();
        let roster = ids(&["my-ss", "my-of1", "my-of2", "my-of3", "my-sp", "my-sp2"]);
        let proposal = TradeProposal::new(ids(&["my-of1"]), ids(&["their-of"]));
        let after = roster_after(&db, &roster, &proposal).unwrap();
        assert_eq!(after.last(), Some(&id("their-of")));
        assert!(!after.contains(&id("my-of1")));

        let report = post_trade_waivers(&db, &after, &slots(), &WaiverParams::default()).unwrap();
        assert!(report.pickups.iter().all(|p| p.drop != id("their-of")));
        assert!(report.gain > 0.0);
    }

    #[test]
    fn no_pickup_when_nothing_beats_the_bench() {
        let db = db(&[
            ("my-ss", "SS", 200.0, Some("Mine"), None),
            ("fa-ss", "SS", 100.0, None, None),
        ]);
        let slots = RosterSlots::from_counts(&[("SS".to_string(), 1)].into());
        let report = post_trade_waivers(&db, &ids(&["my-ss"]), &slots, &WaiverParams::default()).unwrap();
        assert!(report.pickups.is_empty());
        assert!(approx_eq(report.gain, 0.0));
        assert_eq!(report.before, report.after);
    }

    #[test]
    fn unknown_roster_id_and_zero_limit_rejected() {
        let db = league();
        assert_eq!(
            post_trade_waivers(&db, &ids(&["ghost"]), &slots(), &WaiverParams::default()).unwrap_err(),
            ValidationError::UnknownPlayer { id: id("ghost") }
        );
        let params = WaiverParams {
            post_trade_limit: 0,
            ..WaiverParams::default()
        };
        assert!(matches!(
            post_trade_waivers(&db, &ids(&["my-ss"]), &slots(), &params),
            Err(ValidationError::InvalidParameter { .. })
        ));
    }
}
