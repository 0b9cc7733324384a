// Integration tests for the dugout core.
//
// Provider payloads under tests/fixtures go through the real parsers, then
// through mock adapters into an AnalysisSession, so these tests cover the
// whole path from fetch cycle to valuation results.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use dugout_core::error::{FieldAccessError, ValidationError};
use dugout_core::identity::{AliasOverrides, IdentityResolver};
use dugout_core::pipeline::{FetchOutcome, FetchPolicy};
use dugout_core::player::{stat, CanonicalPlayerId, InjuryField, RawPlayerRecord, RecordKind, SourceId};
use dugout_core::session::{AnalysisRequest, AnalysisSession, SessionSettings};
use dugout_core::sources::espn::{parse_players, parse_roster_owners};
use dugout_core::sources::fangraphs::parse_projections;
use dugout_core::sources::lineups::parse_past_lineups;
use dugout_core::sources::schedule::{parse_schedule, ProbableStart};
use dugout_core::sources::{ProviderError, SourceAdapter};
use dugout_core::teams::TeamTable;
use dugout_core::valuation::composite::CompositeWeights;
use dugout_core::valuation::lineup::RosterSlots;
use dugout_core::valuation::trade::TradeProposal;
use dugout_core::valuation::waiver::WaiverParams;
use dugout_core::valuation::ValuationResult;

// ===========================================================================
// Test helpers
// ===========================================================================

/// Fixture directory path (relative to the package root, which is the cwd
/// for `cargo test`).
const FIXTURES: &str = "tests/fixtures";

fn fixture(name: &str) -> Value {
    let path = format!("{FIXTURES}/{name}");
    let content = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("{path}: {e}"))
}

fn id(s: &str) -> CanonicalPlayerId {
    CanonicalPlayerId::new(s)
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn roster_records() -> Vec<RawPlayerRecord> {
    let owners = parse_roster_owners(&fixture("espn_rosters.json")).unwrap();
    parse_players(&fixture("espn_players.json"), &owners).unwrap()
}

fn projection_records() -> Vec<RawPlayerRecord> {
    let mut records = parse_projections(&fixture("projections_pit.json"), RecordKind::Pitcher).unwrap();
    records.extend(parse_projections(&fixture("projections_bat.json"), RecordKind::Batter).unwrap());
    records
}

fn lineup_records() -> Vec<RawPlayerRecord> {
    let mut records = Vec::new();
    for team in ["NYY", "ATL", "BOS"] {
        let payload = fixture(&format!("lineups_{}.json", team.to_lowercase()));
        records.extend(parse_past_lineups(team, &payload).unwrap());
    }
    records
}

fn schedule() -> Vec<ProbableStart> {
    parse_schedule(&fixture("schedule.json")).unwrap()
}

/// Serves a fixed set of records.
struct FixtureAdapter {
    source: SourceId,
    records: Vec<RawPlayerRecord>,
}

#[async_trait]
impl SourceAdapter for FixtureAdapter {
    fn source_id(&self) -> SourceId {
        self.source
    }

    async fn fetch(&self, _: &str, _: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        Ok(self.records.clone())
    }
}

struct DownAdapter(SourceId);

#[async_trait]
impl SourceAdapter for DownAdapter {
    fn source_id(&self) -> SourceId {
        self.0
    }

    async fn fetch(&self, _: &str, _: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        Err(ProviderError::Status {
            source_id: self.0,
            status: 503,
            url: "http://provider.test".into(),
        })
    }
}

struct HangingAdapter(SourceId);

#[async_trait]
impl SourceAdapter for HangingAdapter {
    fn source_id(&self) -> SourceId {
        self.0
    }

    async fn fetch(&self, _: &str, _: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![])
    }
}

fn fixture_adapter(source: SourceId, records: Vec<RawPlayerRecord>) -> Arc<dyn SourceAdapter> {
    Arc::new(FixtureAdapter { source, records })
}

fn all_adapters() -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        fixture_adapter(SourceId::Roster, roster_records()),
        fixture_adapter(SourceId::Projections, projection_records()),
        fixture_adapter(SourceId::LeaguePlay, lineup_records()),
    ]
}

/// A session over `settings` with retries off.
fn session_with(settings: SessionSettings) -> AnalysisSession {
    let settings = SessionSettings {
        fetch: FetchPolicy {
            retry_once: false,
            ..FetchPolicy::default()
        },
        ..settings
    };
    AnalysisSession::new(settings, IdentityResolver::new(TeamTable::mlb(), AliasOverrides::new()))
}

fn new_session() -> AnalysisSession {
    session_with(SessionSettings::new("123456", 2025))
}

async fn refreshed(mut session: AnalysisSession) -> AnalysisSession {
    let summary = session.refresh(&all_adapters()).await;
    assert!(summary.failures.is_empty());
    session
}

async fn loaded_session() -> AnalysisSession {
    refreshed(new_session()).await
}

/// Pitchers valued by projected points per inning instead of totals.
fn rate_weights() -> CompositeWeights {
    let per_inning = BTreeMap::from([(stat::PTS_PER_IP.to_string(), 1.0)]);
    CompositeWeights {
        pitching: BTreeMap::from([(SourceId::Projections, per_inning)]),
        ..CompositeWeights::default()
    }
}

fn slots(pairs: &[(&str, usize)]) -> RosterSlots {
    RosterSlots::from_counts(&pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
}

// ===========================================================================
// Fetch cycle and database build
// ===========================================================================

#[tokio::test]
async fn full_cycle_builds_unified_database() {
    let mut session = new_session();
    let summary = session.refresh(&all_adapters()).await;

    assert_eq!(summary.records_per_source[&SourceId::Roster], 6);
    assert_eq!(summary.records_per_source[&SourceId::Projections], 7);
    assert_eq!(summary.records_per_source[&SourceId::LeaguePlay], 3);
    assert!(summary.absent_sources.is_empty());
    assert_eq!(summary.players, 7);

    let db = session.get_unified_database();
    let judge = db.get(&id("aaron-judge")).unwrap();
    assert_eq!(judge.owner.as_deref(), Some("MINE"));
    assert_eq!(judge.team, "NYY");
    assert_eq!(
        judge.source_coverage,
        BTreeSet::from([SourceId::Roster, SourceId::Projections, SourceId::LeaguePlay])
    );

    let webb = db.get(&id("logan-webb")).unwrap();
    assert_eq!(webb.team, "SFG");
    assert_eq!(webb.owner.as_deref(), Some("Rival Squad"));
    assert!(webb.is_pitcher());

    let wheeler = db.get(&id("zack-wheeler")).unwrap();
    assert_eq!(wheeler.source_coverage, BTreeSet::from([SourceId::Projections]));
    assert!(!wheeler.is_rostered());
}

#[tokio::test]
async fn three_spellings_become_one_player() {
    let session = loaded_session().await;
    let db = session.get_unified_database();

    let smith = db.get(&id("jonathan-smith")).unwrap();
    assert_eq!(smith.display_name, "Jon Smith");
    assert_eq!(smith.team, "ATL");
    assert_eq!(smith.source_coverage.len(), 3);
    assert_eq!(db.iter().filter(|p| p.display_name.contains("Smith")).count(), 1);

    for spelling in ["Jon Smith", "Jonathan Smith", "J. Smith"] {
        assert_eq!(session.identity_for(spelling), Some(id("jonathan-smith")), "{spelling}");
    }
}

#[tokio::test]
async fn accented_roster_name_matches_plain_projection() {
    let session = loaded_session().await;
    let db = session.get_unified_database();
    let jose = db.get(&id("jose-ramirez")).unwrap();
    assert_eq!(jose.display_name, "José Ramírez");
    assert_eq!(
        jose.source_coverage,
        BTreeSet::from([SourceId::Roster, SourceId::Projections])
    );
}

#[test]
fn resolution_ignores_arrival_order() {
    let mut records = roster_records();
    records.extend(projection_records());
    records.extend(lineup_records());

    let build = |records: Vec<RawPlayerRecord>| {
        let mut session = new_session();
        session.rebuild(FetchOutcome {
            records,
            ..FetchOutcome::default()
        });
        session.get_unified_database()
    };

    let baseline = build(records.clone());
    let mut reversed = records.clone();
    reversed.reverse();
    let mut rotated = records.clone();
    rotated.rotate_left(5);

    assert_eq!(build(reversed).players(), baseline.players());
    assert_eq!(build(rotated).players(), baseline.players());
}

#[test]
fn pitcher_with_positionless_roster_row_is_not_a_hitter() {
    let mut records = roster_records();
    records.retain(|r| r.raw_name != "Logan Webb");
    records.push(
        RawPlayerRecord::new(SourceId::Roster, "Logan Webb", "SF", "")
            .with_owner("Rival Squad")
            .with_stat(stat::PERCENT_OWNED, 95.2),
    );
    records.extend(projection_records());

    let mut session = new_session();
    session.rebuild(FetchOutcome {
        records,
        ..FetchOutcome::default()
    });
    let db = session.get_unified_database();
    let webb = db.get(&id("logan-webb")).unwrap();
    assert!(webb.batting_stats.is_none());
    assert!(!webb.is_hitter());
    assert_eq!(webb.position, "SP");
    assert_eq!(webb.percent_owned, Some(95.2));

    let impact = session
        .trade_impact(&[id("logan-webb")], &TradeProposal::default())
        .unwrap();
    assert_eq!(impact.before.slot_of(&id("logan-webb")), Some("SP"));
}

// ===========================================================================
// Partial failure
// ===========================================================================

#[tokio::test]
async fn failed_source_is_absent_and_shrinks_coverage() {
    let mut session = new_session();
    let adapters = vec![
        fixture_adapter(SourceId::Roster, roster_records()),
        Arc::new(DownAdapter(SourceId::Projections)) as Arc<dyn SourceAdapter>,
        fixture_adapter(SourceId::LeaguePlay, lineup_records()),
    ];
    let summary = session.refresh(&adapters).await;

    assert_eq!(summary.absent_sources, BTreeSet::from([SourceId::Projections]));
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].1.contains("503"));

    let db = session.get_unified_database();
    assert!(db.absent_sources().contains(&SourceId::Projections));
    let smith = db.get(&id("jonathan-smith")).unwrap();
    assert_eq!(
        smith.source_coverage,
        BTreeSet::from([SourceId::Roster, SourceId::LeaguePlay])
    );
    assert!(db.get(&id("zack-wheeler")).is_none());
}

#[tokio::test(start_paused = true)]
async fn hanging_source_times_out_without_blocking_others() {
    let mut session = new_session();
    let adapters = vec![
        fixture_adapter(SourceId::Roster, roster_records()),
        fixture_adapter(SourceId::Projections, projection_records()),
        Arc::new(HangingAdapter(SourceId::LeaguePlay)) as Arc<dyn SourceAdapter>,
    ];
    let summary = session.refresh(&adapters).await;

    assert_eq!(summary.absent_sources, BTreeSet::from([SourceId::LeaguePlay]));
    let db = session.get_unified_database();
    let judge = db.get(&id("aaron-judge")).unwrap();
    assert!(!judge.source_coverage.contains(&SourceId::LeaguePlay));
    assert!(session.offense().is_empty());
}

#[tokio::test]
async fn injury_status_degrades_to_none() {
    let session = loaded_session().await;
    let db = session.get_unified_database();

    assert_eq!(
        db.get(&id("spencer-strider")).unwrap().injury_status.as_deref(),
        Some("FIFTEEN_DAY_DL")
    );
    assert_eq!(db.get(&id("jonathan-smith")).unwrap().injury_status, None);

    // No source carries the field for Ramírez or Wheeler; Devers' is malformed.
    for name in ["jose-ramirez", "zack-wheeler", "rafael-devers"] {
        assert_eq!(db.get(&id(name)).unwrap().injury_status, None, "{name}");
    }
    let warned = |name: &str| db.warnings().iter().find(|w| w.canonical_id == id(name)).map(|w| w.error.clone());
    assert!(matches!(warned("jose-ramirez"), Some(FieldAccessError::Missing { .. })));
    assert!(matches!(warned("rafael-devers"), Some(FieldAccessError::Malformed { .. })));
    assert!(warned("aaron-judge").is_none());
}

// ===========================================================================
// Valuation
// ===========================================================================

#[tokio::test]
async fn waiver_suggestions_are_reproducible() {
    let session = loaded_session().await;
    let first = session.waiver_replacements(&id("jose-ramirez")).unwrap();
    let second = session.waiver_replacements(&id("jose-ramirez")).unwrap();
    assert_eq!(first, second);

    assert!(approx_eq(first.target_composite, 550.0));
    let ids: Vec<&str> = first.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["rafael-devers"]);
    assert!(approx_eq(first.candidates[0].improvement, 10.0));
}

#[tokio::test]
async fn waiver_requires_rostered_target() {
    let session = loaded_session().await;
    assert_eq!(
        session.waiver_replacements(&id("zack-wheeler")).unwrap_err(),
        ValidationError::NotRostered { id: id("zack-wheeler") }
    );
}

#[tokio::test]
async fn injured_free_agents_wait_for_opt_in() {
    // Per inning: Strider 2.375 (on the IL), Wheeler 2.37, Webb 2.1.
    let settings = SessionSettings {
        waiver: WaiverParams {
            weights: rate_weights(),
            ..WaiverParams::default()
        },
        ..SessionSettings::new("123456", 2025)
    };
    let session = refreshed(session_with(settings.clone())).await;
    let report = session.waiver_replacements(&id("logan-webb")).unwrap();
    let ids: Vec<&str> = report.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["zack-wheeler"]);
    assert!(!report.target_injured);

    let opted_in = SessionSettings {
        waiver: WaiverParams {
            include_injured: true,
            ..settings.waiver.clone()
        },
        ..settings
    };
    let session = refreshed(session_with(opted_in)).await;
    let report = session.waiver_replacements(&id("logan-webb")).unwrap();
    let ids: Vec<&str> = report.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["spencer-strider", "zack-wheeler"]);
    assert_eq!(report.candidates[0].injury_status.as_deref(), Some("FIFTEEN_DAY_DL"));
}

/// Fixture session with some roster-service injury statuses overridden.
fn session_with_injuries(statuses: &[(&str, &str)]) -> AnalysisSession {
    let mut records = roster_records();
    for (name, status) in statuses {
        for record in records.iter_mut().filter(|r| r.raw_name == *name) {
            record.injury_status = InjuryField::Reported(Some(status.to_string()));
        }
    }
    records.extend(projection_records());
    let mut session = new_session();
    session.rebuild(FetchOutcome {
        records,
        ..FetchOutcome::default()
    });
    session
}

#[test]
fn injured_rostered_player_is_always_replaceable() {
    // Strider stays out while on the IL.
    let session = session_with_injuries(&[("Logan Webb", "SIXTY_DAY_DL")]);
    let report = session.waiver_replacements(&id("logan-webb")).unwrap();
    assert!(report.target_injured);
    let ids: Vec<&str> = report.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["zack-wheeler"]);

    // Once playable, Strider qualifies despite projecting below Webb.
    let session = session_with_injuries(&[("Logan Webb", "SIXTY_DAY_DL"), ("Spencer Strider", "DAY_TO_DAY")]);
    let report = session.waiver_replacements(&id("logan-webb")).unwrap();
    let ids: Vec<&str> = report.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["zack-wheeler", "spencer-strider"]);
    assert!(approx_eq(report.candidates[0].improvement, 30.0));
    assert!(approx_eq(report.candidates[1].improvement, -40.0));

    // A healthy Webb is only replaced by someone better.
    let session = session_with_injuries(&[("Spencer Strider", "DAY_TO_DAY")]);
    let report = session.waiver_replacements(&id("logan-webb")).unwrap();
    assert!(!report.target_injured);
    let ids: Vec<&str> = report.candidates.iter().map(|c| c.canonical_id.as_str()).collect();
    assert_eq!(ids, vec!["zack-wheeler"]);
}

#[tokio::test]
async fn trade_with_unknown_player_leaves_database_untouched() {
    let session = loaded_session().await;
    let before = session.get_unified_database();
    let snapshot = before.players().clone();

    let roster = session.roster("MINE");
    let proposal = TradeProposal::new(vec![id("jose-ramirez")], vec![id("nobody-at-all")]);
    assert_eq!(
        session.trade_impact(&roster, &proposal).unwrap_err(),
        ValidationError::UnknownPlayer { id: id("nobody-at-all") }
    );

    let after = session.get_unified_database();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.players(), &snapshot);
}

#[tokio::test]
async fn two_team_trade_values_both_sides() {
    let session = loaded_session().await;
    let mine = session.roster("MINE");
    let rival = session.roster("Rival Squad");
    assert_eq!(mine, vec![id("aaron-judge"), id("jose-ramirez")]);

    let proposal = TradeProposal::new(vec![id("jose-ramirez")], vec![id("logan-webb")]);
    let trade = session.two_team_trade(&mine, &rival, &proposal).unwrap();
    assert!(approx_eq(trade.team_a.outgoing_value, 550.0));
    assert!(approx_eq(trade.team_a.incoming_value, 420.0));
    assert!(approx_eq(trade.team_b.incoming_value, 550.0));
}

#[tokio::test]
async fn post_trade_pickups_pair_adds_with_drops() {
    let settings = SessionSettings {
        slots: slots(&[("3B", 1), ("UTIL", 1), ("SP", 1)]),
        ..SessionSettings::new("123456", 2025)
    };
    let session = refreshed(session_with(settings)).await;
    let mine = session.roster("MINE");
    let proposal = TradeProposal::new(vec![id("aaron-judge")], vec![id("logan-webb")]);

    let request = AnalysisRequest::PostTradeWaivers {
        roster: mine.clone(),
        proposal: proposal.clone(),
    };
    let report = match session.run(&request).unwrap() {
        ValuationResult::PostTradeWaivers(report) => report,
        other => panic!("unexpected result: {other:?}"),
    };

    // Devers would start at 3B, but no benched player can give way.
    assert_eq!(report.pickups.len(), 1);
    let pickup = &report.pickups[0];
    assert_eq!(pickup.add, id("zack-wheeler"));
    assert_eq!(pickup.slot, "SP");
    assert_eq!(pickup.drop, id("logan-webb"));
    assert!(approx_eq(pickup.improvement, 30.0));
    assert!(approx_eq(report.before.total, 970.0));
    assert!(approx_eq(report.after.total, 1000.0));
    assert!(approx_eq(report.gain, 30.0));

    let err = session
        .post_trade_waivers(&mine, &TradeProposal::new(vec![id("logan-webb")], vec![]))
        .unwrap_err();
    assert_eq!(err, ValidationError::NotOnRoster { id: id("logan-webb") });
}

#[tokio::test]
async fn streaming_ranks_scheduled_starts() {
    let session = loaded_session().await;
    let starts = schedule();
    assert_eq!(starts.len(), 4);

    let report = session
        .streaming(&[id("logan-webb"), id("zack-wheeler"), id("spencer-strider")], &starts)
        .unwrap();
    let order: Vec<&str> = report.scores.iter().map(|s| s.pitcher.as_str()).collect();
    assert_eq!(order, vec!["spencer-strider", "logan-webb", "zack-wheeler"]);

    // Strider at BOS: 380/160 * 5.5 minus Devers' 560/650 rate over 23.1 PA.
    let expected = 380.0 / 160.0 * 5.5 - 560.0 / 650.0 * 5.5 * 4.2;
    assert!(approx_eq(report.scores[0].score, expected));
    assert_eq!(report.scores[0].opponent.as_deref(), Some("BOS"));

    // Wheeler has no announced start.
    assert_eq!(report.scores[2].score, f64::NEG_INFINITY);
    assert!(report.scores[2].date.is_none());

    let unresolved: Vec<&str> = report.unresolved.iter().map(|s| s.pitcher_name.as_str()).collect();
    assert_eq!(unresolved, vec!["Brayan Bello", "Gerrit Cole"]);
}

#[tokio::test]
async fn streaming_candidates_skip_rostered_pitchers() {
    let session = loaded_session().await;
    let report = session.streaming_candidates(&schedule(), true);
    let ids: Vec<&str> = report.scores.iter().map(|s| s.pitcher.as_str()).collect();
    assert_eq!(ids, vec!["spencer-strider"]);
}

#[tokio::test]
async fn streaming_rejects_hitters() {
    let session = loaded_session().await;
    let request = AnalysisRequest::Streaming {
        pitchers: vec![id("aaron-judge")],
        schedule: schedule(),
    };
    assert_eq!(
        session.run(&request).unwrap_err(),
        ValidationError::NotAPitcher { id: id("aaron-judge") }
    );

    let request = AnalysisRequest::Streaming {
        pitchers: vec![id("spencer-strider")],
        schedule: schedule(),
    };
    match session.run(&request).unwrap() {
        ValuationResult::StreamingScore(scores) => assert_eq!(scores.len(), 1),
        other => panic!("unexpected result: {other:?}"),
    }
}

// ===========================================================================
// Session scope
// ===========================================================================

#[tokio::test]
async fn new_season_starts_from_an_empty_cache() {
    let mut session = loaded_session().await;
    assert!(session.cache_stats().entries > 0);

    assert!(session.set_scope("123456", 2026));
    assert!(session.get_unified_database().is_empty());
    assert_eq!(session.cache_stats().entries, 0);
    assert!(session.identity_for("Jon Smith").is_none());

    let summary = session.refresh(&all_adapters()).await;
    assert_eq!(summary.players, 7);
    assert_eq!(session.identity_for("J. Smith"), Some(id("jonathan-smith")));
}
