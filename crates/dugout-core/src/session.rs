// Analysis session: the presentation-facing surface of the core.
//
// A session owns the name cache for one league/season, runs fetch cycles
// through the identity resolver and database builder, and answers
// valuation requests against the latest database snapshot. Snapshots are
// replaced whole on every refresh and handed out as `Arc`s, so a caller
// holding one never sees a half-built database.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, NameCache};
use crate::config::Config;
use crate::database::{PlayerDatabase, UnifiedPlayer};
use crate::error::ValidationError;
use crate::identity::IdentityResolver;
use crate::pipeline::{fetch_all, FetchOutcome, FetchPolicy};
use crate::player::{CanonicalPlayerId, SourceId};
use crate::sources::schedule::ProbableStart;
use crate::sources::SourceAdapter;
use crate::valuation::lineup::RosterSlots;
use crate::valuation::offense::OffenseTable;
use crate::valuation::streaming::{streaming_scores, ParkFactors, StreamingMatchup, StreamingParams, StreamingScore};
use crate::valuation::post_trade::{post_trade_waivers, PostTradeWaivers};
use crate::valuation::trade::{roster_after, trade_impact, two_team_trade, TradeImpact, TradeProposal, TwoTeamTrade};
use crate::valuation::waiver::{waiver_replacements, WaiverParams, WaiverReplacement};
use crate::valuation::ValuationResult;

// ---------------------------------------------------------------------------
// Settings and summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub league_id: String,
    pub season: u16,
    pub fetch: FetchPolicy,
    pub slots: RosterSlots,
    pub waiver: WaiverParams,
    pub streaming: StreamingParams,
}

impl SessionSettings {
    pub fn new(league_id: impl Into<String>, season: u16) -> Self {
        SessionSettings {
            league_id: league_id.into(),
            season,
            fetch: FetchPolicy::default(),
            slots: RosterSlots::default(),
            waiver: WaiverParams::default(),
            streaming: StreamingParams::default(),
        }
    }

    pub fn from_config(config: &Config, park_factors: ParkFactors) -> Self {
        SessionSettings {
            league_id: config.league.league_id.clone(),
            season: config.league.season,
            fetch: config.fetch_policy(),
            slots: config.roster_slots(),
            waiver: config.waiver_params(),
            streaming: config.streaming_params(park_factors),
        }
    }
}

/// What one refresh produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshSummary {
    pub records: usize,
    pub players: usize,
    pub records_per_source: BTreeMap<SourceId, usize>,
    pub absent_sources: BTreeSet<SourceId>,
    /// Failed adapters with their error messages.
    pub failures: Vec<(SourceId, String)>,
    pub field_warnings: usize,
}

/// Scheduled starts split into scoreable matchups and starts whose pitcher
/// or teams could not be identified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleResolution {
    pub matchups: Vec<StreamingMatchup>,
    pub unresolved: Vec<ProbableStart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamingReport {
    /// Best first; unscored starts last.
    pub scores: Vec<StreamingScore>,
    pub unresolved: Vec<ProbableStart>,
}

/// One valuation request, answered by [`AnalysisSession::run`].
#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    Waiver {
        target: CanonicalPlayerId,
    },
    Trade {
        roster: Vec<CanonicalPlayerId>,
        proposal: TradeProposal,
    },
    /// Free-agent pickups for the roster a trade would leave.
    PostTradeWaivers {
        roster: Vec<CanonicalPlayerId>,
        proposal: TradeProposal,
    },
    Streaming {
        pitchers: Vec<CanonicalPlayerId>,
        schedule: Vec<ProbableStart>,
    },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub struct AnalysisSession {
    settings: SessionSettings,
    cache: NameCache,
    resolver: IdentityResolver,
    database: Arc<PlayerDatabase>,
}

impl AnalysisSession {
    pub fn new(settings: SessionSettings, resolver: IdentityResolver) -> Self {
        let cache = NameCache::scoped(&settings.league_id, settings.season);
        let database = Arc::new(PlayerDatabase::default());
        AnalysisSession {
            settings,
            cache,
            resolver,
            database,
        }
    }

    /// A session configured from the loaded config files.
    pub fn from_config(config: &Config, park_factors: ParkFactors) -> Self {
        let resolver = IdentityResolver::new(config.team_table(), config.alias_overrides());
        Self::new(SessionSettings::from_config(config, park_factors), resolver)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Point the session at another league or season. A change empties the
    /// cache and the database. Returns whether anything changed.
    pub fn set_scope(&mut self, league_id: &str, season: u16) -> bool {
        if self.settings.league_id == league_id && self.settings.season == season {
            return false;
        }
        self.settings.league_id = league_id.to_string();
        self.settings.season = season;
        self.cache.set_scope(league_id, season);
        self.database = Arc::new(PlayerDatabase::default());
        info!(league_id, season, "analysis session re-scoped");
        true
    }

    /// Run one fetch cycle and replace the database.
    pub async fn refresh(&mut self, adapters: &[Arc<dyn SourceAdapter>]) -> RefreshSummary {
        let outcome = fetch_all(
            adapters,
            &self.settings.league_id,
            self.settings.season,
            &self.settings.fetch,
        )
        .await;
        self.rebuild(outcome)
    }

    /// Resolve and build from a completed fetch cycle.
    pub fn rebuild(&mut self, outcome: FetchOutcome) -> RefreshSummary {
        let absent = outcome.absent_sources();
        let FetchOutcome {
            records,
            counts,
            failures,
        } = outcome;
        let record_count = records.len();

        let resolved = self.resolver.resolve(records, &self.cache);
        let database = PlayerDatabase::build(resolved, self.resolver.teams()).with_absent_sources(absent.clone());

        let summary = RefreshSummary {
            records: record_count,
            players: database.len(),
            records_per_source: counts,
            absent_sources: absent,
            failures: failures
                .iter()
                .map(|f| (f.source_id, f.error.to_string()))
                .collect(),
            field_warnings: database.warnings().len(),
        };
        if !summary.absent_sources.is_empty() {
            warn!(absent = ?summary.absent_sources, "database built without some sources");
        }
        info!(
            records = summary.records,
            players = summary.players,
            field_warnings = summary.field_warnings,
            "analysis database refreshed"
        );

        self.database = Arc::new(database);
        summary
    }

    /// Read-only snapshot of the current database.
    pub fn get_unified_database(&self) -> Arc<PlayerDatabase> {
        Arc::clone(&self.database)
    }

    /// Canonical id for a raw name, when it resolves to exactly one player.
    pub fn identity_for(&self, raw_name: &str) -> Option<CanonicalPlayerId> {
        self.cache.identity_for(raw_name)
    }

    pub fn identities_for(&self, raw_name: &str) -> Vec<CanonicalPlayerId> {
        self.cache.identities_for(raw_name)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Canonical ids owned by one fantasy team.
    pub fn roster(&self, owner: &str) -> Vec<CanonicalPlayerId> {
        self.database
            .roster_of(owner)
            .into_iter()
            .map(|p| p.canonical_id.clone())
            .collect()
    }

    // -- valuation entry points --

    pub fn waiver_replacements(&self, target: &CanonicalPlayerId) -> Result<WaiverReplacement, ValidationError> {
        waiver_replacements(&self.database, target, &self.settings.waiver)
    }

    pub fn trade_impact(
        &self,
        roster: &[CanonicalPlayerId],
        proposal: &TradeProposal,
    ) -> Result<TradeImpact, ValidationError> {
        trade_impact(
            &self.database,
            roster,
            proposal,
            &self.settings.slots,
            &self.settings.waiver.weights,
        )
    }

    pub fn two_team_trade(
        &self,
        roster_a: &[CanonicalPlayerId],
        roster_b: &[CanonicalPlayerId],
        proposal: &TradeProposal,
    ) -> Result<TwoTeamTrade, ValidationError> {
        two_team_trade(
            &self.database,
            roster_a,
            roster_b,
            proposal,
            &self.settings.slots,
            &self.settings.waiver.weights,
        )
    }

    /// Add/drop pairs for the roster left once `proposal` goes through.
    pub fn post_trade_waivers(
        &self,
        roster: &[CanonicalPlayerId],
        proposal: &TradeProposal,
    ) -> Result<PostTradeWaivers, ValidationError> {
        let after = roster_after(&self.database, roster, proposal)?;
        post_trade_waivers(&self.database, &after, &self.settings.slots, &self.settings.waiver)
    }

    pub fn offense(&self) -> OffenseTable {
        OffenseTable::from_database(
            &self.database,
            self.settings.streaming.starter_innings,
            self.settings.streaming.pa_per_inning,
        )
    }

    /// Match schedule names to canonical pitchers. A name must resolve to
    /// exactly one pitcher, after narrowing by team when several share it.
    pub fn resolve_schedule(&self, starts: &[ProbableStart]) -> ScheduleResolution {
        let teams = self.resolver.teams();
        let mut resolution = ScheduleResolution::default();

        for start in starts {
            let team = teams.canonical(&start.team);
            // Every candidate, even a lone one, must agree with the listed team.
            let candidates: Vec<&UnifiedPlayer> = self
                .cache
                .identities_for(&start.pitcher_name)
                .into_iter()
                .filter_map(|id| self.database.get(&id))
                .filter(|p| p.is_pitcher() && teams.is_compatible(&start.team, &p.team))
                .collect();
            let pitcher = match candidates.as_slice() {
                [only] => Some(only.canonical_id.clone()),
                _ => {
                    let on_team: Vec<&&UnifiedPlayer> = candidates
                        .iter()
                        .filter(|p| team.is_some() && teams.canonical(&p.team) == team)
                        .collect();
                    match on_team.as_slice() {
                        [only] => Some(only.canonical_id.clone()),
                        _ => None,
                    }
                }
            };

            match (pitcher, teams.canonical(&start.opponent), teams.canonical(&start.park)) {
                (Some(pitcher), Some(opponent), Some(park)) => resolution.matchups.push(StreamingMatchup {
                    pitcher,
                    date: start.date,
                    opponent,
                    park,
                }),
                _ => {
                    debug!(pitcher = %start.pitcher_name, date = %start.date, "scheduled start not resolved");
                    resolution.unresolved.push(start.clone());
                }
            }
        }

        if !resolution.unresolved.is_empty() {
            warn!(
                unresolved = resolution.unresolved.len(),
                "some scheduled starters could not be matched to a player"
            );
        }
        resolution
    }

    /// Score the given pitchers' scheduled starts.
    pub fn streaming(
        &self,
        pitchers: &[CanonicalPlayerId],
        schedule: &[ProbableStart],
    ) -> Result<StreamingReport, ValidationError> {
        let resolution = self.resolve_schedule(schedule);
        let scores = streaming_scores(
            &self.database,
            pitchers,
            &resolution.matchups,
            &self.offense(),
            &self.settings.streaming,
        )?;
        Ok(StreamingReport {
            scores,
            unresolved: resolution.unresolved,
        })
    }

    /// Score every resolvable start in `schedule`, optionally only for
    /// pitchers nobody in the league owns.
    pub fn streaming_candidates(&self, schedule: &[ProbableStart], unrostered_only: bool) -> StreamingReport {
        let resolution = self.resolve_schedule(schedule);
        let mut pitchers: Vec<CanonicalPlayerId> = resolution
            .matchups
            .iter()
            .map(|m| m.pitcher.clone())
            .filter(|id| {
                !unrostered_only || self.database.get(id).is_some_and(|p| !p.is_rostered())
            })
            .collect();
        pitchers.sort();
        pitchers.dedup();

        let scores = streaming_scores(
            &self.database,
            &pitchers,
            &resolution.matchups,
            &self.offense(),
            &self.settings.streaming,
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "streaming candidates could not be scored");
            Vec::new()
        });
        StreamingReport {
            scores,
            unresolved: resolution.unresolved,
        }
    }

    /// Answer one request.
    pub fn run(&self, request: &AnalysisRequest) -> Result<ValuationResult, ValidationError> {
        match request {
            AnalysisRequest::Waiver { target } => {
                self.waiver_replacements(target).map(ValuationResult::WaiverReplacement)
            }
            AnalysisRequest::Trade { roster, proposal } => {
                self.trade_impact(roster, proposal).map(ValuationResult::TradeImpact)
            }
            AnalysisRequest::PostTradeWaivers { roster, proposal } => self
                .post_trade_waivers(roster, proposal)
                .map(ValuationResult::PostTradeWaivers),
            AnalysisRequest::Streaming { pitchers, schedule } => self
                .streaming(pitchers, schedule)
                .map(|report| ValuationResult::StreamingScore(report.scores)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
