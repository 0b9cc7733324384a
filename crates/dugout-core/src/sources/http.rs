// reqwest-backed source adapters and the schedule client.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures_util::stream::{self, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, CredentialsConfig, ProjectionsConfig};
use crate::player::{RawPlayerRecord, RecordKind, SourceId};
use crate::sources::espn::{parse_players, parse_roster_owners};
use crate::sources::fangraphs::parse_projections;
use crate::sources::lineups::{parse_past_lineups, FANGRAPHS_TEAM_IDS};
use crate::sources::schedule::{parse_schedule, ProbableStart, ScheduleError};
use crate::sources::{ProviderError, SourceAdapter};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const USER_AGENT: &str = "Mozilla/5.0 (compatible; dugout)";
const ACCEPT: &str = "application/json, text/plain, */*";
const ESPN_ACTIVE_FILTER: &str = r#"{"filterActive":{"value":true}}"#;
/// Concurrent requests when pulling every team's lineups.
const LINEUP_CONCURRENCY: usize = 6;

/// Shared client for every adapter.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
}

/// One adapter per provider, configured from `config`.
pub fn adapters(client: &reqwest::Client, config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(EspnAdapter::new(client.clone(), config)),
        Arc::new(ProjectionsAdapter::new(client.clone(), config)),
        Arc::new(LineupsAdapter::new(client.clone(), config)),
    ]
}

async fn get_json(request: reqwest::RequestBuilder, source_id: SourceId) -> Result<Value, ProviderError> {
    let response = request
        .header("Accept", ACCEPT)
        .send()
        .await
        .map_err(|source| ProviderError::Http { source_id, source })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status {
            source_id,
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| ProviderError::decode(source_id, e))
}

// ---------------------------------------------------------------------------
// ESPN (roster/league service)
// ---------------------------------------------------------------------------

/// The `Cookie` header for a private league, when both cookies are set.
pub fn espn_cookie(credentials: &CredentialsConfig) -> Option<String> {
    match (credentials.espn_s2.as_deref(), credentials.swid.as_deref()) {
        (Some(s2), Some(swid)) if !s2.is_empty() && !swid.is_empty() => {
            Some(format!("espn_s2={s2}; SWID={swid}"))
        }
        _ => None,
    }
}

pub fn espn_players_url(base: &str, season: u16) -> String {
    format!(
        "{}/seasons/{season}/players?scoringPeriodId=0&view=players_wl&view=kona_player_info",
        base.trim_end_matches('/')
    )
}

pub fn espn_rosters_url(base: &str, season: u16, league_id: &str) -> String {
    format!(
        "{}/seasons/{season}/segments/0/leagues/{league_id}?view=mRoster",
        base.trim_end_matches('/')
    )
}

pub struct EspnAdapter {
    http: reqwest::Client,
    base: String,
    cookie: Option<String>,
}

impl EspnAdapter {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base: config.endpoints.espn_base.clone(),
            cookie: espn_cookie(&config.credentials),
        }
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.cookie {
            Some(cookie) => request.header("Cookie", cookie),
            None => request,
        }
    }
}

#[async_trait]
impl SourceAdapter for EspnAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Roster
    }

    async fn fetch(&self, league_id: &str, season: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        let players = self
            .get(espn_players_url(&self.base, season))
            .header("X-Fantasy-Filter", ESPN_ACTIVE_FILTER);
        let rosters = self.get(espn_rosters_url(&self.base, season, league_id));

        let (pool, league) = tokio::try_join!(
            get_json(players, SourceId::Roster),
            get_json(rosters, SourceId::Roster)
        )?;
        let owners = parse_roster_owners(&league)?;
        let records = parse_players(&pool, &owners)?;
        info!(players = records.len(), rostered = owners.len(), "fetched ESPN player pool");
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// FanGraphs projections
// ---------------------------------------------------------------------------

pub struct ProjectionsAdapter {
    http: reqwest::Client,
    url: String,
    settings: ProjectionsConfig,
}

impl ProjectionsAdapter {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.endpoints.fangraphs_projections.clone(),
            settings: config.strategy.projections.clone(),
        }
    }

    fn request(&self, kind: RecordKind) -> reqwest::RequestBuilder {
        let (kind_param, system) = match kind {
            RecordKind::Batter => ("bat", self.settings.batter_system.as_str()),
            RecordKind::Pitcher => ("pit", self.settings.pitcher_system.as_str()),
        };
        self.http.get(&self.url).query(&[
            ("teams", "10"),
            ("lg", "MLB"),
            ("dollars", "260"),
            ("type", kind_param),
            ("proj", system),
            ("points", self.settings.points.as_str()),
            ("rep", "0"),
            ("drp", "0"),
            ("view", "0"),
        ])
    }
}

#[async_trait]
impl SourceAdapter for ProjectionsAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::Projections
    }

    async fn fetch(&self, _league_id: &str, _season: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        let (batters, pitchers) = tokio::try_join!(
            get_json(self.request(RecordKind::Batter), SourceId::Projections),
            get_json(self.request(RecordKind::Pitcher), SourceId::Projections)
        )?;
        let mut records = parse_projections(&pitchers, RecordKind::Pitcher)?;
        records.extend(parse_projections(&batters, RecordKind::Batter)?);
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// FanGraphs past lineups (league-play service)
// ---------------------------------------------------------------------------

pub struct LineupsAdapter {
    http: reqwest::Client,
    url: String,
}

impl LineupsAdapter {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.endpoints.fangraphs_lineups.clone(),
        }
    }

    async fn team_lineups(&self, team: &str, team_id: u32, load_date: i64) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        let request = self
            .http
            .get(&self.url)
            .query(&[("teamid", team_id.to_string()), ("loaddate", load_date.to_string())]);
        let payload = get_json(request, SourceId::LeaguePlay).await?;
        parse_past_lineups(team, &payload)
    }
}

#[async_trait]
impl SourceAdapter for LineupsAdapter {
    fn source_id(&self) -> SourceId {
        SourceId::LeaguePlay
    }

    /// Teams that fail are skipped; the source fails only when every team does.
    async fn fetch(&self, _league_id: &str, _season: u16) -> Result<Vec<RawPlayerRecord>, ProviderError> {
        let load_date = Utc::now().timestamp();
        let requests: Vec<_> = FANGRAPHS_TEAM_IDS
            .iter()
            .map(|&(team, id)| async move { (team, self.team_lineups(team, id, load_date).await) })
            .collect();
        let results: Vec<_> = stream::iter(requests)
            .buffer_unordered(LINEUP_CONCURRENCY)
            .collect()
            .await;

        let mut records = Vec::new();
        let mut failed = 0usize;
        let mut last_error = None;
        for (team, result) in results {
            match result {
                Ok(team_records) => records.extend(team_records),
                Err(e) => {
                    failed += 1;
                    debug!(team, error = %e, "team lineups unavailable");
                    last_error = Some(e);
                }
            }
        }

        if failed == FANGRAPHS_TEAM_IDS.len() {
            return Err(last_error.unwrap_or_else(|| ProviderError::Unavailable {
                source_id: SourceId::LeaguePlay,
                message: "no team lineups".into(),
            }));
        }
        if failed > 0 {
            warn!(failed, "some team lineups could not be fetched");
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// MLB schedule
// ---------------------------------------------------------------------------

pub struct ScheduleClient {
    http: reqwest::Client,
    url: String,
}

impl ScheduleClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            url: config.endpoints.mlb_schedule.clone(),
        }
    }

    /// Announced starts from `start` through `end` inclusive.
    pub async fn probable_starts(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<ProbableStart>, ScheduleError> {
        let response = self
            .http
            .get(&self.url)
            .header("Accept", ACCEPT)
            .query(&[
                ("sportId", "1".to_string()),
                ("startDate", start.format("%Y-%m-%d").to_string()),
                ("endDate", end.format("%Y-%m-%d").to_string()),
                ("hydrate", "team,probablePitcher".to_string()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScheduleError::Status {
                status: status.as_u16(),
            });
        }
        let payload: Value = response.json().await?;
        parse_schedule(&payload)
    }
}
