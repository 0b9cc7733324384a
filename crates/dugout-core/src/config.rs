// Configuration loading and parsing (league.toml, strategy.toml, credentials.toml).

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::identity::AliasOverrides;
use crate::pipeline::FetchPolicy;
use crate::player::{stat, SourceId};
use crate::teams::TeamTable;
use crate::valuation::composite::{CompositeWeights, SourceWeights};
use crate::valuation::lineup::RosterSlots;
use crate::valuation::streaming::{ParkFactors, StreamingParams};
use crate::valuation::waiver::WaiverParams;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to seed config/ from defaults/: {message}")]
    SeedError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub league: LeagueConfig,
    /// Raw provider name → canonical id.
    pub aliases: HashMap<String, String>,
    /// Provider team abbreviation → canonical abbreviation.
    pub team_aliases: HashMap<String, String>,
    pub strategy: StrategyConfig,
    pub credentials: CredentialsConfig,
    pub endpoints: Endpoints,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// league.toml structs
// ---------------------------------------------------------------------------

/// Deserialization target for the whole of league.toml.
#[derive(Debug, Clone, Deserialize)]
struct LeagueFile {
    league: LeagueConfig,
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    team_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    pub league_id: String,
    pub season: u16,
    pub roster: HashMap<String, usize>,
    /// The user's fantasy team label, as the roster service reports it.
    #[serde(default)]
    pub my_team: Option<String>,
}

// ---------------------------------------------------------------------------
// strategy.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct StrategyFile {
    fetch: FetchConfig,
    waiver: WaiverSection,
    streaming: StreamingConfig,
    #[serde(default)]
    projections: ProjectionsConfig,
    endpoints: Endpoints,
    data_paths: DataPaths,
}

/// Stat weights as written in TOML: source name → stat → weight.
type RawWeights = BTreeMap<String, BTreeMap<String, f64>>;

#[derive(Debug, Clone, Deserialize)]
struct WaiverSection {
    limit: usize,
    #[serde(default)]
    include_injured: bool,
    #[serde(default = "default_post_trade_limit")]
    post_trade_limit: usize,
    #[serde(default = "default_batting_sample_stat")]
    batting_sample_stat: String,
    #[serde(default = "default_pitching_sample_stat")]
    pitching_sample_stat: String,
    #[serde(default)]
    batting_weights: RawWeights,
    #[serde(default)]
    pitching_weights: RawWeights,
}

fn default_post_trade_limit() -> usize {
    3
}

fn default_batting_sample_stat() -> String {
    stat::PA.to_string()
}

fn default_pitching_sample_stat() -> String {
    stat::IP.to_string()
}

/// The public strategy config assembled from the strategy.toml sections.
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub fetch: FetchConfig,
    pub waiver_limit: usize,
    pub waiver_include_injured: bool,
    pub post_trade_limit: usize,
    pub weights: CompositeWeights,
    pub streaming: StreamingConfig,
    pub projections: ProjectionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_concurrency: usize,
    #[serde(default)]
    pub retry_once: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    pub starter_innings: f64,
    pub pa_per_inning: f64,
    pub default_park_factor: f64,
}

/// Query settings for the projections service.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionsConfig {
    pub batter_system: String,
    pub pitcher_system: String,
    pub points: String,
}

impl Default for ProjectionsConfig {
    fn default() -> Self {
        ProjectionsConfig {
            batter_system: "rthebatx".into(),
            pitcher_system: "ratcdc".into(),
            points: "p|0,0,0,1,2,3,4,1,0,1,1,1,-1,0,0,0|3,2,-2,5,1,-2,0,-1,0,-1,2".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    pub espn_base: String,
    pub fangraphs_projections: String,
    pub fangraphs_lineups: String,
    pub mlb_schedule: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub park_factors: String,
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

/// ESPN session cookies; only private leagues need them.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub espn_s2: Option<String>,
    pub swid: Option<String>,
}

// ---------------------------------------------------------------------------
// Domain views
// ---------------------------------------------------------------------------

impl Config {
    pub fn fetch_policy(&self) -> FetchPolicy {
        let fetch = &self.strategy.fetch;
        FetchPolicy {
            timeout: Duration::from_secs(fetch.timeout_secs),
            max_concurrency: fetch.max_concurrency,
            retry_once: fetch.retry_once,
        }
    }

    /// Built-in MLB equivalences extended by `[team_aliases]`.
    pub fn team_table(&self) -> TeamTable {
        TeamTable::mlb().with_aliases(&self.team_aliases)
    }

    pub fn alias_overrides(&self) -> AliasOverrides {
        AliasOverrides::from_map(&self.aliases)
    }

    pub fn roster_slots(&self) -> RosterSlots {
        RosterSlots::from_counts(&self.league.roster)
    }

    pub fn waiver_params(&self) -> WaiverParams {
        WaiverParams {
            limit: self.strategy.waiver_limit,
            weights: self.strategy.weights.clone(),
            include_injured: self.strategy.waiver_include_injured,
            post_trade_limit: self.strategy.post_trade_limit,
        }
    }

    pub fn streaming_params(&self, park_factors: ParkFactors) -> StreamingParams {
        let s = &self.strategy.streaming;
        StreamingParams {
            starter_innings: s.starter_innings,
            pa_per_inning: s.pa_per_inning,
            default_park_factor: s.default_park_factor,
            park_factors,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/league.toml`,
/// `config/strategy.toml`, and (optionally) `config/credentials.toml`,
/// all relative to the given `base_dir`.
///
/// Does not copy defaults; `load_config()` does.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- league.toml (required) ---
    let league_path = config_dir.join("league.toml");
    let league_text = read_file(&league_path)?;
    let league_file: LeagueFile =
        toml::from_str(&league_text).map_err(|e| ConfigError::ParseError {
            path: league_path.clone(),
            source: e,
        })?;

    // --- strategy.toml (required) ---
    let strategy_path = config_dir.join("strategy.toml");
    let strategy_text = read_file(&strategy_path)?;
    let strategy_file: StrategyFile =
        toml::from_str(&strategy_text).map_err(|e| ConfigError::ParseError {
            path: strategy_path.clone(),
            source: e,
        })?;

    let weights = composite_weights(&strategy_file.waiver)?;
    let strategy = StrategyConfig {
        fetch: strategy_file.fetch,
        waiver_limit: strategy_file.waiver.limit,
        waiver_include_injured: strategy_file.waiver.include_injured,
        post_trade_limit: strategy_file.waiver.post_trade_limit,
        weights,
        streaming: strategy_file.streaming,
        projections: strategy_file.projections,
    };

    // --- credentials.toml (optional) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        league: league_file.league,
        aliases: league_file.aliases,
        team_aliases: league_file.team_aliases,
        strategy,
        credentials,
        endpoints: strategy_file.endpoints,
        data_paths: strategy_file.data_paths,
    };

    validate(&config)?;

    Ok(config)
}

/// Files `load_config` cannot run without; `credentials.toml` stays opt-in.
const REQUIRED_FILES: [&str; 2] = ["league.toml", "strategy.toml"];

/// Seeds `config/` with each required file it lacks, copied from
/// `defaults/`. Existing files are never touched. Returns the files written.
pub fn seed_config_dir(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let defaults_dir = base_dir.join("defaults");

    let missing: Vec<&str> = REQUIRED_FILES
        .into_iter()
        .filter(|name| !config_dir.join(name).is_file())
        .collect();
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::SeedError {
        message: format!("cannot create {}: {e}", config_dir.display()),
    })?;

    let mut seeded = Vec::with_capacity(missing.len());
    for name in missing {
        let default = defaults_dir.join(name);
        if !default.is_file() {
            return Err(ConfigError::SeedError {
                message: format!(
                    "{name} is in neither config/ nor defaults/ under {}",
                    base_dir.display()
                ),
            });
        }
        let target = config_dir.join(name);
        std::fs::copy(&default, &target).map_err(|e| ConfigError::SeedError {
            message: format!("cannot copy {} to {}: {e}", default.display(), target.display()),
        })?;
        seeded.push(target);
    }
    Ok(seeded)
}

/// Load config relative to the current working directory, seeding any
/// missing required file from `defaults/` first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    seed_config_dir(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn source_weights(raw: &RawWeights, field: &str) -> Result<SourceWeights, ConfigError> {
    raw.iter()
        .map(|(source, stats)| {
            let id = SourceId::parse(source).ok_or_else(|| ConfigError::ValidationError {
                field: format!("{field}.{source}"),
                message: "unknown source; expected roster, projections or league_play".into(),
            })?;
            Ok((id, stats.clone()))
        })
        .collect()
}

/// Weights from the `[waiver]` section; an empty family keeps the default
/// of projected points.
fn composite_weights(waiver: &WaiverSection) -> Result<CompositeWeights, ConfigError> {
    let defaults = CompositeWeights::default();
    let batting = source_weights(&waiver.batting_weights, "waiver.batting_weights")?;
    let pitching = source_weights(&waiver.pitching_weights, "waiver.pitching_weights")?;
    Ok(CompositeWeights {
        batting: if batting.is_empty() { defaults.batting } else { batting },
        pitching: if pitching.is_empty() { defaults.pitching } else { pitching },
        batting_sample_stat: waiver.batting_sample_stat.clone(),
        pitching_sample_stat: waiver.pitching_sample_stat.clone(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    // League validations
    if config.league.league_id.trim().is_empty() {
        return Err(invalid("league.league_id", "must not be empty"));
    }
    if config.league.season < 1900 {
        return Err(invalid(
            "league.season",
            format!("must be 1900 or later, got {}", config.league.season),
        ));
    }
    if let Some((raw, _)) = config.aliases.iter().find(|(_, id)| id.trim().is_empty()) {
        return Err(invalid(format!("aliases.{raw}"), "canonical id must not be empty"));
    }
    if let Some((alias, _)) = config.team_aliases.iter().find(|(_, team)| team.trim().is_empty()) {
        return Err(invalid(format!("team_aliases.{alias}"), "team must not be empty"));
    }

    // Fetch validations
    let fetch = &config.strategy.fetch;
    if fetch.timeout_secs == 0 {
        return Err(invalid("fetch.timeout_secs", "must be greater than 0"));
    }
    if fetch.max_concurrency == 0 {
        return Err(invalid("fetch.max_concurrency", "must be greater than 0"));
    }

    // Waiver validations
    if config.strategy.waiver_limit == 0 {
        return Err(invalid("waiver.limit", "must be greater than 0"));
    }
    if config.strategy.post_trade_limit == 0 {
        return Err(invalid("waiver.post_trade_limit", "must be greater than 0"));
    }
    let w = &config.strategy.weights;
    for (family, weights) in [("batting_weights", &w.batting), ("pitching_weights", &w.pitching)] {
        for (source, stats) in weights {
            for (name, val) in stats {
                if stat::is_metadata(name) {
                    return Err(invalid(
                        format!("waiver.{family}.{source}.{name}"),
                        "not a production stat; it cannot be weighted",
                    ));
                }
                if !val.is_finite() {
                    return Err(invalid(
                        format!("waiver.{family}.{source}.{name}"),
                        format!("must be finite, got {val}"),
                    ));
                }
            }
        }
    }

    // Streaming constants must all be positive
    let s = &config.strategy.streaming;
    let streaming_fields: &[(&str, f64)] = &[
        ("streaming.starter_innings", s.starter_innings),
        ("streaming.pa_per_inning", s.pa_per_inning),
        ("streaming.default_park_factor", s.default_park_factor),
    ];
    for (name, val) in streaming_fields {
        if !val.is_finite() || *val <= 0.0 {
            return Err(invalid(*name, format!("must be > 0, got {val}")));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
