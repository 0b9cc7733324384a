// Player database builder: merges each resolved identity into one player.
//
// Stats are kept per source and never averaged; scalar fields follow source
// authority order (roster service first). The built database is an immutable
// snapshot: a new fetch cycle builds a new one.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::{FieldAccessError, ValidationError};
use crate::identity::ResolvedPlayers;
use crate::player::{
    stat, CanonicalPlayerId, InjuryField, PositionSet, RawPlayerRecord, RecordKind, SourceId,
    StatLine,
};
use crate::teams::TeamTable;

/// Field name used in injury-status warnings.
pub const INJURY_STATUS_FIELD: &str = "injury_status";

/// Roster-service statuses that keep a player out of the lineup.
/// `DAY_TO_DAY` and `ACTIVE` are playable.
const INJURED_STATUSES: &[&str] = &[
    "SEVEN_DAY_DL",
    "TEN_DAY_DL",
    "FIFTEEN_DAY_DL",
    "SIXTY_DAY_DL",
    "OUT",
    "SUSPENSION",
];

/// Whether a reported injury status sidelines the player.
pub fn is_injured_status(status: &str) -> bool {
    INJURED_STATUSES.contains(&status.trim().to_uppercase().as_str())
}

/// Stats for one stat family, keyed by the source that reported them.
pub type SourceStats = BTreeMap<SourceId, StatLine>;

// ---------------------------------------------------------------------------
// UnifiedPlayer
// ---------------------------------------------------------------------------

/// One real player with every source's contribution merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedPlayer {
    pub canonical_id: CanonicalPlayerId,
    pub display_name: String,
    /// Canonical team code, or empty when no source knows the team.
    pub team: String,
    pub positions: PositionSet,
    /// Display form of `positions` ("1B, OF").
    pub position: String,
    pub batting_stats: Option<SourceStats>,
    pub pitching_stats: Option<SourceStats>,
    /// Always present; `None` when healthy or when no source could say.
    pub injury_status: Option<String>,
    /// Owning fantasy team; `None` means the player is unrostered.
    pub owner: Option<String>,
    pub percent_owned: Option<f64>,
    pub source_coverage: BTreeSet<SourceId>,
}

impl UnifiedPlayer {
    pub fn is_rostered(&self) -> bool {
        self.owner.is_some()
    }

    /// `false` when no source could say.
    pub fn is_injured(&self) -> bool {
        self.injury_status.as_deref().is_some_and(is_injured_status)
    }

    pub fn is_pitcher(&self) -> bool {
        self.pitching_stats.is_some() || self.positions.has_pitcher()
    }

    pub fn is_hitter(&self) -> bool {
        self.batting_stats.is_some() || self.positions.has_hitter()
    }

    pub fn stats(&self, kind: RecordKind) -> Option<&SourceStats> {
        match kind {
            RecordKind::Batter => self.batting_stats.as_ref(),
            RecordKind::Pitcher => self.pitching_stats.as_ref(),
        }
    }

    /// A single stat as reported by one source.
    pub fn stat(&self, kind: RecordKind, source: SourceId, name: &str) -> Option<f64> {
        self.stats(kind)?.get(&source)?.get(name).copied()
    }

    /// A stat from the most authoritative source reporting it.
    pub fn first_stat(&self, kind: RecordKind, name: &str) -> Option<f64> {
        self.stats(kind)?
            .values()
            .find_map(|line| line.get(name).copied())
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// Read a record's injury status. Absent and malformed fields are errors
/// here; the builder turns them into `None` plus a warning.
pub fn read_injury_status(record: &RawPlayerRecord) -> Result<Option<String>, FieldAccessError> {
    match &record.injury_status {
        InjuryField::Reported(status) => Ok(status.clone()),
        InjuryField::NotProvided => Err(FieldAccessError::Missing {
            field: INJURY_STATUS_FIELD,
            source_id: record.source_id,
        }),
        InjuryField::Unreadable(detail) => Err(FieldAccessError::Malformed {
            field: INJURY_STATUS_FIELD,
            source_id: record.source_id,
            detail: detail.clone(),
        }),
    }
}

/// A recovered field-access failure, kept for display and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWarning {
    pub canonical_id: CanonicalPlayerId,
    pub error: FieldAccessError,
}

// ---------------------------------------------------------------------------
// PlayerDatabase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PlayerDatabase {
    players: BTreeMap<CanonicalPlayerId, UnifiedPlayer>,
    warnings: Vec<FieldWarning>,
    absent_sources: BTreeSet<SourceId>,
}

impl PlayerDatabase {
    /// Merge every resolved identity into a `UnifiedPlayer`. Never fails:
    /// unreadable fields degrade to their defaults and are listed in
    /// [`PlayerDatabase::warnings`].
    pub fn build(resolved: ResolvedPlayers, teams: &TeamTable) -> Self {
        let mut players = BTreeMap::new();
        let mut warnings = Vec::new();

        for (id, records) in resolved {
            if records.is_empty() {
                continue;
            }
            let player = merge_player(&id, &records, teams, &mut warnings);
            players.insert(id, player);
        }

        let malformed = warnings
            .iter()
            .filter(|w| matches!(w.error, FieldAccessError::Malformed { .. }))
            .count();
        if !warnings.is_empty() {
            warn!(
                players_without_injury_source = warnings.len() - malformed,
                malformed,
                "injury status unavailable for some players; defaulted to none"
            );
        }
        info!(players = players.len(), "player database built");

        PlayerDatabase {
            players,
            warnings,
            absent_sources: BTreeSet::new(),
        }
    }

    /// Mark sources that failed during the fetch cycle.
    pub fn with_absent_sources(mut self, absent: impl IntoIterator<Item = SourceId>) -> Self {
        self.absent_sources.extend(absent);
        self
    }

    pub fn get(&self, id: &CanonicalPlayerId) -> Option<&UnifiedPlayer> {
        self.players.get(id)
    }

    /// Look up a player that an analysis depends on.
    pub fn require(&self, id: &CanonicalPlayerId) -> Result<&UnifiedPlayer, ValidationError> {
        self.players
            .get(id)
            .ok_or_else(|| ValidationError::UnknownPlayer { id: id.clone() })
    }

    pub fn players(&self) -> &BTreeMap<CanonicalPlayerId, UnifiedPlayer> {
        &self.players
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnifiedPlayer> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn warnings(&self) -> &[FieldWarning] {
        &self.warnings
    }

    pub fn absent_sources(&self) -> &BTreeSet<SourceId> {
        &self.absent_sources
    }

    /// Players owned by one fantasy team, in id order.
    pub fn roster_of(&self, owner: &str) -> Vec<&UnifiedPlayer> {
        self.iter()
            .filter(|p| p.owner.as_deref() == Some(owner))
            .collect()
    }

    pub fn owners(&self) -> BTreeSet<&str> {
        self.iter().filter_map(|p| p.owner.as_deref()).collect()
    }
}

/// `records` arrive in authority order from the resolver.
fn merge_player(
    id: &CanonicalPlayerId,
    records: &[RawPlayerRecord],
    teams: &TeamTable,
    warnings: &mut Vec<FieldWarning>,
) -> UnifiedPlayer {
    let display_name = records
        .iter()
        .find(|r| r.source_id == SourceId::Roster)
        .unwrap_or(&records[0])
        .raw_name
        .trim()
        .to_string();

    let team = records
        .iter()
        .find_map(|r| teams.canonical(&r.team))
        .unwrap_or_default();

    let positions = records
        .iter()
        .map(RawPlayerRecord::positions)
        .find(|set| !set.is_empty())
        .unwrap_or_default();

    let mut batting: SourceStats = BTreeMap::new();
    let mut pitching: SourceStats = BTreeMap::new();
    for record in records {
        let line: StatLine = record
            .stats
            .iter()
            .filter(|(name, _)| !stat::is_metadata(name))
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        if line.is_empty() {
            continue;
        }
        let family = match stat_family(record, &positions) {
            RecordKind::Batter => &mut batting,
            RecordKind::Pitcher => &mut pitching,
        };
        family.entry(record.source_id).or_default().extend(line);
    }

    let owner = records.iter().find_map(|r| r.owner.clone());
    let percent_owned = records
        .iter()
        .filter(|r| r.source_id == SourceId::Roster)
        .find_map(|r| r.stats.get(stat::PERCENT_OWNED).copied());

    let injury_status = merge_injury_status(id, records, warnings);

    UnifiedPlayer {
        canonical_id: id.clone(),
        display_name,
        team,
        position: positions.display(),
        positions,
        batting_stats: (!batting.is_empty()).then_some(batting),
        pitching_stats: (!pitching.is_empty()).then_some(pitching),
        injury_status,
        owner,
        percent_owned,
        source_coverage: records.iter().map(|r| r.source_id).collect(),
    }
}

/// A record without a position of its own takes the player's family: a
/// pitcher-only player never gains batting stats from a bare roster row.
fn stat_family(record: &RawPlayerRecord, positions: &PositionSet) -> RecordKind {
    if record.positions().is_empty() && !positions.is_empty() && !positions.has_hitter() {
        RecordKind::Pitcher
    } else {
        record.kind
    }
}

/// First readable status in authority order. Malformed fields are always
/// recorded; a missing field only when no source could be read at all.
fn merge_injury_status(
    id: &CanonicalPlayerId,
    records: &[RawPlayerRecord],
    warnings: &mut Vec<FieldWarning>,
) -> Option<String> {
    let mut status = None;
    let mut missing = None;
    for record in records {
        match read_injury_status(record) {
            Ok(value) => {
                if status.is_none() {
                    status = Some(value);
                }
            }
            Err(error @ FieldAccessError::Malformed { .. }) => {
                warn!(player = %id, %error, "unreadable injury status");
                warnings.push(FieldWarning {
                    canonical_id: id.clone(),
                    error,
                });
            }
            Err(error @ FieldAccessError::Missing { .. }) => {
                missing.get_or_insert(error);
            }
        }
    }

    match status {
        Some(value) => value,
        None => {
            if let Some(error) = missing {
                debug!(player = %id, %error, "no source reports injury status");
                warnings.push(FieldWarning {
                    canonical_id: id.clone(),
                    error,
                });
            }
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
