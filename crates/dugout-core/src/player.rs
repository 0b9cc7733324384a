// Provider-independent player vocabulary: sources, positions, raw records,
// and the canonical identity key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Stat names shared by the adapters and the valuation engine
// ---------------------------------------------------------------------------

pub mod stat {
    /// Projected fantasy points over the rest of the season.
    pub const PROJ_PTS: &str = "proj_pts";
    /// Projected plate appearances.
    pub const PA: &str = "pa";
    /// Projected innings pitched.
    pub const IP: &str = "ip";
    /// Projected points per plate appearance.
    pub const PTS_PER_PA: &str = "pts_per_pa";
    /// Projected points per inning pitched.
    pub const PTS_PER_IP: &str = "pts_per_ip";
    /// Percentage of fantasy leagues rostering the player.
    pub const PERCENT_OWNED: &str = "percent_owned";
    /// Recent lineup appearances (league-play sample size).
    pub const APPEARANCES: &str = "appearances";

    /// Stats describing the player rather than their production. They are
    /// kept off the batting and pitching lines.
    pub fn is_metadata(name: &str) -> bool {
        name == PERCENT_OWNED
    }
}

/// Per-source numeric stats, keyed by stat name.
pub type StatLine = BTreeMap<String, f64>;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// The external data providers feeding a fetch cycle.
///
/// Declaration order is identity authority order: the roster/league service
/// wins every tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Roster,
    Projections,
    LeaguePlay,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::Roster, SourceId::Projections, SourceId::LeaguePlay];

    /// Lower rank = more authoritative for identity and display fields.
    pub fn authority_rank(&self) -> u8 {
        match self {
            SourceId::Roster => 0,
            SourceId::Projections => 1,
            SourceId::LeaguePlay => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Roster => "roster",
            SourceId::Projections => "projections",
            SourceId::LeaguePlay => "league_play",
        }
    }

    pub fn parse(s: &str) -> Option<SourceId> {
        SourceId::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

pub const ESPN_SLOT_C: u16 = 0;
pub const ESPN_SLOT_1B: u16 = 1;
pub const ESPN_SLOT_2B: u16 = 2;
pub const ESPN_SLOT_3B: u16 = 3;
pub const ESPN_SLOT_SS: u16 = 4;
pub const ESPN_SLOT_OF: u16 = 5;
pub const ESPN_SLOT_LF: u16 = 8;
pub const ESPN_SLOT_CF: u16 = 9;
pub const ESPN_SLOT_RF: u16 = 10;
pub const ESPN_SLOT_DH: u16 = 11;
pub const ESPN_SLOT_SP: u16 = 14;
pub const ESPN_SLOT_RP: u16 = 15;

/// Concrete playing positions. Outfield is a single position because the
/// providers disagree on LF/CF/RF granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    Catcher,
    FirstBase,
    SecondBase,
    ThirdBase,
    ShortStop,
    Outfield,
    DesignatedHitter,
    StartingPitcher,
    ReliefPitcher,
}

impl Position {
    /// Parse a single position token ("1B", "LF", "SP", ...).
    ///
    /// Generic pitcher "P" maps to `StartingPitcher`; callers wanting the
    /// whole pitching family should use [`PositionSet::parse`].
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "C" => Some(Position::Catcher),
            "1B" => Some(Position::FirstBase),
            "2B" => Some(Position::SecondBase),
            "3B" => Some(Position::ThirdBase),
            "SS" => Some(Position::ShortStop),
            "OF" | "LF" | "CF" | "RF" => Some(Position::Outfield),
            "DH" => Some(Position::DesignatedHitter),
            "SP" | "P" => Some(Position::StartingPitcher),
            "RP" => Some(Position::ReliefPitcher),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            Position::Catcher => "C",
            Position::FirstBase => "1B",
            Position::SecondBase => "2B",
            Position::ThirdBase => "3B",
            Position::ShortStop => "SS",
            Position::Outfield => "OF",
            Position::DesignatedHitter => "DH",
            Position::StartingPitcher => "SP",
            Position::ReliefPitcher => "RP",
        }
    }

    pub fn is_pitcher(&self) -> bool {
        matches!(self, Position::StartingPitcher | Position::ReliefPitcher)
    }

    pub fn is_hitter(&self) -> bool {
        !self.is_pitcher()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Map an ESPN eligible-slot id to a concrete position.
/// Flex and meta slots (MI, CI, UTIL, P, BN, IL, NA, IF) return `None`.
pub fn position_from_espn_slot(slot_id: u16) -> Option<Position> {
    match slot_id {
        ESPN_SLOT_C => Some(Position::Catcher),
        ESPN_SLOT_1B => Some(Position::FirstBase),
        ESPN_SLOT_2B => Some(Position::SecondBase),
        ESPN_SLOT_3B => Some(Position::ThirdBase),
        ESPN_SLOT_SS => Some(Position::ShortStop),
        ESPN_SLOT_OF | ESPN_SLOT_LF | ESPN_SLOT_CF | ESPN_SLOT_RF => Some(Position::Outfield),
        ESPN_SLOT_DH => Some(Position::DesignatedHitter),
        ESPN_SLOT_SP => Some(Position::StartingPitcher),
        ESPN_SLOT_RP => Some(Position::ReliefPitcher),
        _ => None,
    }
}

/// The eligible positions of one player, sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionSet(Vec<Position>);

impl PositionSet {
    pub fn new(mut positions: Vec<Position>) -> Self {
        positions.sort();
        positions.dedup();
        PositionSet(positions)
    }

    /// Parse a provider position string such as "1B/DH", "SS, OF" or "P".
    /// Unknown tokens (UTIL, BN, ...) are ignored; "P" expands to SP and RP.
    pub fn parse(s: &str) -> Self {
        let mut positions = Vec::new();
        for token in s.split(|c: char| c == '/' || c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if token.eq_ignore_ascii_case("P") {
                positions.push(Position::StartingPitcher);
                positions.push(Position::ReliefPitcher);
            } else if let Some(pos) = Position::from_str_pos(token) {
                positions.push(pos);
            }
        }
        PositionSet::new(positions)
    }

    pub fn from_espn_slots(slots: &[u16]) -> Self {
        PositionSet::new(slots.iter().filter_map(|&s| position_from_espn_slot(s)).collect())
    }

    pub fn positions(&self) -> &[Position] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.0.contains(&pos)
    }

    pub fn has_hitter(&self) -> bool {
        self.0.iter().any(Position::is_hitter)
    }

    pub fn has_pitcher(&self) -> bool {
        self.0.iter().any(Position::is_pitcher)
    }

    pub fn union(&self, other: &PositionSet) -> PositionSet {
        PositionSet::new(self.0.iter().chain(other.0.iter()).copied().collect())
    }

    /// Position-family compatibility used by the identity resolver.
    ///
    /// Unknown (empty) sets never conflict. Sets sharing a position are
    /// compatible, as are two sets in the same family: a DH listing is
    /// compatible with any hitter listing and SP/RP are interchangeable.
    pub fn is_compatible(&self, other: &PositionSet) -> bool {
        if self.is_empty() || other.is_empty() {
            return true;
        }
        if self.0.iter().any(|p| other.contains(*p)) {
            return true;
        }
        let dh_bridge = (self.contains(Position::DesignatedHitter) && other.has_hitter())
            || (other.contains(Position::DesignatedHitter) && self.has_hitter());
        dh_bridge || (self.has_pitcher() && other.has_pitcher())
    }

    /// Comma-separated display form, e.g. "1B, OF".
    pub fn display(&self) -> String {
        self.0
            .iter()
            .map(Position::display_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Raw provider records
// ---------------------------------------------------------------------------

/// Which stat family a provider record describes. Two-way players arrive as
/// one record per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Batter,
    Pitcher,
}

/// How a provider reported the injury-status field.
///
/// Provider schemas are loose: the field may be missing entirely, present
/// but null (healthy), or present with an unexpected shape.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InjuryField {
    /// The provider's schema carries no injury field for this record.
    NotProvided,
    /// The field was present; `None` means the provider reported no status.
    Reported(Option<String>),
    /// The field was present but could not be read as a status string.
    Unreadable(String),
}

impl InjuryField {
    /// Classify a raw JSON field value.
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        match value {
            None => InjuryField::NotProvided,
            Some(serde_json::Value::Null) => InjuryField::Reported(None),
            Some(serde_json::Value::String(s)) if s.trim().is_empty() => InjuryField::Reported(None),
            Some(serde_json::Value::String(s)) => InjuryField::Reported(Some(s.trim().to_string())),
            Some(other) => InjuryField::Unreadable(format!("expected string, found {other}")),
        }
    }
}

/// One player row as returned by a single provider for one fetch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPlayerRecord {
    pub source_id: SourceId,
    pub raw_name: String,
    pub team: String,
    pub position: String,
    pub kind: RecordKind,
    pub stats: StatLine,
    pub injury_status: InjuryField,
    /// Owning fantasy team, reported by the roster service only.
    pub owner: Option<String>,
}

impl RawPlayerRecord {
    /// Build a record with no stats, no owner, and no injury field.
    pub fn new(
        source_id: SourceId,
        raw_name: impl Into<String>,
        team: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        let position = position.into();
        let kind = if PositionSet::parse(&position).has_hitter() || position.trim().is_empty() {
            RecordKind::Batter
        } else {
            RecordKind::Pitcher
        };
        RawPlayerRecord {
            source_id,
            raw_name: raw_name.into(),
            team: team.into(),
            position,
            kind,
            stats: StatLine::new(),
            injury_status: InjuryField::NotProvided,
            owner: None,
        }
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_stat(mut self, name: &str, value: f64) -> Self {
        self.stats.insert(name.to_string(), value);
        self
    }

    pub fn with_injury(mut self, injury: InjuryField) -> Self {
        self.injury_status = injury;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn positions(&self) -> PositionSet {
        PositionSet::parse(&self.position)
    }
}

// ---------------------------------------------------------------------------
// Canonical identity
// ---------------------------------------------------------------------------

/// Stable key for one real player, assigned by the identity resolver.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CanonicalPlayerId(String);

impl CanonicalPlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        CanonicalPlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
