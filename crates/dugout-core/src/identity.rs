// Identity resolution: clusters provider records into canonical players.
//
// Records are grouped by name stem. Inside a group a record joins the first
// cluster none of whose members contradicts it; a contradiction is an
// incompatible team AND an incompatible position. Initial-abbreviated stems
// ("j smith") then fold into their unique full-stem cluster. The whole pass
// runs over records sorted by a total order that puts the roster service
// first, so the output never depends on fetch arrival order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::cache::NameCache;
use crate::normalize::NormalizedName;
use crate::player::{CanonicalPlayerId, PositionSet, RawPlayerRecord, StatLine};
use crate::teams::TeamTable;

/// Resolver output: every input record, grouped under its canonical id.
/// Records within a group are in authority order.
pub type ResolvedPlayers = BTreeMap<CanonicalPlayerId, Vec<RawPlayerRecord>>;

// ---------------------------------------------------------------------------
// Manual overrides
// ---------------------------------------------------------------------------

/// Manual raw-name → canonical-id overrides for known ambiguities.
///
/// Matched against the trimmed raw name exactly, so two players sharing a
/// stem can be pinned to different ids by their provider spellings.
#[derive(Debug, Clone, Default)]
pub struct AliasOverrides {
    by_name: BTreeMap<String, CanonicalPlayerId>,
}

impl AliasOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map<'a>(aliases: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut overrides = Self::new();
        for (raw_name, id) in aliases {
            overrides.insert(raw_name, id);
        }
        overrides
    }

    pub fn insert(&mut self, raw_name: &str, canonical_id: &str) {
        self.by_name.insert(
            raw_name.trim().to_string(),
            CanonicalPlayerId::new(canonical_id.trim()),
        );
    }

    pub fn lookup(&self, raw_name: &str) -> Option<&CanonicalPlayerId> {
        self.by_name.get(raw_name.trim())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    teams: TeamTable,
    aliases: AliasOverrides,
}

/// A record with its precomputed matching keys.
struct Entry {
    name: NormalizedName,
    team: Option<String>,
    positions: PositionSet,
    record: RawPlayerRecord,
}

struct Cluster {
    /// Name of the most authoritative member.
    name: NormalizedName,
    members: Vec<Entry>,
}

impl Cluster {
    fn new(entry: Entry) -> Self {
        Cluster {
            name: entry.name.clone(),
            members: vec![entry],
        }
    }

    fn accepts(&self, entry: &Entry) -> bool {
        self.members.iter().all(|m| !contradicts(m, entry))
    }

    fn compatible_with(&self, other: &Cluster) -> bool {
        other.members.iter().all(|e| self.accepts(e))
    }

    fn anchor(&self) -> &Entry {
        &self.members[0]
    }
}

impl IdentityResolver {
    pub fn new(teams: TeamTable, aliases: AliasOverrides) -> Self {
        IdentityResolver { teams, aliases }
    }

    pub fn teams(&self) -> &TeamTable {
        &self.teams
    }

    pub fn aliases(&self) -> &AliasOverrides {
        &self.aliases
    }

    /// Cluster `records` into canonical players and record every raw name's
    /// identity in `cache`.
    ///
    /// Total: every input record appears in exactly one output group, and
    /// records seen by a single source pass through as their own player.
    pub fn resolve(&self, records: Vec<RawPlayerRecord>, cache: &NameCache) -> ResolvedPlayers {
        let total = records.len();
        let mut entries: Vec<Entry> = records
            .into_iter()
            .map(|record| Entry {
                name: cache.normalize(&record.raw_name),
                team: self.teams.canonical(&record.team),
                positions: record.positions(),
                record,
            })
            .collect();
        entries.sort_by(entry_order);

        let mut forced: Vec<(CanonicalPlayerId, Entry)> = Vec::new();
        let mut groups: BTreeMap<String, Vec<Entry>> = BTreeMap::new();
        let mut unnamed: Vec<Entry> = Vec::new();
        for entry in entries {
            if let Some(id) = self.aliases.lookup(&entry.record.raw_name) {
                forced.push((id.clone(), entry));
            } else if entry.name.stem.is_empty() {
                unnamed.push(entry);
            } else {
                groups.entry(entry.name.stem.clone()).or_default().push(entry);
            }
        }

        let mut clusters: Vec<Cluster> = Vec::new();
        let mut splits = 0usize;
        for (stem, members) in groups {
            let start = clusters.len();
            for entry in members {
                match clusters[start..].iter().position(|c| c.accepts(&entry)) {
                    Some(i) => clusters[start + i].members.push(entry),
                    None => clusters.push(Cluster::new(entry)),
                }
            }
            let count = clusters.len() - start;
            if count > 1 {
                splits += 1;
                debug!(stem = %stem, identities = count, "split stem with contradictory team and position");
            }
        }

        let (mut clusters, folded) = fold_abbreviations(clusters);
        // Names with no letters never match anything, not even each other.
        clusters.extend(unnamed.into_iter().map(Cluster::new));

        let mut grouped: BTreeMap<CanonicalPlayerId, Vec<Entry>> = BTreeMap::new();
        for cluster in clusters {
            let id = assign_id(&cluster, &grouped);
            grouped.insert(id, cluster.members);
        }
        let overridden = forced.len();
        for (id, entry) in forced {
            grouped.entry(id).or_default().push(entry);
        }

        let resolved: ResolvedPlayers = grouped
            .into_iter()
            .map(|(id, mut members)| {
                members.sort_by(entry_order);
                (id, members.into_iter().map(|e| e.record).collect())
            })
            .collect();

        cache.record_identities(
            resolved
                .iter()
                .flat_map(|(id, records)| records.iter().map(move |r| (r.raw_name.as_str(), id))),
        );

        info!(
            records = total,
            players = resolved.len(),
            splits,
            abbreviations_folded = folded,
            overrides = overridden,
            "identity resolution complete"
        );
        resolved
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn contradicts(a: &Entry, b: &Entry) -> bool {
    let same_team = match (&a.team, &b.team) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    };
    !same_team && !a.positions.is_compatible(&b.positions)
}

/// Merge each abbreviated-stem cluster into the single full-stem cluster it
/// abbreviates, if exactly one exists and it does not contradict.
fn fold_abbreviations(clusters: Vec<Cluster>) -> (Vec<Cluster>, usize) {
    let mut slots: Vec<Option<Cluster>> = clusters.into_iter().map(Some).collect();

    let mut plan: Vec<(usize, usize)> = Vec::new();
    for (i, short) in slots.iter().enumerate() {
        let Some(short) = short else { continue };
        if !short.name.is_abbreviated() {
            continue;
        }
        let candidates: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter_map(|(j, c)| c.as_ref().map(|c| (j, c)))
            .filter(|(_, full)| short.name.abbreviates(&full.name))
            .map(|(j, _)| j)
            .collect();
        if let [target] = candidates[..] {
            plan.push((i, target));
        }
    }

    let mut folded = 0;
    for (from, into) in plan {
        let compatible = match (&slots[from], &slots[into]) {
            (Some(short), Some(full)) => full.compatible_with(short),
            _ => false,
        };
        if !compatible {
            continue;
        }
        if let (Some(short), Some(full)) = (slots[from].take(), slots[into].as_mut()) {
            debug!(short = %short.name.stem, full = %full.name.stem, "folded abbreviated name");
            full.members.extend(short.members);
            folded += 1;
        }
    }

    (slots.into_iter().flatten().collect(), folded)
}

/// Stem slug, disambiguated by team (or position) when a split stem has
/// already claimed it.
fn assign_id<V>(cluster: &Cluster, taken: &BTreeMap<CanonicalPlayerId, V>) -> CanonicalPlayerId {
    let base = if cluster.name.stem.is_empty() {
        "unnamed".to_string()
    } else {
        cluster.name.stem.replace(' ', "-")
    };
    let candidate = CanonicalPlayerId::new(base.clone());
    if !taken.contains_key(&candidate) {
        return candidate;
    }

    let anchor = cluster.anchor();
    let discriminator = anchor
        .team
        .as_deref()
        .map(str::to_lowercase)
        .or_else(|| {
            anchor
                .positions
                .positions()
                .first()
                .map(|p| p.display_str().to_lowercase())
        })
        .unwrap_or_else(|| "x".to_string());
    let qualified = format!("{base}~{discriminator}");
    let candidate = CanonicalPlayerId::new(qualified.clone());
    if !taken.contains_key(&candidate) {
        return candidate;
    }
    (2..)
        .map(|n| CanonicalPlayerId::new(format!("{qualified}~{n}")))
        .find(|id| !taken.contains_key(id))
        .unwrap_or(candidate)
}

/// Total order over entries: authority first, then every field, so equal
/// inputs always sort identically.
fn entry_order(a: &Entry, b: &Entry) -> Ordering {
    let (ra, rb) = (&a.record, &b.record);
    ra.source_id
        .authority_rank()
        .cmp(&rb.source_id.authority_rank())
        .then_with(|| a.name.stem.cmp(&b.name.stem))
        .then_with(|| a.team.cmp(&b.team))
        .then_with(|| a.positions.positions().cmp(b.positions.positions()))
        .then_with(|| ra.raw_name.cmp(&rb.raw_name))
        .then_with(|| ra.team.cmp(&rb.team))
        .then_with(|| ra.position.cmp(&rb.position))
        .then_with(|| ra.kind.cmp(&rb.kind))
        .then_with(|| ra.owner.cmp(&rb.owner))
        .then_with(|| ra.injury_status.cmp(&rb.injury_status))
        .then_with(|| compare_stats(&ra.stats, &rb.stats))
}

fn compare_stats(a: &StatLine, b: &StatLine) -> Ordering {
    let mut left = a.iter();
    let mut right = b.iter();
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some((ka, va)), Some((kb, vb))) => {
                let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
