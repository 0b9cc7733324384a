// MLB franchise abbreviation equivalence.
//
// Providers disagree on abbreviations (SF vs SFG, CWS vs CHW); every team
// string is folded to one canonical code before comparison.

use std::collections::HashMap;

/// Built-in provider abbreviation → canonical abbreviation mapping.
const MLB_TEAM_ALIASES: &[(&str, &str)] = &[
    ("CWS", "CHW"),
    ("SF", "SFG"),
    ("SD", "SDP"),
    ("WSH", "WSN"),
    ("WAS", "WSN"),
    ("TB", "TBR"),
    ("KC", "KCR"),
    ("ANA", "LAA"),
    ("FLA", "MIA"),
    ("NYN", "NYM"),
    ("SLN", "STL"),
    ("LAN", "LAD"),
    ("SFN", "SFG"),
    ("AZ", "ARI"),
    ("OAK", "ATH"),
];

/// Team strings that mean "no MLB team known".
const UNKNOWN_TEAMS: &[&str] = &["", "FA", "---", "NONE"];

/// Case- and whitespace-insensitive abbreviation equivalence table.
#[derive(Debug, Clone)]
pub struct TeamTable {
    aliases: HashMap<String, String>,
}

impl Default for TeamTable {
    fn default() -> Self {
        Self::mlb()
    }
}

impl TeamTable {
    /// An empty table: teams compare by their folded spelling only.
    pub fn empty() -> Self {
        TeamTable {
            aliases: HashMap::new(),
        }
    }

    /// The built-in MLB alias table.
    pub fn mlb() -> Self {
        let mut table = Self::empty();
        for (alias, canonical) in MLB_TEAM_ALIASES {
            table.insert(alias, canonical);
        }
        table
    }

    /// Add (or override) an equivalence. Both sides are folded.
    pub fn insert(&mut self, alias: &str, canonical: &str) {
        self.aliases.insert(fold(alias), fold(canonical));
    }

    /// Extend with configured aliases, overriding built-ins on conflict.
    pub fn with_aliases<'a>(mut self, aliases: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (alias, canonical) in aliases {
            self.insert(alias, canonical);
        }
        self
    }

    /// Canonical code for a provider team string, or `None` when the team
    /// is unknown (free agent, blank).
    pub fn canonical(&self, team: &str) -> Option<String> {
        let folded = fold(team);
        if UNKNOWN_TEAMS.contains(&folded.as_str()) {
            return None;
        }
        // Follow alias chains (TMA → TEAMA → ...). A chain that loops back
        // resolves to the smallest code on the loop, whichever code it entered at.
        let mut path = vec![folded];
        loop {
            let Some(current) = path.last() else {
                return None;
            };
            let Some(next) = self.aliases.get(current).filter(|next| *next != current) else {
                return path.pop();
            };
            if let Some(start) = path.iter().position(|seen| seen == next) {
                return path.drain(start..).min();
            }
            path.push(next.clone());
        }
    }

    /// Two team strings are compatible when they fold to the same franchise
    /// or when either is unknown.
    pub fn is_compatible(&self, a: &str, b: &str) -> bool {
        match (self.canonical(a), self.canonical(b)) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

fn fold(team: &str) -> String {
    team.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
