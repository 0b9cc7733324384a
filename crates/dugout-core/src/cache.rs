// Session-scoped memoization of name normalization and resolved identities.
//
// The cache belongs to one analysis session and is bound to a
// (league_id, season) scope; moving to another scope empties it. Writers
// race harmlessly: normalization is pure, so the last write wins.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::debug;

use crate::normalize::{normalize, NormalizedName};
use crate::player::CanonicalPlayerId;

/// Hit/miss counters for the normalization memo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Default)]
pub struct NameCache {
    scope: RwLock<Option<(String, u16)>>,
    names: RwLock<HashMap<String, NormalizedName>>,
    /// Stem → canonical ids seen for that stem in the latest resolution.
    identities: RwLock<HashMap<String, BTreeSet<CanonicalPlayerId>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl NameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache already bound to a league/season scope.
    pub fn scoped(league_id: &str, season: u16) -> Self {
        let cache = Self::default();
        cache.set_scope(league_id, season);
        cache
    }

    /// Bind the cache to a league/season. Returns `true` when a previous
    /// scope was replaced and its cached contents discarded.
    pub fn set_scope(&self, league_id: &str, season: u16) -> bool {
        let mut scope = self.scope.write().unwrap_or_else(PoisonError::into_inner);
        let next = (league_id.to_string(), season);
        if scope.as_ref() == Some(&next) {
            return false;
        }
        let had_scope = scope.is_some();
        *scope = Some(next);
        drop(scope);
        if had_scope {
            debug!(league_id, season, "name cache scope changed; clearing");
        }
        self.clear();
        had_scope
    }

    pub fn scope(&self) -> Option<(String, u16)> {
        self.scope.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Drop every memoized name and identity.
    pub fn clear(&self) {
        self.names.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.identities.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Memoized [`normalize`]. The returned value is identical to a fresh
    /// computation.
    pub fn normalize(&self, raw_name: &str) -> NormalizedName {
        if let Some(hit) = self
            .names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(raw_name)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let fresh = normalize(raw_name);
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(raw_name.to_string(), fresh.clone());
        fresh
    }

    /// Replace the identity memo with the outcome of a resolution pass.
    pub fn record_identities<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, &'a CanonicalPlayerId)>,
    ) {
        let mut fresh: HashMap<String, BTreeSet<CanonicalPlayerId>> = HashMap::new();
        for (raw_name, id) in entries {
            let stem = self.normalize(raw_name).stem;
            fresh.entry(stem).or_default().insert(id.clone());
        }
        *self.identities.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    }

    /// Look up the canonical id for a raw name. Returns `None` when the name
    /// was never resolved or when it maps to more than one identity.
    pub fn identity_for(&self, raw_name: &str) -> Option<CanonicalPlayerId> {
        let stem = self.normalize(raw_name).stem;
        let identities = self.identities.read().unwrap_or_else(PoisonError::into_inner);
        let ids = identities.get(&stem)?;
        if ids.len() == 1 {
            ids.iter().next().cloned()
        } else {
            None
        }
    }

    /// All canonical ids recorded for a raw name's stem.
    pub fn identities_for(&self, raw_name: &str) -> Vec<CanonicalPlayerId> {
        let stem = self.normalize(raw_name).stem;
        self.identities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&stem)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.names.read().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_lookup_hits_cache() {
        let cache = NameCache::new();
        let first = cache.normalize("José Ramírez");
        let second = cache.normalize("José Ramírez");
        assert_eq!(first, second);
        assert_eq!(first.original, second.original);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn cached_value_matches_fresh_computation() {
        let cache = NameCache::new();
        cache.normalize("Vladimir Guerrero Jr.");
        let cached = cache.normalize("Vladimir Guerrero Jr.");
        let fresh = normalize("Vladimir Guerrero Jr.");
        assert_eq!(cached.stem, fresh.stem);
        assert_eq!(cached.original, fresh.original);
    }

    #[test]
    fn same_scope_keeps_contents() {
        let cache = NameCache::scoped("123", 2025);
        cache.normalize("Aaron Judge");
        assert!(!cache.set_scope("123", 2025));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn new_scope_clears_contents() {
        let cache = NameCache::scoped("123", 2025);
        cache.normalize("Aaron Judge");
        cache.record_identities([("Aaron Judge", &CanonicalPlayerId::new("aaron-judge"))]);

        assert!(cache.set_scope("123", 2026));
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.identity_for("Aaron Judge").is_none());
        assert_eq!(cache.scope(), Some(("123".to_string(), 2026)));
    }

    #[test]
    fn identity_lookup_by_any_spelling() {
        let cache = NameCache::new();
        let id = CanonicalPlayerId::new("jose-ramirez");
        cache.record_identities([("José Ramírez", &id)]);
        assert_eq!(cache.identity_for("Jose Ramirez"), Some(id.clone()));
        assert_eq!(cache.identity_for("JOSÉ RAMÍREZ"), Some(id));
    }

    #[test]
    fn ambiguous_identity_lookup_returns_none() {
        let cache = NameCache::new();
        let a = CanonicalPlayerId::new("will-smith");
        let b = CanonicalPlayerId::new("will-smith~rp");
        cache.record_identities([("Will Smith", &a), ("Will Smith", &b)]);
        assert!(cache.identity_for("Will Smith").is_none());
        assert_eq!(cache.identities_for("Will Smith"), vec![a, b]);
    }

    #[test]
    fn record_identities_replaces_previous_pass() {
        let cache = NameCache::new();
        cache.record_identities([("Aaron Judge", &CanonicalPlayerId::new("old"))]);
        cache.record_identities([("Juan Soto", &CanonicalPlayerId::new("juan-soto"))]);
        assert!(cache.identity_for("Aaron Judge").is_none());
        assert!(cache.identity_for("Juan Soto").is_some());
    }
}
