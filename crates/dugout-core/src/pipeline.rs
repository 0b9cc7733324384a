// Fan-out/fan-in fetch across all source adapters.
//
// Adapters run concurrently up to `max_concurrency`. Each gets a timeout
// and, optionally, one retry. The call returns only after every adapter has
// succeeded or failed; a failed adapter contributes no records and its
// source is reported absent.

use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::player::{RawPlayerRecord, SourceId};
use crate::sources::{ProviderError, SourceAdapter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    pub max_concurrency: usize,
    /// Retry a failed or timed-out adapter exactly once.
    pub retry_once: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy {
            timeout: Duration::from_secs(20),
            max_concurrency: 3,
            retry_once: true,
        }
    }
}

/// An adapter that contributed nothing this cycle.
#[derive(Debug)]
pub struct SourceFailure {
    pub source_id: SourceId,
    pub error: ProviderError,
    pub attempts: u32,
}

/// Everything one fetch cycle produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Records from every successful adapter, in adapter order.
    pub records: Vec<RawPlayerRecord>,
    /// Record count per successful source.
    pub counts: BTreeMap<SourceId, usize>,
    pub failures: Vec<SourceFailure>,
}

impl FetchOutcome {
    /// Sources that failed and had no successful adapter.
    pub fn absent_sources(&self) -> BTreeSet<SourceId> {
        self.failures
            .iter()
            .map(|f| f.source_id)
            .filter(|id| !self.counts.contains_key(id))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn fetch_once(
    adapter: &dyn SourceAdapter,
    league_id: &str,
    season: u16,
    timeout: Duration,
) -> Result<Vec<RawPlayerRecord>, ProviderError> {
    match tokio::time::timeout(timeout, adapter.fetch(league_id, season)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout {
            source_id: adapter.source_id(),
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

async fn fetch_with_retry(
    adapter: &dyn SourceAdapter,
    league_id: &str,
    season: u16,
    policy: &FetchPolicy,
) -> (Result<Vec<RawPlayerRecord>, ProviderError>, u32) {
    match fetch_once(adapter, league_id, season, policy.timeout).await {
        Err(e) if policy.retry_once => {
            warn!(source = %adapter.source_id(), error = %e, "fetch failed; retrying once");
            (fetch_once(adapter, league_id, season, policy.timeout).await, 2)
        }
        result => (result, 1),
    }
}

/// Run every adapter and wait for all of them.
pub async fn fetch_all(
    adapters: &[Arc<dyn SourceAdapter>],
    league_id: &str,
    season: u16,
    policy: &FetchPolicy,
) -> FetchOutcome {
    let mut results: Vec<_> = stream::iter(adapters.iter().enumerate())
        .map(|(index, adapter)| async move {
            let (result, attempts) = fetch_with_retry(adapter.as_ref(), league_id, season, policy).await;
            (index, adapter.source_id(), result, attempts)
        })
        .buffer_unordered(policy.max_concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(index, ..)| *index);

    let mut outcome = FetchOutcome::default();
    for (_, source_id, result, attempts) in results {
        match result {
            Ok(records) => {
                *outcome.counts.entry(source_id).or_insert(0) += records.len();
                outcome.records.extend(records);
            }
            Err(error) => {
                warn!(source = %source_id, attempts, error = %error, "source excluded from this cycle");
                outcome.failures.push(SourceFailure {
                    source_id,
                    error,
                    attempts,
                });
            }
        }
    }

    info!(
        league_id,
        season,
        records = outcome.records.len(),
        sources = outcome.counts.len(),
        failed = outcome.failures.len(),
        "fetch cycle complete"
    );
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
