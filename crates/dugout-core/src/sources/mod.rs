// Source adapters: the provider side of a fetch cycle.
//
// Each adapter turns one provider's payloads into RawPlayerRecords. The
// payload parsers (`espn`, `fangraphs`, `lineups`, `schedule`) are pure
// functions over JSON; `http` wires them to reqwest.

pub mod espn;
pub mod fangraphs;
pub mod http;
pub mod lineups;
pub mod schedule;

use async_trait::async_trait;
use thiserror::Error;

use crate::player::{RawPlayerRecord, SourceId};

/// Why a provider contributed nothing to a fetch cycle.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{source_id}: request failed: {source}")]
    Http {
        source_id: SourceId,
        #[source]
        source: reqwest::Error,
    },

    #[error("{source_id}: HTTP {status} from {url}")]
    Status {
        source_id: SourceId,
        status: u16,
        url: String,
    },

    #[error("{source_id}: could not decode payload: {message}")]
    Decode { source_id: SourceId, message: String },

    #[error("{source_id}: timed out after {millis}ms")]
    Timeout { source_id: SourceId, millis: u64 },

    #[error("{source_id}: {message}")]
    Unavailable { source_id: SourceId, message: String },
}

impl ProviderError {
    /// The provider this error belongs to.
    pub fn source_id(&self) -> SourceId {
        match self {
            ProviderError::Http { source_id, .. }
            | ProviderError::Status { source_id, .. }
            | ProviderError::Decode { source_id, .. }
            | ProviderError::Timeout { source_id, .. }
            | ProviderError::Unavailable { source_id, .. } => *source_id,
        }
    }

    pub fn decode(source_id: SourceId, err: impl std::fmt::Display) -> Self {
        ProviderError::Decode {
            source_id,
            message: err.to_string(),
        }
    }
}

/// One data provider.
///
/// `fetch` returns every record the provider has for the league/season. Any
/// error marks the provider absent for the cycle; it never aborts the cycle.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    async fn fetch(&self, league_id: &str, season: u16) -> Result<Vec<RawPlayerRecord>, ProviderError>;
}
