// Error types for analysis calls and recoverable field access.
//
// Provider failures live with the adapter interface (sources::ProviderError)
// and configuration failures with the loader (config::ConfigError).

use thiserror::Error;

use crate::player::{CanonicalPlayerId, SourceId};

/// A single analysis call was given inputs it cannot evaluate.
///
/// Fatal to that call only; the database it was evaluated against is never
/// modified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("player not found in database: {id}")]
    UnknownPlayer { id: CanonicalPlayerId },

    #[error("player {id} is not on the supplied roster")]
    NotOnRoster { id: CanonicalPlayerId },

    #[error("player {id} is not on any fantasy roster")]
    NotRostered { id: CanonicalPlayerId },

    #[error("player {id} is not a pitcher")]
    NotAPitcher { id: CanonicalPlayerId },

    #[error("invalid parameter `{field}`: {message}")]
    InvalidParameter { field: String, message: String },
}

impl ValidationError {
    /// The offending player id, when the error concerns one player.
    pub fn player_id(&self) -> Option<&CanonicalPlayerId> {
        match self {
            ValidationError::UnknownPlayer { id }
            | ValidationError::NotOnRoster { id }
            | ValidationError::NotRostered { id }
            | ValidationError::NotAPitcher { id } => Some(id),
            ValidationError::InvalidParameter { .. } => None,
        }
    }
}

/// A provider field could not be read. Always recovered by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldAccessError {
    #[error("{source_id} does not provide `{field}`")]
    Missing {
        field: &'static str,
        source_id: SourceId,
    },

    #[error("{source_id} returned an unreadable `{field}`: {detail}")]
    Malformed {
        field: &'static str,
        source_id: SourceId,
        detail: String,
    },
}
