use doorbet_core::{RoundStatus, StoreError, TransactionError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Round not found: {0}")]
    RoundNotFound(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Round {round_id} is {status}, bets are closed")]
    RoundLocked {
        round_id: String,
        status: RoundStatus,
    },

    #[error("Bet must stake a positive amount")]
    EmptyBet,

    #[error("Invalid stake: {0}")]
    InvalidStake(String),

    #[error("Invalid odds: {0}")]
    InvalidOdds(String),

    #[error("Invalid round id: {0}")]
    InvalidRoundId(String),

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientBalance { need: u64, available: u64 },

    #[error("Round {0} is being settled by another caller")]
    SettlementInProgress(String),

    #[error("Service unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },

    #[error("Storage failure")]
    Store(#[source] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Caller-facing classification of every [`GameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; nothing was written.
    Validation,
    NotFound,
    /// The request conflicts with current state; nothing was written.
    Conflict,
    /// Store retries were exhausted.
    Unavailable,
    Internal,
}

impl GameError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::EmptyBet
            | GameError::InvalidStake(_)
            | GameError::InvalidOdds(_)
            | GameError::InvalidRoundId(_) => ErrorKind::Validation,
            GameError::RoundNotFound(_) | GameError::AccountNotFound(_) => ErrorKind::NotFound,
            GameError::RoundLocked { .. }
            | GameError::InsufficientBalance { .. }
            | GameError::SettlementInProgress(_) => ErrorKind::Conflict,
            GameError::Unavailable { .. } => ErrorKind::Unavailable,
            GameError::Store(_) | GameError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable { attempts } => GameError::Unavailable { attempts },
            other => GameError::Store(other),
        }
    }
}

impl TransactionError for GameError {
    fn is_transient(&self) -> bool {
        matches!(self, GameError::Store(err) if err.is_transient())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(GameError::EmptyBet.kind(), ErrorKind::Validation);
        assert_eq!(
            GameError::RoundNotFound("r1".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            GameError::InsufficientBalance {
                need: 10,
                available: 5
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            GameError::from(StoreError::Unavailable { attempts: 5 }).kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_store_details_stay_hidden() {
        let err = GameError::from(StoreError::internal("table bets is on fire"));
        assert_eq!(err.to_string(), "Storage failure");
    }
}
