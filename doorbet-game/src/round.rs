use crate::{GameError, Result};
use doorbet_core::{LockOutcome, Round, RoundStore, Storage};
use std::sync::Arc;

/// Owns the betting -> locked part of a round's lifecycle.
pub struct RoundManager {
    storage: Arc<Storage>,
}

impl RoundManager {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Open `round_id` for betting, generating an id from the store clock if none is given.
    ///
    /// Opening an existing round resets it: status goes back to betting, the result and
    /// end time are cleared, the jackpot seed is replaced and a new epoch starts, so bets
    /// from the previous lifecycle no longer count.
    pub async fn open(&self, round_id: Option<&str>, jackpot_seed: u64) -> Result<Round> {
        let round_id = match round_id {
            Some(id) if id.trim().is_empty() => {
                return Err(GameError::InvalidRoundId("round id cannot be empty".to_string()))
            }
            Some(id) => id.to_string(),
            None => format!("round-{}", self.storage.now().timestamp_millis()),
        };

        let round = RoundStore::new(&self.storage)
            .open(&round_id, jackpot_seed)
            .await?;

        if round.epoch > 1 {
            tracing::warn!(
                "Round {} re-opened (epoch {}), previous result discarded",
                round.id,
                round.epoch
            );
        } else {
            tracing::info!("Round {} opened with jackpot seed {}", round.id, jackpot_seed);
        }
        Ok(round)
    }

    /// Compare-and-swap the round from betting to locked.
    ///
    /// Only one caller ever gets [`LockOutcome::Acquired`] for a lifecycle; everyone else
    /// gets [`LockOutcome::Lost`] with the round's current state.
    pub async fn lock(&self, round_id: &str) -> Result<LockOutcome> {
        let outcome = self
            .storage
            .transaction(|txn| RoundStore::compare_and_lock_in(txn, round_id))
            .await?
            .ok_or_else(|| GameError::RoundNotFound(round_id.to_string()))?;

        match &outcome {
            LockOutcome::Acquired(round) => {
                tracing::info!("Round {} locked (claim {})", round.id, round.claim)
            }
            LockOutcome::Lost(round) => {
                tracing::debug!("Round {} already {}", round.id, round.status)
            }
        }
        Ok(outcome)
    }

    /// Claim a round stuck in locked. `None` if the round moved on or someone else
    /// claimed it after `observed_claim` was read.
    pub async fn take_over(&self, round_id: &str, observed_claim: u64) -> Result<Option<Round>> {
        let round = self
            .storage
            .transaction(|txn| RoundStore::take_over_in(txn, round_id, observed_claim))
            .await?;

        if let Some(round) = &round {
            tracing::warn!(
                "Took over settlement of stuck round {} (claim {})",
                round.id,
                round.claim
            );
        }
        Ok(round)
    }

    pub async fn get(&self, round_id: &str) -> Result<Round> {
        RoundStore::new(&self.storage)
            .get(round_id)
            .await?
            .ok_or_else(|| GameError::RoundNotFound(round_id.to_string()))
    }

    pub async fn list(&self, limit: usize) -> Result<Vec<Round>> {
        Ok(RoundStore::new(&self.storage).list(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorbet_core::RoundStatus;

    async fn manager() -> RoundManager {
        RoundManager::new(Arc::new(Storage::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn test_generated_ids_are_unique() {
        let rounds = manager().await;
        let first = rounds.open(None, 0).await.unwrap();
        let second = rounds.open(None, 0).await.unwrap();

        assert!(first.id.starts_with("round-"));
        assert_ne!(first.id, second.id);
        assert_eq!(second.epoch, 1);
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let rounds = manager().await;
        let err = rounds.open(Some("  "), 0).await.unwrap_err();
        assert!(matches!(err, GameError::InvalidRoundId(_)));
    }

    #[tokio::test]
    async fn test_lock_missing_round() {
        let rounds = manager().await;
        let err = rounds.lock("ghost").await.unwrap_err();
        assert!(matches!(err, GameError::RoundNotFound(_)));
    }

    #[tokio::test]
    async fn test_lock_is_forward_only() {
        let rounds = manager().await;
        rounds.open(Some("r1"), 0).await.unwrap();

        assert!(matches!(
            rounds.lock("r1").await.unwrap(),
            LockOutcome::Acquired(_)
        ));
        match rounds.lock("r1").await.unwrap() {
            LockOutcome::Lost(round) => assert_eq!(round.status, RoundStatus::Locked),
            other => panic!("second lock should lose, got {:?}", other),
        }
    }
}
