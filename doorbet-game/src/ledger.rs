use crate::{GameError, Result};
use doorbet_core::{
    AccountStore, Bet, BetStore, RoundStatus, RoundStore, StakeError, Stakes, Storage,
};
use std::sync::Arc;

/// Records stakes and debits balances, one atomic transaction per bet.
pub struct BettingLedger {
    storage: Arc<Storage>,
}

impl BettingLedger {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Place (or replace) `account_id`'s bet on `round_id`.
    ///
    /// The round and account are read, the stake is validated, the balance is debited
    /// by the full total and the bet is upserted, all in one transaction. Any failure
    /// leaves both the balance and the bet untouched.
    pub async fn place_bet(&self, round_id: &str, account_id: &str, stakes: &Stakes) -> Result<Bet> {
        let bet = self
            .storage
            .transaction(|txn| -> Result<Bet> {
                let round = RoundStore::get_in(txn, round_id)?;
                let account = AccountStore::get_in(txn, account_id)?;

                let round = round.ok_or_else(|| GameError::RoundNotFound(round_id.to_string()))?;
                if round.status != RoundStatus::Betting {
                    return Err(GameError::RoundLocked {
                        round_id: round.id,
                        status: round.status,
                    });
                }

                let total_stake = stakes
                    .total()
                    .ok_or_else(|| GameError::InvalidStake("total stake overflows".to_string()))?;
                if total_stake == 0 {
                    return Err(GameError::EmptyBet);
                }

                let account =
                    account.ok_or_else(|| GameError::AccountNotFound(account_id.to_string()))?;
                if account.balance < total_stake {
                    return Err(GameError::InsufficientBalance {
                        need: total_stake,
                        available: account.balance,
                    });
                }

                let debit = i64::try_from(total_stake)
                    .map_err(|_| GameError::InvalidStake("total stake too large".to_string()))?;
                AccountStore::increment_in(txn, account_id, -debit)?;

                let bet = Bet {
                    round_id: round_id.to_string(),
                    account_id: account_id.to_string(),
                    stakes: stakes.clone(),
                    total_stake,
                    placed_at: txn.now(),
                    epoch: round.epoch,
                };
                BetStore::upsert_in(txn, &bet)?;
                Ok(bet)
            })
            .await?;

        tracing::info!(
            "Account {} staked {} on round {}",
            bet.account_id,
            bet.total_stake,
            bet.round_id
        );
        Ok(bet)
    }

    /// Like [`place_bet`](Self::place_bet) but takes loosely typed stakes, e.g. straight
    /// from a request body. Malformed amounts count as zero; unknown doors are rejected.
    pub async fn place_bet_raw<I, K>(&self, round_id: &str, account_id: &str, raw: I) -> Result<Bet>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: AsRef<str>,
    {
        let stakes = Stakes::from_raw(raw).map_err(|e| match e {
            StakeError::UnknownDoor(door) => GameError::InvalidStake(door.to_string()),
            StakeError::Overflow => GameError::InvalidStake("total stake overflows".to_string()),
        })?;
        self.place_bet(round_id, account_id, &stakes).await
    }

    /// Bets of the round's current lifecycle.
    pub async fn bets(&self, round_id: &str) -> Result<Vec<Bet>> {
        let round = RoundStore::new(&self.storage)
            .get(round_id)
            .await?
            .ok_or_else(|| GameError::RoundNotFound(round_id.to_string()))?;

        Ok(BetStore::new(&self.storage).list(round_id, round.epoch).await?)
    }
}
