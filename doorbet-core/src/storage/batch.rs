use crate::error::Result;
use crate::storage::{AccountStore, HistoryStore, JackpotStore, RoundStore, Txn};
use crate::types::Outcome;

/// A write queued in a [`WriteBatch`].
///
/// Writes never read first. Timestamps are not carried by the write: finalization and
/// history rows receive the store's commit timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Add `delta` to an account balance. Fails the batch if the account is missing or
    /// the balance would go negative.
    IncrementBalance { account_id: String, delta: i64 },
    /// Add `delta` to the jackpot singleton.
    IncrementJackpot { delta: u64 },
    /// Mark a round settled, conditional on it still being locked under `claim`.
    FinalizeRound {
        round_id: String,
        claim: u64,
        result: Outcome,
    },
    /// Append a history row for the round's lifecycle `epoch`.
    AppendHistory {
        round_id: String,
        epoch: u64,
        result: Outcome,
    },
}

#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: Write) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn increment_balance(&mut self, account_id: impl Into<String>, delta: i64) -> &mut Self {
        self.push(Write::IncrementBalance {
            account_id: account_id.into(),
            delta,
        })
    }

    pub fn increment_jackpot(&mut self, delta: u64) -> &mut Self {
        self.push(Write::IncrementJackpot { delta })
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn apply(&self, txn: &Txn<'_>) -> Result<()> {
        for write in &self.writes {
            match write {
                Write::IncrementBalance { account_id, delta } => {
                    AccountStore::increment_in(txn, account_id, *delta)?;
                }
                Write::IncrementJackpot { delta } => {
                    JackpotStore::increment_in(txn, *delta)?;
                }
                Write::FinalizeRound {
                    round_id,
                    claim,
                    result,
                } => {
                    RoundStore::finalize_in(txn, round_id, *claim, *result)?;
                }
                Write::AppendHistory {
                    round_id,
                    epoch,
                    result,
                } => {
                    HistoryStore::append_in(txn, round_id, *epoch, *result)?;
                }
            }
        }
        Ok(())
    }
}
