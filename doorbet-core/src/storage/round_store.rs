use crate::error::{Result, StoreError};
use crate::storage::{
    amount_column, optional_timestamp_column, parsed_column, timestamp_column, to_sql_amount,
    Storage, Txn,
};
use crate::types::{Outcome, Round, RoundStatus};
use rusqlite::{params, Connection, OptionalExtension};

const ROUND_COLUMNS: &str =
    "id, status, result, jackpot_seed, started_at, ended_at, epoch, claim";

/// Result of the betting -> locked compare-and-swap.
#[derive(Debug, Clone)]
pub enum LockOutcome {
    /// This caller moved the round out of betting and holds `round.claim`.
    Acquired(Round),
    /// The round had already left betting; carries its current state.
    Lost(Round),
}

pub struct RoundStore<'a> {
    storage: &'a Storage,
}

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn open(&self, round_id: &str, jackpot_seed: u64) -> Result<Round> {
        self.storage
            .transaction(|txn| Self::open_in(txn, round_id, jackpot_seed))
            .await
    }

    pub async fn get(&self, round_id: &str) -> Result<Option<Round>> {
        let conn = self.storage.get_connection().await;
        fetch(&conn, round_id)
    }

    /// Most recently started rounds first.
    pub async fn list(&self, limit: usize) -> Result<Vec<Round>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rounds ORDER BY started_at DESC LIMIT ?1",
            ROUND_COLUMNS
        ))?;
        let round_iter = stmt.query_map(params![limit as i64], round_from_row)?;

        let mut rounds = Vec::new();
        for round in round_iter {
            rounds.push(round?);
        }

        Ok(rounds)
    }

    pub fn get_in(txn: &Txn<'_>, round_id: &str) -> Result<Option<Round>> {
        fetch(txn.conn(), round_id)
    }

    /// Create the round, or reset an existing one into a fresh betting lifecycle.
    pub fn open_in(txn: &Txn<'_>, round_id: &str, jackpot_seed: u64) -> Result<Round> {
        txn.conn().execute(
            "INSERT INTO rounds (id, status, result, jackpot_seed, started_at, ended_at, epoch, claim)
             VALUES (?1, ?2, NULL, ?3, ?4, NULL, 1, 0)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                result = NULL,
                jackpot_seed = excluded.jackpot_seed,
                started_at = excluded.started_at,
                ended_at = NULL,
                epoch = rounds.epoch + 1",
            params![
                round_id,
                RoundStatus::Betting.as_str(),
                to_sql_amount(jackpot_seed)?,
                txn.now().timestamp_millis(),
            ],
        )?;

        fetch(txn.conn(), round_id)?
            .ok_or_else(|| StoreError::internal("Round missing right after open"))
    }

    /// Compare-and-swap the round from betting to locked. `None` if the round is missing.
    pub fn compare_and_lock_in(txn: &Txn<'_>, round_id: &str) -> Result<Option<LockOutcome>> {
        let updated = txn.conn().execute(
            "UPDATE rounds SET status = ?2, claim = claim + 1
             WHERE id = ?1 AND status = ?3",
            params![
                round_id,
                RoundStatus::Locked.as_str(),
                RoundStatus::Betting.as_str(),
            ],
        )?;

        let round = match fetch(txn.conn(), round_id)? {
            Some(round) => round,
            None => return Ok(None),
        };

        if updated == 1 {
            Ok(Some(LockOutcome::Acquired(round)))
        } else {
            Ok(Some(LockOutcome::Lost(round)))
        }
    }

    /// Take over settlement of a round stuck in locked, provided nobody else has claimed
    /// it since `observed_claim` was read.
    pub fn take_over_in(txn: &Txn<'_>, round_id: &str, observed_claim: u64) -> Result<Option<Round>> {
        let updated = txn.conn().execute(
            "UPDATE rounds SET claim = claim + 1
             WHERE id = ?1 AND status = ?2 AND claim = ?3",
            params![
                round_id,
                RoundStatus::Locked.as_str(),
                to_sql_amount(observed_claim)?,
            ],
        )?;

        if updated == 0 {
            return Ok(None);
        }

        fetch(txn.conn(), round_id)
    }

    /// Conditional locked -> settled transition stamped with the commit time.
    pub fn finalize_in(txn: &Txn<'_>, round_id: &str, claim: u64, result: Outcome) -> Result<()> {
        let updated = txn.conn().execute(
            "UPDATE rounds SET status = ?2, result = ?3, ended_at = ?4
             WHERE id = ?1 AND status = ?5 AND claim = ?6",
            params![
                round_id,
                RoundStatus::Settled.as_str(),
                result.as_str(),
                txn.now().timestamp_millis(),
                RoundStatus::Locked.as_str(),
                to_sql_amount(claim)?,
            ],
        )?;

        if updated == 0 {
            return Err(StoreError::precondition(format!(
                "Round '{}' is no longer locked under claim {}",
                round_id, claim
            )));
        }

        Ok(())
    }
}

fn fetch(conn: &Connection, round_id: &str) -> Result<Option<Round>> {
    let round = conn
        .query_row(
            &format!("SELECT {} FROM rounds WHERE id = ?1", ROUND_COLUMNS),
            params![round_id],
            round_from_row,
        )
        .optional()?;

    Ok(round)
}

fn round_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Round> {
    let result: Option<String> = row.get(2)?;
    let result = result
        .map(|raw| {
            raw.parse::<Outcome>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
        })
        .transpose()?;

    Ok(Round {
        id: row.get(0)?,
        status: parsed_column(row, 1)?,
        result,
        jackpot_seed: amount_column(row, 3)?,
        started_at: timestamp_column(row, 4)?,
        ended_at: optional_timestamp_column(row, 5)?,
        epoch: amount_column(row, 6)?,
        claim: amount_column(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Door;

    #[tokio::test]
    async fn test_open_creates_betting_round() {
        let storage = Storage::in_memory().await.unwrap();
        let round = RoundStore::new(&storage).open("r1", 250).await.unwrap();

        assert_eq!(round.status, RoundStatus::Betting);
        assert_eq!(round.jackpot_seed, 250);
        assert_eq!(round.epoch, 1);
        assert!(round.result.is_none());
        assert!(round.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_cas_only_succeeds_once() {
        let storage = Storage::in_memory().await.unwrap();
        RoundStore::new(&storage).open("r1", 0).await.unwrap();

        let first = storage
            .transaction(|txn| RoundStore::compare_and_lock_in(txn, "r1"))
            .await
            .unwrap();
        let second = storage
            .transaction(|txn| RoundStore::compare_and_lock_in(txn, "r1"))
            .await
            .unwrap();
        let missing = storage
            .transaction(|txn| RoundStore::compare_and_lock_in(txn, "nope"))
            .await
            .unwrap();

        match first {
            Some(LockOutcome::Acquired(round)) => {
                assert_eq!(round.status, RoundStatus::Locked);
                assert_eq!(round.claim, 1);
            }
            other => panic!("expected acquired lock, got {:?}", other),
        }
        assert!(matches!(second, Some(LockOutcome::Lost(_))));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_take_over_needs_current_claim() {
        let storage = Storage::in_memory().await.unwrap();
        RoundStore::new(&storage).open("r1", 0).await.unwrap();
        storage
            .transaction(|txn| RoundStore::compare_and_lock_in(txn, "r1"))
            .await
            .unwrap();

        let stale = storage
            .transaction(|txn| RoundStore::take_over_in(txn, "r1", 0))
            .await
            .unwrap();
        assert!(stale.is_none());

        let fresh = storage
            .transaction(|txn| RoundStore::take_over_in(txn, "r1", 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fresh.claim, 2);
    }

    #[tokio::test]
    async fn test_reopen_resets_lifecycle() {
        let storage = Storage::in_memory().await.unwrap();
        let rounds = RoundStore::new(&storage);
        rounds.open("r1", 10).await.unwrap();
        storage
            .transaction(|txn| {
                RoundStore::compare_and_lock_in(txn, "r1")?;
                RoundStore::finalize_in(txn, "r1", 1, Outcome::Door(Door::Ga))
            })
            .await
            .unwrap();

        let settled = rounds.get("r1").await.unwrap().unwrap();
        assert_eq!(settled.status, RoundStatus::Settled);
        assert_eq!(settled.result, Some(Outcome::Door(Door::Ga)));
        assert!(settled.ended_at.is_some());

        let reopened = rounds.open("r1", 0).await.unwrap();
        assert_eq!(reopened.status, RoundStatus::Betting);
        assert_eq!(reopened.epoch, 2);
        assert_eq!(reopened.jackpot_seed, 0);
        assert!(reopened.result.is_none());
        assert!(reopened.ended_at.is_none());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let storage = Storage::in_memory().await.unwrap();
        let rounds = RoundStore::new(&storage);
        rounds.open("a", 0).await.unwrap();
        rounds.open("b", 0).await.unwrap();

        let listed = rounds.list(10).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(rounds.list(1).await.unwrap().len(), 1);
    }
}
