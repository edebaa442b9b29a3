use crate::error::Result;
use crate::storage::{amount_column, timestamp_column, to_sql_amount, Storage, Txn};
use crate::types::{Bet, Stakes};
use rusqlite::{params, OptionalExtension};

const BET_COLUMNS: &str = "round_id, account_id, stakes, total_stake, placed_at, epoch";

pub struct BetStore<'a> {
    storage: &'a Storage,
}

impl<'a> BetStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn get(&self, round_id: &str, account_id: &str) -> Result<Option<Bet>> {
        let conn = self.storage.get_connection().await;

        let bet = conn
            .query_row(
                &format!(
                    "SELECT {} FROM bets WHERE round_id = ?1 AND account_id = ?2",
                    BET_COLUMNS
                ),
                params![round_id, account_id],
                bet_from_row,
            )
            .optional()?;

        Ok(bet)
    }

    /// Every bet placed on `round_id` during lifecycle `epoch`.
    pub async fn list(&self, round_id: &str, epoch: u64) -> Result<Vec<Bet>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bets WHERE round_id = ?1 AND epoch = ?2 ORDER BY account_id",
            BET_COLUMNS
        ))?;
        let bet_iter = stmt.query_map(params![round_id, to_sql_amount(epoch)?], bet_from_row)?;

        let mut bets = Vec::new();
        for bet in bet_iter {
            bets.push(bet?);
        }

        Ok(bets)
    }

    /// Insert or overwrite the bet for (round, account).
    pub fn upsert_in(txn: &Txn<'_>, bet: &Bet) -> Result<()> {
        let stakes_json = serde_json::to_string(&bet.stakes)?;

        txn.conn().execute(
            "INSERT OR REPLACE INTO bets (round_id, account_id, epoch, stakes, total_stake, placed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bet.round_id,
                bet.account_id,
                to_sql_amount(bet.epoch)?,
                stakes_json,
                to_sql_amount(bet.total_stake)?,
                bet.placed_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }
}

fn bet_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bet> {
    let stakes_str: String = row.get(2)?;
    let stakes: Stakes = serde_json::from_str(&stakes_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Bet {
        round_id: row.get(0)?,
        account_id: row.get(1)?,
        stakes,
        total_stake: amount_column(row, 3)?,
        placed_at: timestamp_column(row, 4)?,
        epoch: amount_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Door;

    fn bet(account_id: &str, epoch: u64, stakes: Stakes, storage: &Storage) -> Bet {
        Bet {
            round_id: "r1".to_string(),
            account_id: account_id.to_string(),
            total_stake: stakes.total().unwrap(),
            stakes,
            placed_at: storage.now(),
            epoch,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let storage = Storage::in_memory().await.unwrap();
        let first = bet("alice", 1, Stakes::new().with(Door::Chua, 100), &storage);
        let second = bet("alice", 1, Stakes::new().with(Door::Bo, 40), &storage);

        storage
            .transaction(|txn| BetStore::upsert_in(txn, &first))
            .await
            .unwrap();
        storage
            .transaction(|txn| BetStore::upsert_in(txn, &second))
            .await
            .unwrap();

        let stored = BetStore::new(&storage).get("r1", "alice").await.unwrap().unwrap();
        assert_eq!(stored.total_stake, 40);
        assert_eq!(stored.stakes.get(Door::Bo), 40);
        assert_eq!(stored.stakes.get(Door::Chua), 0);
    }

    #[tokio::test]
    async fn test_list_filters_epoch() {
        let storage = Storage::in_memory().await.unwrap();
        let old = bet("alice", 1, Stakes::new().with(Door::Chua, 100), &storage);
        let current = bet("bob", 2, Stakes::new().with(Door::Heo, 30), &storage);

        storage
            .transaction(|txn| {
                BetStore::upsert_in(txn, &old)?;
                BetStore::upsert_in(txn, &current)
            })
            .await
            .unwrap();

        let bets = BetStore::new(&storage).list("r1", 2).await.unwrap();
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].account_id, "bob");
    }
}
