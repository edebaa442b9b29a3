use crate::error::Result;
use crate::storage::{amount_column, parsed_column, timestamp_column, to_sql_amount, Storage, Txn};
use crate::types::{HistoryEntry, Outcome};
use rusqlite::params;

/// Append-only log of settled outcomes.
pub struct HistoryStore<'a> {
    storage: &'a Storage,
}

impl<'a> HistoryStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Newest entries first.
    pub async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round_id, epoch, result, settled_at
             FROM history ORDER BY seq DESC LIMIT ?1",
        )?;
        let entry_iter = stmt.query_map(params![limit as i64], entry_from_row)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }

    /// Every settled lifecycle of `round_id`, oldest first.
    pub async fn for_round(&self, round_id: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT round_id, epoch, result, settled_at
             FROM history WHERE round_id = ?1 ORDER BY seq ASC",
        )?;
        let entry_iter = stmt.query_map(params![round_id], entry_from_row)?;

        let mut entries = Vec::new();
        for entry in entry_iter {
            entries.push(entry?);
        }

        Ok(entries)
    }

    /// The (round, epoch) uniqueness constraint rejects a second row for one lifecycle.
    pub fn append_in(txn: &Txn<'_>, round_id: &str, epoch: u64, result: Outcome) -> Result<()> {
        txn.conn().execute(
            "INSERT INTO history (round_id, epoch, result, settled_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                round_id,
                to_sql_amount(epoch)?,
                result.as_str(),
                txn.now().timestamp_millis(),
            ],
        )?;

        Ok(())
    }
}

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    Ok(HistoryEntry {
        round_id: row.get(0)?,
        epoch: amount_column(row, 1)?,
        result: parsed_column(row, 2)?,
        settled_at: timestamp_column(row, 3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Door;

    #[tokio::test]
    async fn test_one_entry_per_lifecycle() {
        let storage = Storage::in_memory().await.unwrap();

        storage
            .transaction(|txn| HistoryStore::append_in(txn, "r1", 1, Outcome::Salad))
            .await
            .unwrap();
        let duplicate = storage
            .transaction(|txn| HistoryStore::append_in(txn, "r1", 1, Outcome::Pizza))
            .await;
        assert!(duplicate.is_err());

        storage
            .transaction(|txn| HistoryStore::append_in(txn, "r1", 2, Outcome::Door(Door::Ca)))
            .await
            .unwrap();

        let history = HistoryStore::new(&storage);
        let entries = history.for_round("r1").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].result, Outcome::Salad);

        let recent = history.recent(1).await.unwrap();
        assert_eq!(recent[0].result, Outcome::Door(Door::Ca));
    }
}
