use crate::error::Result;
use crate::storage::{amount_column, to_sql_amount, Storage, Txn};
use rusqlite::OptionalExtension;

pub struct JackpotStore<'a> {
    storage: &'a Storage,
}

impl<'a> JackpotStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Current jackpot, zero before the first settlement.
    pub async fn value(&self) -> Result<u64> {
        let conn = self.storage.get_connection().await;

        let value = conn
            .query_row("SELECT value FROM jackpot WHERE id = 1", [], |row| {
                amount_column(row, 0)
            })
            .optional()?;

        Ok(value.unwrap_or(0))
    }

    pub fn increment_in(txn: &Txn<'_>, delta: u64) -> Result<()> {
        txn.conn().execute(
            "INSERT INTO jackpot (id, value) VALUES (1, ?1)
             ON CONFLICT(id) DO UPDATE SET value = value + excluded.value",
            [to_sql_amount(delta)?],
        )?;

        Ok(())
    }
}
