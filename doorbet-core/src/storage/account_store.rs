use crate::error::{Result, StoreError};
use crate::storage::{amount_column, to_sql_amount, Storage, Txn};
use crate::types::Account;
use rusqlite::{params, Connection, OptionalExtension};

pub struct AccountStore<'a> {
    storage: &'a Storage,
}

impl<'a> AccountStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Provision an account. Game operations never call this.
    pub async fn create(&self, account_id: &str, balance: u64) -> Result<Account> {
        let balance_sql = to_sql_amount(balance)?;
        let now = self.storage.now().timestamp_millis();
        let conn = self.storage.get_connection().await;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO accounts (id, balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![account_id, balance_sql, now],
        )?;

        if inserted == 0 {
            return Err(StoreError::precondition(format!(
                "Account '{}' already exists",
                account_id
            )));
        }

        tracing::info!("Created account {} with balance {}", account_id, balance);
        Ok(Account {
            id: account_id.to_string(),
            balance,
        })
    }

    /// Credit an existing account outside of any game operation.
    pub async fn deposit(&self, account_id: &str, amount: u64) -> Result<Account> {
        let delta = to_sql_amount(amount)?;
        self.storage
            .transaction(|txn| -> Result<Account> {
                Self::increment_in(txn, account_id, delta)?;
                Self::get_in(txn, account_id)?
                    .ok_or_else(|| StoreError::internal("Account vanished during deposit"))
            })
            .await
    }

    pub async fn get(&self, account_id: &str) -> Result<Option<Account>> {
        let conn = self.storage.get_connection().await;
        fetch(&conn, account_id)
    }

    pub async fn list(&self) -> Result<Vec<Account>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT id, balance FROM accounts ORDER BY id")?;
        let account_iter = stmt.query_map([], |row| {
            Ok(Account {
                id: row.get(0)?,
                balance: amount_column(row, 1)?,
            })
        })?;

        let mut accounts = Vec::new();
        for account in account_iter {
            accounts.push(account?);
        }

        Ok(accounts)
    }

    pub fn get_in(txn: &Txn<'_>, account_id: &str) -> Result<Option<Account>> {
        fetch(txn.conn(), account_id)
    }

    /// Apply a signed balance change. Fails if the account is missing or the balance
    /// would drop below zero; the caller's transaction is expected to roll back.
    pub fn increment_in(txn: &Txn<'_>, account_id: &str, delta: i64) -> Result<()> {
        let updated = txn.conn().execute(
            "UPDATE accounts SET balance = balance + ?2, updated_at = ?3
             WHERE id = ?1 AND balance + ?2 >= 0",
            params![account_id, delta, txn.now().timestamp_millis()],
        )?;

        if updated == 0 {
            return Err(StoreError::precondition(format!(
                "Cannot apply {} to account '{}'",
                delta, account_id
            )));
        }

        Ok(())
    }
}

fn fetch(conn: &Connection, account_id: &str) -> Result<Option<Account>> {
    let account = conn
        .query_row(
            "SELECT id, balance FROM accounts WHERE id = ?1",
            params![account_id],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    balance: amount_column(row, 1)?,
                })
            },
        )
        .optional()?;

    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_deposit() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);

        accounts.create("alice", 10_000).await.unwrap();
        assert!(accounts.create("alice", 1).await.is_err());

        let alice = accounts.deposit("alice", 500).await.unwrap();
        assert_eq!(alice.balance, 10_500);
        assert!(accounts.deposit("nobody", 1).await.is_err());
        assert!(accounts.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_balance_cannot_go_negative() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);
        accounts.create("alice", 100).await.unwrap();

        let result = storage
            .transaction(|txn| AccountStore::increment_in(txn, "alice", -101))
            .await;
        assert!(matches!(result, Err(StoreError::PreconditionFailed(_))));
        assert_eq!(accounts.get("alice").await.unwrap().unwrap().balance, 100);
    }
}
