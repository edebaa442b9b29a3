//! DoorBet core library
//!
//! Data model, configuration and the transactional SQLite store the game
//! components run on. The store offers three primitives: closure transactions
//! with conflict retry, atomic write batches, and a monotonic server clock.

pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{GameConfig, OddsConfig, RetryPolicy};
pub use error::{Result, StoreError, TransactionError};
pub use storage::{
    AccountStore, BetStore, HistoryStore, JackpotStore, LockOutcome, RoundStore, Storage, Txn,
    Write, WriteBatch,
};
pub use types::{
    Account, Bet, Door, DoorGroup, HistoryEntry, Outcome, Round, RoundStatus, StakeError, Stakes,
    UnknownDoor,
};
