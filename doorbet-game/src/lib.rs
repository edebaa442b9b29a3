//! DoorBet game engine
//!
//! Participants stake on eight doors while a round is open for betting. Settlement
//! locks the round, draws one outcome and pays every bet in a single atomic batch,
//! sending whatever was not won back to the jackpot.

pub mod draw;
pub mod error;
pub mod ledger;
pub mod round;
pub mod settlement;


pub use draw::{FixedDraw, Odds, OutcomeDraw, RandomDraw};
pub use error::{ErrorKind, GameError, Result};
pub use ledger::BettingLedger;
pub use round::RoundManager;
pub use settlement::{SettlementEngine, SettlementReport};

use doorbet_core::{
    Account, AccountStore, Bet, GameConfig, HistoryEntry, HistoryStore, JackpotStore, Outcome,
    Round, Stakes, Storage,
};
use std::path::Path;
use std::sync::Arc;

/// The operation surface: one method per caller request.
pub struct DoorBet {
    storage: Arc<Storage>,
    rounds: RoundManager,
    ledger: BettingLedger,
    settlement: SettlementEngine,
}

impl DoorBet {
    pub fn new(storage: Arc<Storage>, config: &GameConfig, draw: Arc<dyn OutcomeDraw>) -> Self {
        let settlement = SettlementEngine::new(storage.clone(), draw)
            .with_default_odds(config.default_odds.into())
            .with_polling(config.settle_poll_attempts, config.settle_poll_interval);

        Self {
            rounds: RoundManager::new(storage.clone()),
            ledger: BettingLedger::new(storage.clone()),
            settlement,
            storage,
        }
    }

    /// Open the database under `data_dir` and draw outcomes from OS entropy.
    pub async fn open(data_dir: &Path, config: &GameConfig) -> Result<Self> {
        config.validate()?;
        let storage = Storage::new(&data_dir.join(&config.db_file))
            .await?
            .with_retry_policy(config.retry);

        Ok(Self::new(
            Arc::new(storage),
            config,
            Arc::new(RandomDraw::from_entropy()),
        ))
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub async fn open_round(&self, round_id: Option<&str>, jackpot_seed: Option<u64>) -> Result<Round> {
        self.rounds.open(round_id, jackpot_seed.unwrap_or(0)).await
    }

    pub async fn place_bet(&self, round_id: &str, account_id: &str, stakes: &Stakes) -> Result<Bet> {
        self.ledger.place_bet(round_id, account_id, stakes).await
    }

    pub async fn place_bet_raw<I, K>(&self, round_id: &str, account_id: &str, raw: I) -> Result<Bet>
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: AsRef<str>,
    {
        self.ledger.place_bet_raw(round_id, account_id, raw).await
    }

    pub async fn settle(&self, round_id: &str, odds: Option<Odds>) -> Result<Outcome> {
        self.settlement.settle(round_id, odds).await
    }

    pub async fn settle_with_report(
        &self,
        round_id: &str,
        odds: Option<Odds>,
    ) -> Result<SettlementReport> {
        self.settlement.settle_with_report(round_id, odds).await
    }

    pub async fn round(&self, round_id: &str) -> Result<Round> {
        self.rounds.get(round_id).await
    }

    pub async fn rounds(&self, limit: usize) -> Result<Vec<Round>> {
        self.rounds.list(limit).await
    }

    pub async fn bets(&self, round_id: &str) -> Result<Vec<Bet>> {
        self.ledger.bets(round_id).await
    }

    pub async fn account(&self, account_id: &str) -> Result<Account> {
        AccountStore::new(&self.storage)
            .get(account_id)
            .await?
            .ok_or_else(|| GameError::AccountNotFound(account_id.to_string()))
    }

    pub async fn jackpot(&self) -> Result<u64> {
        Ok(JackpotStore::new(&self.storage).value().await?)
    }

    pub async fn history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        Ok(HistoryStore::new(&self.storage).recent(limit).await?)
    }
}
