use crate::draw::{Odds, OutcomeDraw};
use crate::round::RoundManager;
use crate::{GameError, Result};
use doorbet_core::{
    Bet, BetStore, DoorGroup, LockOutcome, Outcome, Round, RoundStatus, Stakes, Storage,
    StoreError, Write, WriteBatch,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Figures of one settlement call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub round_id: String,
    pub result: Outcome,
    /// `false` when the round had already been settled and only the stored result is
    /// reported; the figures below are then zero.
    pub drawn: bool,
    pub bets: usize,
    pub total_credited: u64,
    pub jackpot_increase: u64,
}

impl SettlementReport {
    fn stored(round: &Round) -> Result<Self> {
        let result = round.result.ok_or_else(|| {
            GameError::internal(format!("settled round {} has no result", round.id))
        })?;

        Ok(Self {
            round_id: round.id.clone(),
            result,
            drawn: false,
            bets: 0,
            total_credited: 0,
            jackpot_increase: 0,
        })
    }
}

/// Credits and jackpot contribution derived from one outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payouts {
    pub credits: Vec<(String, u64)>,
    pub total_credited: u64,
    pub jackpot_increase: u64,
}

/// What a single bet wins under `result`.
pub fn win_for(stakes: &Stakes, result: Outcome) -> Option<u64> {
    match result {
        Outcome::Salad => stakes.group_total(DoorGroup::Vegetable),
        Outcome::Pizza => stakes.group_total(DoorGroup::Meat),
        Outcome::Door(door) => stakes.get(door).checked_mul(2),
    }
}

/// Winners get their win credited; whatever a bet did not win back goes to the jackpot.
pub fn compute_payouts(bets: &[Bet], result: Outcome) -> Result<Payouts> {
    let overflow = || GameError::internal("payout arithmetic overflowed");
    let mut payouts = Payouts::default();

    for bet in bets {
        let win = win_for(&bet.stakes, result).ok_or_else(overflow)?;
        payouts.jackpot_increase = payouts
            .jackpot_increase
            .checked_add(bet.total_stake.saturating_sub(win))
            .ok_or_else(overflow)?;

        if win > 0 {
            payouts.total_credited = payouts.total_credited.checked_add(win).ok_or_else(overflow)?;
            payouts.credits.push((bet.account_id.clone(), win));
        }
    }

    Ok(payouts)
}

enum Resolution {
    Settled(SettlementReport),
    Claimed(Round),
}

/// Draws outcomes and finalizes rounds in a single write batch.
pub struct SettlementEngine {
    storage: Arc<Storage>,
    rounds: RoundManager,
    draw: Arc<dyn OutcomeDraw>,
    default_odds: Odds,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl SettlementEngine {
    pub fn new(storage: Arc<Storage>, draw: Arc<dyn OutcomeDraw>) -> Self {
        Self {
            rounds: RoundManager::new(storage.clone()),
            storage,
            draw,
            default_odds: Odds::default(),
            poll_attempts: 50,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_default_odds(mut self, odds: Odds) -> Self {
        self.default_odds = odds;
        self
    }

    /// How long a caller that lost the lock waits for the winner before treating the
    /// round as stuck.
    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    pub async fn settle(&self, round_id: &str, odds: Option<Odds>) -> Result<Outcome> {
        Ok(self.settle_with_report(round_id, odds).await?.result)
    }

    /// Settle `round_id`, or report the stored result if it already is.
    ///
    /// Exactly one caller per lifecycle wins the betting -> locked swap and draws. A
    /// caller that loses waits for the winner's result. If the round stays locked past
    /// the polling window (the winner died before committing), one waiting caller takes
    /// over with a fresh claim and settles it.
    pub async fn settle_with_report(
        &self,
        round_id: &str,
        odds: Option<Odds>,
    ) -> Result<SettlementReport> {
        let round = self.rounds.get(round_id).await?;
        if round.status == RoundStatus::Settled {
            tracing::debug!("Round {} already settled", round_id);
            return SettlementReport::stored(&round);
        }

        let odds = odds.unwrap_or(self.default_odds);
        odds.validate()?;

        let claimed = match self.rounds.lock(round_id).await? {
            LockOutcome::Acquired(round) => round,
            LockOutcome::Lost(current) => match self.wait_or_take_over(current).await? {
                Resolution::Settled(report) => return Ok(report),
                Resolution::Claimed(round) => round,
            },
        };

        self.settle_claimed(claimed, &odds).await
    }

    async fn wait_or_take_over(&self, mut observed: Round) -> Result<Resolution> {
        // One wait for the current claimant, and one more if a take-over is lost.
        for _ in 0..2 {
            for _ in 0..self.poll_attempts {
                match observed.status {
                    RoundStatus::Settled => {
                        return Ok(Resolution::Settled(SettlementReport::stored(&observed)?))
                    }
                    RoundStatus::Betting => {
                        // Re-opened while we waited: compete for the new lifecycle.
                        match self.rounds.lock(&observed.id).await? {
                            LockOutcome::Acquired(round) => return Ok(Resolution::Claimed(round)),
                            LockOutcome::Lost(round) => {
                                observed = round;
                                continue;
                            }
                        }
                    }
                    RoundStatus::Locked => {}
                }

                tracing::debug!(
                    "Waiting for round {} to settle (claim {})",
                    observed.id,
                    observed.claim
                );
                tokio::time::sleep(self.poll_interval).await;
                observed = self.rounds.get(&observed.id).await?;
            }

            match observed.status {
                RoundStatus::Settled => {
                    return Ok(Resolution::Settled(SettlementReport::stored(&observed)?))
                }
                RoundStatus::Locked => {
                    if let Some(round) = self.rounds.take_over(&observed.id, observed.claim).await? {
                        return Ok(Resolution::Claimed(round));
                    }
                    observed = self.rounds.get(&observed.id).await?;
                }
                RoundStatus::Betting => {}
            }
        }

        Err(GameError::SettlementInProgress(observed.id))
    }

    async fn settle_claimed(&self, round: Round, odds: &Odds) -> Result<SettlementReport> {
        let result = self.draw.draw(odds);
        tracing::info!(
            "Round {} drew {} (claim {})",
            round.id,
            result,
            round.claim
        );

        let bets = BetStore::new(&self.storage)
            .list(&round.id, round.epoch)
            .await?;
        let payouts = compute_payouts(&bets, result)?;

        let mut batch = WriteBatch::new();
        // The conditional finalize goes first so a stale claim fails the batch before
        // anything else is checked.
        batch.push(Write::FinalizeRound {
            round_id: round.id.clone(),
            claim: round.claim,
            result,
        });
        for (account_id, win) in &payouts.credits {
            let delta = i64::try_from(*win)
                .map_err(|_| GameError::internal("payout exceeds balance range"))?;
            batch.increment_balance(account_id.clone(), delta);
        }
        batch.increment_jackpot(payouts.jackpot_increase);
        batch.push(Write::AppendHistory {
            round_id: round.id.clone(),
            epoch: round.epoch,
            result,
        });

        match self.storage.commit(batch).await {
            Ok(_) => {}
            Err(StoreError::PreconditionFailed(reason)) => {
                tracing::warn!("Settlement batch for round {} refused: {}", round.id, reason);
                let current = self.rounds.get(&round.id).await?;
                if current.status == RoundStatus::Settled {
                    return SettlementReport::stored(&current);
                }
                return Err(GameError::Store(StoreError::PreconditionFailed(reason)));
            }
            Err(e) => {
                tracing::error!("Settlement of round {} failed, round stays locked: {}", round.id, e);
                return Err(e.into());
            }
        }

        tracing::info!(
            "Round {} settled as {}: {} bets, {} credited, jackpot +{}",
            round.id,
            result,
            bets.len(),
            payouts.total_credited,
            payouts.jackpot_increase
        );

        Ok(SettlementReport {
            round_id: round.id,
            result,
            drawn: true,
            bets: bets.len(),
            total_credited: payouts.total_credited,
            jackpot_increase: payouts.jackpot_increase,
        })
    }
}
