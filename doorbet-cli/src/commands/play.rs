use super::format_time;
use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Table};
use doorbet_core::{Door, GameConfig};
use doorbet_game::{DoorBet, Odds, RandomDraw};
use std::sync::Arc;

#[derive(Args)]
pub struct SettleArgs {
    /// Round id
    pub round: String,
    /// Probability of SALAD for this draw
    #[arg(long)]
    pub salad: Option<f64>,
    /// Probability of PIZZA for this draw
    #[arg(long)]
    pub pizza: Option<f64>,
    /// Seed the draw for a reproducible outcome
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Accept the canonical door names as well as their plain ASCII spelling
/// (`cai` for `Cải`).
fn door_name(input: &str) -> String {
    Door::ALL
        .iter()
        .find(|door| door.as_str() == input || format!("{:?}", door).eq_ignore_ascii_case(input))
        .map(|door| door.as_str().to_string())
        .unwrap_or_else(|| input.to_string())
}

/// Split `door=amount` pairs. Amounts are passed through untyped so malformed values
/// follow the game's own stake rules.
fn parse_stakes(pairs: &[String]) -> Result<Vec<(String, serde_json::Value)>> {
    pairs
        .iter()
        .map(|pair| {
            let Some((door, amount)) = pair.split_once('=') else {
                bail!("Expected door=amount, got '{}'", pair);
            };
            Ok((
                door_name(door.trim()),
                serde_json::Value::String(amount.trim().to_string()),
            ))
        })
        .collect()
}

pub async fn handle_bet(game: &DoorBet, round_id: &str, account_id: &str, pairs: &[String]) -> Result<()> {
    let raw = parse_stakes(pairs)?;
    let bet = game.place_bet_raw(round_id, account_id, raw).await?;
    let account = game.account(account_id).await?;

    println!("Bet placed on round '{}'", bet.round_id);
    for (door, amount) in bet.stakes.iter() {
        println!("  {}: {}", door, amount);
    }
    println!("  Total: {}", bet.total_stake);
    println!("  Balance: {}", account.balance);
    Ok(())
}

pub async fn handle_bets(game: &DoorBet, round_id: &str) -> Result<()> {
    let bets = game.bets(round_id).await?;
    if bets.is_empty() {
        println!("No bets on round '{}'.", round_id);
        return Ok(());
    }

    let mut header = vec!["Account".to_string()];
    header.extend(Door::ALL.iter().map(|door| door.to_string()));
    header.push("Total".to_string());
    header.push("Placed".to_string());

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(header);
    for bet in bets {
        let mut row = vec![bet.account_id.clone()];
        row.extend(Door::ALL.iter().map(|door| match bet.stakes.get(*door) {
            0 => String::new(),
            amount => amount.to_string(),
        }));
        row.push(bet.total_stake.to_string());
        row.push(format_time(bet.placed_at));
        table.add_row(row);
    }
    println!("{}", table);
    Ok(())
}

pub async fn handle_settle(
    game: &DoorBet,
    config: &GameConfig,
    args: SettleArgs,
) -> Result<()> {
    let odds = if args.salad.is_some() || args.pizza.is_some() {
        Some(Odds::from(config.default_odds).with_overrides(args.salad, args.pizza)?)
    } else {
        None
    };

    let report = match args.seed {
        Some(seed) => {
            let seeded = DoorBet::new(game.storage().clone(), config, Arc::new(RandomDraw::seeded(seed)));
            seeded.settle_with_report(&args.round, odds).await?
        }
        None => game.settle_with_report(&args.round, odds).await?,
    };

    if !report.drawn {
        println!("Round '{}' was already settled: {}", report.round_id, report.result);
        return Ok(());
    }

    println!("Round '{}' settled: {}", report.round_id, report.result);
    println!("  Bets: {}", report.bets);
    println!("  Credited: {}", report.total_credited);
    println!("  Jackpot: +{}", report.jackpot_increase);
    Ok(())
}

pub async fn handle_history(game: &DoorBet, limit: usize) -> Result<()> {
    let entries = game.history(limit).await?;
    if entries.is_empty() {
        println!("No settled rounds yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Round", "Lifecycle", "Result", "Settled"]);
    for entry in entries {
        table.add_row(vec![
            entry.round_id,
            entry.epoch.to_string(),
            entry.result.to_string(),
            format_time(entry.settled_at),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub async fn handle_jackpot(game: &DoorBet) -> Result<()> {
    println!("Jackpot: {}", game.jackpot().await?);
    Ok(())
}
