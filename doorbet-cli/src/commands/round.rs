use super::format_time;
use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use doorbet_game::{DoorBet, GameError};

#[derive(Subcommand)]
pub enum RoundCommands {
    /// Open a round for betting, resetting it if it already exists
    Open {
        /// Round id (generated if omitted)
        #[arg(short, long)]
        id: Option<String>,
        /// Jackpot seed recorded on the round
        #[arg(short, long)]
        seed: Option<u64>,
        /// Skip the confirmation prompt when resetting an existing round
        #[arg(short, long)]
        yes: bool,
    },
    /// Show one round
    Show {
        /// Round id
        id: String,
    },
    /// List recent rounds
    List {
        /// Maximum number of rounds to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn handle_round_command(cmd: RoundCommands, game: &DoorBet) -> Result<()> {
    match cmd {
        RoundCommands::Open { id, seed, yes } => {
            if let Some(id) = id.as_deref() {
                let existing = match game.round(id).await {
                    Ok(round) => Some(round),
                    Err(GameError::RoundNotFound(_)) => None,
                    Err(e) => return Err(e.into()),
                };

                if let Some(round) = existing {
                    if !yes {
                        let confirm = Confirm::new()
                            .with_prompt(format!(
                                "Round '{}' is {}. Reopen it? Bets from its current lifecycle will no longer settle.",
                                round.id, round.status
                            ))
                            .default(false)
                            .interact()?;

                        if !confirm {
                            println!("Open cancelled.");
                            return Ok(());
                        }
                    }
                }
            }

            let round = game.open_round(id.as_deref(), seed).await?;
            println!("Round '{}' is open for betting (lifecycle {})", round.id, round.epoch);
        }

        RoundCommands::Show { id } => {
            let round = game.round(&id).await?;
            let bets = game.bets(&id).await?;
            let staked: u64 = bets.iter().map(|bet| bet.total_stake).sum();

            println!("Round '{}'", round.id);
            println!("  Status: {}", round.status);
            println!(
                "  Result: {}",
                round.result.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string())
            );
            println!("  Jackpot seed: {}", round.jackpot_seed);
            println!("  Started: {}", format_time(round.started_at));
            if let Some(ended_at) = round.ended_at {
                println!("  Ended: {}", format_time(ended_at));
            }
            println!("  Bets: {} ({} staked)", bets.len(), staked);
        }

        RoundCommands::List { limit } => {
            let rounds = game.rounds(limit).await?;
            if rounds.is_empty() {
                println!("No rounds yet. Open one with 'doorbet round open'.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Status", "Result", "Started", "Ended"]);
            for round in rounds {
                table.add_row(vec![
                    round.id,
                    round.status.to_string(),
                    round.result.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    format_time(round.started_at),
                    round.ended_at.map(format_time).unwrap_or_else(|| "-".to_string()),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
