mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use doorbet_game::{DoorBet, GameError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "doorbet")]
#[command(about = "DoorBet - stake on eight doors, settle with one draw")]
#[command(version)]
struct Cli {
    /// Data directory for the game database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Game configuration file (defaults to config.json in the data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Account management commands
    #[command(subcommand)]
    Account(commands::AccountCommands),

    /// Round lifecycle commands
    #[command(subcommand)]
    Round(commands::RoundCommands),

    /// Place or replace a bet, e.g. `doorbet bet r1 alice Chua=1000 Bo=2000`
    Bet {
        /// Round id
        round: String,
        /// Account id
        account: String,
        /// Stakes as door=amount pairs
        #[arg(required = true)]
        stakes: Vec<String>,
    },

    /// List the bets of a round
    Bets {
        /// Round id
        round: String,
    },

    /// Draw the outcome of a round and pay out
    Settle(commands::SettleArgs),

    /// Show recently settled rounds
    History {
        /// Maximum number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the jackpot balance
    Jackpot,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "doorbet={},doorbet_core={},doorbet_game={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CliConfig::load(cli.data_dir, cli.config.as_deref()).await?;

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    let game = DoorBet::open(&config.data_dir, &config.game).await?;

    // Execute command
    let result = match cli.command {
        Commands::Account(cmd) => commands::handle_account_command(cmd, &game).await,
        Commands::Round(cmd) => commands::handle_round_command(cmd, &game).await,
        Commands::Bet {
            round,
            account,
            stakes,
        } => commands::handle_bet(&game, &round, &account, &stakes).await,
        Commands::Bets { round } => commands::handle_bets(&game, &round).await,
        Commands::Settle(args) => commands::handle_settle(&game, &config.game, args).await,
        Commands::History { limit } => commands::handle_history(&game, limit).await,
        Commands::Jackpot => commands::handle_jackpot(&game).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<GameError>() {
            Some(GameError::RoundNotFound(id)) => {
                eprintln!("Error: Round '{}' not found", id);
                eprintln!("Use 'doorbet round list' to see recent rounds");
            }
            Some(GameError::AccountNotFound(id)) => {
                eprintln!("Error: Account '{}' not found", id);
                eprintln!("Use 'doorbet account list' to see available accounts");
            }
            Some(GameError::InsufficientBalance { need, available }) => {
                eprintln!("Error: Insufficient balance");
                eprintln!("Need: {}, Available: {}", need, available);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
