use anyhow::Result;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use doorbet_core::AccountStore;
use doorbet_game::DoorBet;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Create a funded account
    Create {
        /// Account id (random if omitted)
        id: Option<String>,
        /// Opening balance in minor units
        #[arg(short, long, default_value_t = 0)]
        balance: u64,
    },
    /// Credit an existing account
    Deposit {
        /// Account id
        id: String,
        /// Amount in minor units
        amount: u64,
    },
    /// Show one account
    Show {
        /// Account id
        id: String,
    },
    /// List all accounts
    List,
}

pub async fn handle_account_command(cmd: AccountCommands, game: &DoorBet) -> Result<()> {
    let accounts = AccountStore::new(game.storage());

    match cmd {
        AccountCommands::Create { id, balance } => {
            let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let account = accounts.create(&id, balance).await?;

            println!("Account created successfully!");
            println!("  ID: {}", account.id);
            println!("  Balance: {}", account.balance);
        }

        AccountCommands::Deposit { id, amount } => {
            // Resolve first so a missing account reports as such.
            game.account(&id).await?;
            let account = accounts.deposit(&id, amount).await?;
            println!("Deposited {} into '{}'. New balance: {}", amount, id, account.balance);
        }

        AccountCommands::Show { id } => {
            let account = game.account(&id).await?;
            println!("Account '{}'", account.id);
            println!("  Balance: {}", account.balance);
        }

        AccountCommands::List => {
            let list = accounts.list().await?;
            if list.is_empty() {
                println!("No accounts found. Create one with 'doorbet account create'.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Balance"]);
            for account in list {
                table.add_row(vec![account.id, account.balance.to_string()]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
