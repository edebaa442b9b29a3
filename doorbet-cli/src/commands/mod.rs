pub mod account;
pub mod play;
pub mod round;

pub use account::{handle_account_command, AccountCommands};
pub use play::{handle_bet, handle_bets, handle_history, handle_jackpot, handle_settle, SettleArgs};
pub use round::{handle_round_command, RoundCommands};

use chrono::{DateTime, Utc};

pub(crate) fn format_time(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
