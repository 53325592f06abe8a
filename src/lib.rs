//! In-memory GUI token ledger behind the WalkScape explore-and-collect game.
//!
//! `GuiContract` is the entry point: it owns a `LedgerState`, the wallet
//! sessions, the market feed, a clock and a seedable RNG. Nothing is global;
//! build one contract per game session and drop it when done.

pub mod clock;
pub mod config;
pub mod contracts;
pub mod error;
pub mod ledger;
pub mod market;
pub mod rewards;
pub mod scanner;
pub mod sim;
pub mod wallet;

pub use config::{LedgerConfig, RestakePolicy};
pub use contracts::{ActionOutcome, ContractAction, GuiContract};
pub use error::LedgerError;
pub use ledger::{AccountId, Amount, LedgerState};
