use thiserror::Error;

use crate::ledger::{AccountId, Amount};

/// Errors surfaced by the ledger and the contract call surface.
///
/// Soft rejections (insufficient balance, check-in too soon, no active stake)
/// are not errors at the contract layer; they come back as `success: false`
/// outcomes. The store itself reports them through this type so the contract
/// can translate them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("wallet not connected")]
    WalletNotConnected,
    #[error("player {account} not registered")]
    PlayerNotRegistered { account: AccountId },
    #[error("insufficient balance in account {account}: need {needed}, have {available}")]
    InsufficientBalance {
        account: AccountId,
        needed: Amount,
        available: Amount,
    },
    #[error("check-in for {account} too soon, next in {remaining_ms} ms")]
    CheckinTooSoon { account: AccountId, remaining_ms: u64 },
    #[error("no active stake for {account}")]
    NoActiveStake { account: AccountId },
    #[error("stake already active for {account}")]
    StakeAlreadyActive { account: AccountId },
    #[error("unsupported lock period of {days} days")]
    InvalidLockPeriod { days: u32 },
    #[error("unknown pet type {0}")]
    InvalidPetType(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value: {0}")]
    Invalid(&'static str),
}
