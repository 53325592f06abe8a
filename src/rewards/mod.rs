//! Reward arithmetic: staking yield, check-in streaks and artifact rarity.
//!
//! All of it is pure. Randomness comes in through a caller-supplied `Rng`.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::clock::MS_PER_DAY;
use crate::error::LedgerError;
use crate::ledger::Amount;

const DAYS_PER_YEAR: u128 = 365;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u32", into = "u32")]
pub enum LockPeriod {
    Days30,
    Days90,
    Days180,
}

impl LockPeriod {
    pub const ALL: [LockPeriod; 3] = [LockPeriod::Days30, LockPeriod::Days90, LockPeriod::Days180];

    pub fn from_days(days: u32) -> Result<Self, LedgerError> {
        match days {
            30 => Ok(LockPeriod::Days30),
            90 => Ok(LockPeriod::Days90),
            180 => Ok(LockPeriod::Days180),
            _ => Err(LedgerError::InvalidLockPeriod { days }),
        }
    }

    pub fn days(self) -> u32 {
        match self {
            LockPeriod::Days30 => 30,
            LockPeriod::Days90 => 90,
            LockPeriod::Days180 => 180,
        }
    }

    /// Annual reward rate in whole percent.
    pub fn apy_percent(self) -> u32 {
        match self {
            LockPeriod::Days30 => 5,
            LockPeriod::Days90 => 15,
            LockPeriod::Days180 => 25,
        }
    }

    pub fn duration_ms(self) -> u64 {
        self.days() as u64 * MS_PER_DAY
    }
}

impl TryFrom<u32> for LockPeriod {
    type Error = LedgerError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        LockPeriod::from_days(days)
    }
}

impl From<LockPeriod> for u32 {
    fn from(period: LockPeriod) -> u32 {
        period.days()
    }
}

/// Linear, non-compounding stake yield: `amount * rate/100/365 * days`.
///
/// Computed over milliseconds in integer space and floored, so a stake that
/// is withdrawn immediately earns exactly zero.
pub fn stake_reward(amount: Amount, apy_percent: u32, elapsed_ms: u64) -> Amount {
    let numerator = amount as u128 * apy_percent as u128 * elapsed_ms as u128;
    let denominator = 100 * DAYS_PER_YEAR * MS_PER_DAY as u128;
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

/// `base * (1 + streak * bonus_tenths / 10)`.
pub fn checkin_reward(base: Amount, streak: u64, bonus_tenths: u64) -> Amount {
    let factor = 10u128 + streak as u128 * bonus_tenths as u128;
    u64::try_from(base as u128 * factor / 10).unwrap_or(u64::MAX)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

const SPECIAL_PROPERTIES: [&str; 5] = [
    "GUI Multiplier",
    "XP Boost",
    "Happiness Bonus",
    "Staking Bonus",
    "Colony Power",
];

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
    ];

    /// Cumulative upper bounds of the 60/25/10/4/1 distribution.
    const THRESHOLDS: [(f64, Rarity); 4] = [
        (0.60, Rarity::Common),
        (0.85, Rarity::Uncommon),
        (0.95, Rarity::Rare),
        (0.99, Rarity::Epic),
    ];

    pub fn roll<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let draw: f64 = rng.gen();
        Self::from_draw(draw)
    }

    /// Map a uniform draw in `[0, 1)` onto a tier.
    pub fn from_draw(draw: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(bound, _)| draw < *bound)
            .map(|(_, rarity)| *rarity)
            .unwrap_or(Rarity::Legendary)
    }

    pub fn gui_value(self) -> Amount {
        match self {
            Rarity::Common => 1_000,
            Rarity::Uncommon => 5_000,
            Rarity::Rare => 25_000,
            Rarity::Epic => 100_000,
            Rarity::Legendary => 500_000,
        }
    }

    pub fn special_properties(self) -> Vec<String> {
        let count = match self {
            Rarity::Legendary => 3,
            Rarity::Epic => 2,
            _ => 1,
        };
        SPECIAL_PROPERTIES[..count]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Epic => "Epic",
            Rarity::Legendary => "Legendary",
        };
        f.write_str(name)
    }
}
