//! Scripted play-through of the contract against a manual clock.
//!
//! A script is a JSON array of steps. Players are referred to by alias; each
//! alias owns one wallet session for the lifetime of the run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::{Clock, ManualClock, MS_PER_DAY};
use crate::config::LedgerConfig;
use crate::error::ConfigError;
use crate::contracts::{ActionOutcome, ContractAction, GuiContract};
use crate::ledger::{AccountId, LedgerSnapshot};
use crate::market::TokenInfo;
use crate::wallet::SessionId;

/// 2024-01-01T00:00:00Z, the default start of simulated time.
pub const DEFAULT_START_MS: u64 = 1_704_067_200_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    Connect {
        player: String,
        #[serde(default)]
        address: Option<AccountId>,
    },
    Disconnect {
        player: String,
    },
    Advance {
        #[serde(default)]
        days: u64,
        #[serde(default)]
        ms: u64,
    },
    Call {
        player: String,
        call: ContractAction,
    },
    Market,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepReport {
    Connected {
        player: String,
        address: AccountId,
        session: SessionId,
    },
    Disconnected {
        player: String,
        was_connected: bool,
    },
    Advanced {
        now: u64,
    },
    Called {
        player: String,
        outcome: ActionOutcome,
    },
    Failed {
        player: String,
        error: String,
    },
    Market {
        token: TokenInfo,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("step {step}: unknown player alias {player}")]
    UnknownPlayer { step: usize, player: String },
    #[error("invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct Simulation {
    contract: GuiContract,
    clock: ManualClock,
    players: BTreeMap<String, SessionId>,
}

impl Simulation {
    pub fn new(config: LedgerConfig, start_ms: u64) -> Result<Self, SimError> {
        let clock = ManualClock::new(start_ms);
        Ok(Self {
            contract: GuiContract::with_clock(config, clock.clone())?,
            clock,
            players: BTreeMap::new(),
        })
    }

    pub fn contract(&self) -> &GuiContract {
        &self.contract
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.contract.ledger().snapshot()
    }

    pub fn parse_script(json: &str) -> Result<Vec<ScriptStep>, SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn run(&mut self, steps: &[ScriptStep]) -> Result<Vec<StepReport>, SimError> {
        let mut reports = Vec::with_capacity(steps.len());
        for (idx, step) in steps.iter().enumerate() {
            reports.push(self.step(idx, step)?);
        }
        info!(steps = steps.len(), height = self.contract.ledger().meta.height, "script finished");
        Ok(reports)
    }

    fn session(&self, idx: usize, player: &str) -> Result<SessionId, SimError> {
        self.players
            .get(player)
            .copied()
            .ok_or_else(|| SimError::UnknownPlayer {
                step: idx,
                player: player.to_string(),
            })
    }

    fn step(&mut self, idx: usize, step: &ScriptStep) -> Result<StepReport, SimError> {
        Ok(match step {
            ScriptStep::Connect { player, address } => {
                let session = match address {
                    Some(address) => self.contract.connect_as(address.clone()),
                    None => self.contract.connect(),
                };
                self.players.insert(player.clone(), session.id);
                StepReport::Connected {
                    player: player.clone(),
                    address: session.address,
                    session: session.id,
                }
            }
            ScriptStep::Disconnect { player } => {
                let session = self.session(idx, player)?;
                StepReport::Disconnected {
                    player: player.clone(),
                    was_connected: self.contract.disconnect(session),
                }
            }
            ScriptStep::Advance { days, ms } => {
                self.clock
                    .advance_ms(days.saturating_mul(MS_PER_DAY).saturating_add(*ms));
                StepReport::Advanced {
                    now: self.clock.now_ms(),
                }
            }
            ScriptStep::Call { player, call } => {
                let session = self.session(idx, player)?;
                match self.contract.apply_action(session, call.clone()) {
                    Ok(outcome) => StepReport::Called {
                        player: player.clone(),
                        outcome,
                    },
                    Err(err) => {
                        warn!(step = idx, %player, %err, "call failed");
                        StepReport::Failed {
                            player: player.clone(),
                            error: err.to_string(),
                        }
                    }
                }
            }
            ScriptStep::Market => StepReport::Market {
                token: self.contract.gui_market_data(),
            },
        })
    }
}

/// Register, check in, stake for a year, and go scanning.
pub fn demo_script() -> Vec<ScriptStep> {
    let call = |call: ContractAction| ScriptStep::Call {
        player: "walker".into(),
        call,
    };
    vec![
        ScriptStep::Connect {
            player: "walker".into(),
            address: None,
        },
        call(ContractAction::Register),
        ScriptStep::Advance { days: 1, ms: 0 },
        call(ContractAction::DailyCheckin),
        call(ContractAction::DailyCheckin),
        call(ContractAction::Stake {
            amount: 100_000,
            lock_period_days: 90,
        }),
        call(ContractAction::AdoptPet {
            pet_type: crate::ledger::PetType::GuiPup,
            investment: 25_000,
        }),
        call(ContractAction::CreateColony {
            name: "Mossy Commons".into(),
            pool: 50_000,
        }),
        call(ContractAction::ClaimArtifact {
            name: "Mushroom".into(),
            location: "51.500700, -0.124600".into(),
        }),
        call(ContractAction::ClaimArtifact {
            name: "Fossil".into(),
            location: "51.501000, -0.125000".into(),
        }),
        ScriptStep::Advance { days: 365, ms: 0 },
        call(ContractAction::Unstake),
        ScriptStep::Market,
    ]
}
