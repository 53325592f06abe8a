//! The GUI game contract: the call surface the game client drives.
//!
//! Every call names the wallet session it acts for. Rejections the client
//! is expected to handle (insufficient balance, check-in too soon, nothing
//! staked) come back as `success: false` outcomes; only a missing session,
//! an unregistered check-in and malformed arguments are errors.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{ConfigError, LedgerError};
use crate::ledger::{AccountId, Amount, Artifact, LedgerState, PetType, PlayerStats, StakeView};
use crate::market::{Market, TokenInfo};
use crate::rewards::{LockPeriod, Rarity};
use crate::wallet::{Session, SessionId, Sessions};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckinOutcome {
    pub success: bool,
    pub gui_reward: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnstakeOutcome {
    pub success: bool,
    pub amount: Amount,
    pub rewards: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub success: bool,
    pub gui_reward: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ContractAction {
    Register,
    DailyCheckin,
    Stake {
        amount: Amount,
        lock_period_days: u32,
    },
    Unstake,
    AdoptPet {
        pet_type: PetType,
        investment: Amount,
    },
    CreateColony {
        name: String,
        pool: Amount,
    },
    ClaimArtifact {
        name: String,
        location: String,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Registered { created: bool },
    CheckedIn(CheckinOutcome),
    Staked { success: bool },
    Unstaked(UnstakeOutcome),
    PetAdopted { success: bool },
    ColonyCreated { success: bool },
    ArtifactClaimed(ClaimOutcome),
}

pub struct GuiContract {
    config: LedgerConfig,
    ledger: LedgerState,
    sessions: Sessions,
    market: Market,
    clock: Box<dyn Clock>,
    rng: StdRng,
}

/// Demote client-visible rejections to `None`, keep the rest as errors.
fn soft<T>(call: &'static str, result: Result<T, LedgerError>) -> Result<Option<T>, LedgerError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            err @ (LedgerError::InsufficientBalance { .. }
            | LedgerError::StakeAlreadyActive { .. }
            | LedgerError::CheckinTooSoon { .. }
            | LedgerError::NoActiveStake { .. }
            | LedgerError::PlayerNotRegistered { .. }),
        ) => {
            warn!(call, %err, "contract call rejected");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl GuiContract {
    pub fn new(config: LedgerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }

    pub fn with_clock(
        config: LedgerConfig,
        clock: impl Clock + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            market: Market::new(&config),
            ledger: LedgerState::with_event_limit(config.event_log_limit),
            config,
            sessions: Sessions::new(),
            clock: Box::new(clock),
            rng,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn connect(&mut self) -> Session {
        self.sessions.connect(&mut self.rng)
    }

    pub fn connect_as(&mut self, address: impl Into<AccountId>) -> Session {
        self.sessions.connect_as(address.into())
    }

    pub fn disconnect(&mut self, session: SessionId) -> bool {
        self.sessions.disconnect(session)
    }

    pub fn is_connected(&self, session: SessionId) -> bool {
        self.sessions.is_connected(session)
    }

    fn account(&self, session: SessionId) -> Result<AccountId, LedgerError> {
        self.sessions.address(session).cloned()
    }

    /// Register the session's player, or refresh `last_checkin` if already
    /// registered. Returns whether a new player was created.
    pub fn register_player(&mut self, session: SessionId) -> Result<bool, LedgerError> {
        let account = self.account(session)?;
        let now = self.now();
        Ok(self.ledger.register_player(&account, &self.config, now))
    }

    pub fn player_stats(&self, address: &str) -> Option<&PlayerStats> {
        self.ledger.player(address)
    }

    pub fn daily_checkin(&mut self, session: SessionId) -> Result<CheckinOutcome, LedgerError> {
        let account = self.account(session)?;
        if !self.ledger.is_registered(&account) {
            return Err(LedgerError::PlayerNotRegistered { account });
        }
        let now = self.now();
        let paid = soft(
            "daily_checkin",
            self.ledger.daily_checkin(&account, &self.config, now),
        )?;
        Ok(CheckinOutcome {
            success: paid.is_some(),
            gui_reward: paid.unwrap_or(0),
        })
    }

    pub fn stake_gui(
        &mut self,
        session: SessionId,
        amount: Amount,
        lock_period_days: u32,
    ) -> Result<bool, LedgerError> {
        let account = self.account(session)?;
        let lock_period = LockPeriod::from_days(lock_period_days)?;
        let now = self.now();
        let staked = soft(
            "stake_gui",
            self.ledger.stake_tokens(
                &account,
                amount,
                lock_period,
                self.config.restake_policy,
                now,
            ),
        )?;
        Ok(staked.is_some())
    }

    pub fn unstake_gui(&mut self, session: SessionId) -> Result<UnstakeOutcome, LedgerError> {
        let account = self.account(session)?;
        let now = self.now();
        let closed = soft("unstake_gui", self.ledger.unstake_tokens(&account, now))?;
        Ok(match closed {
            Some((amount, rewards)) => UnstakeOutcome {
                success: true,
                amount,
                rewards,
            },
            None => UnstakeOutcome {
                success: false,
                amount: 0,
                rewards: 0,
            },
        })
    }

    pub fn stake_info(&self, address: &str) -> Option<StakeView> {
        self.ledger.stake_view(address, self.now())
    }

    pub fn adopt_pet(
        &mut self,
        session: SessionId,
        pet_type: PetType,
        investment: Amount,
    ) -> Result<bool, LedgerError> {
        let account = self.account(session)?;
        let now = self.now();
        let adopted = soft(
            "adopt_pet",
            self.ledger.adopt_pet(&account, pet_type, investment, now),
        )?;
        Ok(adopted.is_some())
    }

    pub fn create_colony(
        &mut self,
        session: SessionId,
        name: &str,
        initial_pool: Amount,
    ) -> Result<bool, LedgerError> {
        let account = self.account(session)?;
        let now = self.now();
        let created = soft(
            "create_colony",
            self.ledger.create_colony(&account, name, initial_pool, now),
        )?;
        Ok(created.is_some())
    }

    pub fn claim_artifact(
        &mut self,
        session: SessionId,
        name: &str,
        location: &str,
    ) -> Result<ClaimOutcome, LedgerError> {
        let account = self.account(session)?;
        if !self.ledger.is_registered(&account) {
            debug!(%account, "claim from unregistered player ignored");
            return Ok(ClaimOutcome {
                success: false,
                gui_reward: 0,
                artifact: None,
            });
        }
        let rarity = Rarity::roll(&mut self.rng);
        let now = self.now();
        let artifact = self.ledger.record_artifact(
            &account,
            name,
            location,
            rarity,
            self.config.xp_per_artifact,
            now,
        )?;
        Ok(ClaimOutcome {
            success: true,
            gui_reward: artifact.gui_value,
            artifact: Some(artifact),
        })
    }

    pub fn gui_price(&mut self) -> f64 {
        let now = self.now();
        self.market.quote(&mut self.rng, now)
    }

    pub fn gui_market_data(&mut self) -> TokenInfo {
        let now = self.now();
        self.market.market_data(&mut self.rng, now)
    }

    pub fn apply_action(
        &mut self,
        session: SessionId,
        action: ContractAction,
    ) -> Result<ActionOutcome, LedgerError> {
        debug!(%session, ?action, "applying contract action");
        match action {
            ContractAction::Register => Ok(ActionOutcome::Registered {
                created: self.register_player(session)?,
            }),
            ContractAction::DailyCheckin => self.daily_checkin(session).map(ActionOutcome::CheckedIn),
            ContractAction::Stake {
                amount,
                lock_period_days,
            } => Ok(ActionOutcome::Staked {
                success: self.stake_gui(session, amount, lock_period_days)?,
            }),
            ContractAction::Unstake => self.unstake_gui(session).map(ActionOutcome::Unstaked),
            ContractAction::AdoptPet {
                pet_type,
                investment,
            } => Ok(ActionOutcome::PetAdopted {
                success: self.adopt_pet(session, pet_type, investment)?,
            }),
            ContractAction::CreateColony { name, pool } => Ok(ActionOutcome::ColonyCreated {
                success: self.create_colony(session, &name, pool)?,
            }),
            ContractAction::ClaimArtifact { name, location } => self
                .claim_artifact(session, &name, &location)
                .map(ActionOutcome::ArtifactClaimed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use crate::clock::{ManualClock, MS_PER_DAY};
    use crate::config::RestakePolicy;

    fn seeded_with(config: LedgerConfig) -> (GuiContract, ManualClock, SessionId) {
        let clock = ManualClock::new(1_700_000_000_000);
        let config = LedgerConfig {
            rng_seed: Some(7),
            ..config
        };
        let mut contract = GuiContract::with_clock(config, clock.clone()).unwrap();
        let session = contract.connect().id;
        contract.register_player(session).unwrap();
        (contract, clock, session)
    }

    fn seeded() -> (GuiContract, ManualClock, SessionId) {
        seeded_with(LedgerConfig::default())
    }

    fn balance(contract: &GuiContract, session: SessionId) -> Amount {
        let address = contract.sessions.address(session).unwrap();
        contract.player_stats(address).unwrap().gui_balance
    }

    #[test]
    fn disconnected_wallet_is_an_error() {
        let (mut contract, _, session) = seeded();
        assert!(contract.disconnect(session));
        assert_eq!(
            contract.stake_gui(session, 1, 30),
            Err(LedgerError::WalletNotConnected)
        );
        assert_eq!(
            contract.daily_checkin(session),
            Err(LedgerError::WalletNotConnected)
        );
    }

    #[test]
    fn checkin_twice_in_one_day_is_rejected() {
        let (mut contract, clock, session) = seeded();
        clock.advance_days(1);
        let first = contract.daily_checkin(session).unwrap();
        assert_eq!(
            first,
            CheckinOutcome {
                success: true,
                gui_reward: 50_000
            }
        );
        clock.advance_ms(MS_PER_DAY / 2);
        let second = contract.daily_checkin(session).unwrap();
        assert_eq!(
            second,
            CheckinOutcome {
                success: false,
                gui_reward: 0
            }
        );
    }

    #[test]
    fn checkin_for_unregistered_player_is_an_error() {
        let (mut contract, _, _) = seeded();
        let stranger = contract.connect_as("stranger").id;
        assert!(matches!(
            contract.daily_checkin(stranger),
            Err(LedgerError::PlayerNotRegistered { .. })
        ));
    }

    #[test]
    fn stake_for_a_year_at_ninety_days() {
        let (mut contract, clock, session) = seeded();
        assert_eq!(balance(&contract, session), 1_000_000);
        assert!(contract.stake_gui(session, 100_000, 90).unwrap());
        assert_eq!(balance(&contract, session), 900_000);

        clock.advance_days(365);
        let outcome = contract.unstake_gui(session).unwrap();
        assert_eq!(
            outcome,
            UnstakeOutcome {
                success: true,
                amount: 100_000,
                rewards: 15_000
            }
        );
        assert_eq!(balance(&contract, session), 1_015_000);
        let address = contract.sessions.address(session).unwrap().clone();
        assert_eq!(contract.player_stats(&address).unwrap().gui_staked, 0);
        assert!(contract.stake_info(&address).is_none());
    }

    #[test]
    fn immediate_unstake_returns_principal_only() {
        let (mut contract, _, session) = seeded();
        assert!(contract.stake_gui(session, 250_000, 30).unwrap());
        let outcome = contract.unstake_gui(session).unwrap();
        assert_eq!(outcome.amount, 250_000);
        assert_eq!(outcome.rewards, 0);
        assert_eq!(balance(&contract, session), 1_000_000);
    }

    #[test]
    fn restake_under_reject_policy_returns_false() {
        let (mut contract, clock, session) = seeded_with(LedgerConfig {
            restake_policy: RestakePolicy::Reject,
            ..LedgerConfig::default()
        });
        assert!(contract.stake_gui(session, 100_000, 90).unwrap());
        let root = contract.ledger().state_root();
        let height = contract.ledger().meta.height;

        clock.advance_days(3);
        assert!(!contract.stake_gui(session, 200_000, 180).unwrap());
        assert_eq!(contract.ledger().state_root(), root);
        assert_eq!(contract.ledger().meta.height, height);
        assert_eq!(balance(&contract, session), 900_000);

        clock.advance_days(362);
        assert_eq!(
            contract.unstake_gui(session).unwrap(),
            UnstakeOutcome {
                success: true,
                amount: 100_000,
                rewards: 15_000
            }
        );
    }

    #[test]
    fn invalid_config_is_refused_at_construction() {
        let config = LedgerConfig {
            price_jitter: 1.5,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            GuiContract::with_clock(config, ManualClock::new(0)),
            Err(ConfigError::Invalid(_))
        ));
        let config = LedgerConfig {
            base_price_usd: -1.0,
            ..LedgerConfig::default()
        };
        assert!(GuiContract::new(config).is_err());
    }

    #[test]
    fn unstake_without_stake_is_a_zero_outcome() {
        let (mut contract, _, session) = seeded();
        assert_eq!(
            contract.unstake_gui(session).unwrap(),
            UnstakeOutcome {
                success: false,
                amount: 0,
                rewards: 0
            }
        );
    }

    #[test]
    fn bad_lock_period_is_an_error() {
        let (mut contract, _, session) = seeded();
        assert_eq!(
            contract.stake_gui(session, 10, 45),
            Err(LedgerError::InvalidLockPeriod { days: 45 })
        );
        assert_eq!(balance(&contract, session), 1_000_000);
    }

    #[test]
    fn overspending_returns_false() {
        let (mut contract, _, session) = seeded();
        assert!(!contract.stake_gui(session, 1_000_001, 30).unwrap());
        assert!(!contract.adopt_pet(session, PetType::MemeSpirit, 1_000_001).unwrap());
        assert!(!contract.create_colony(session, "Big", 1_000_001).unwrap());
        assert_eq!(balance(&contract, session), 1_000_000);
    }

    #[test]
    fn pets_and_colonies_debit_balance() {
        let (mut contract, _, session) = seeded();
        assert!(contract.adopt_pet(session, PetType::GuiPup, 10_000).unwrap());
        assert!(contract.create_colony(session, "Lichen Ridge", 40_000).unwrap());
        let address = contract.sessions.address(session).unwrap().clone();
        let player = contract.player_stats(&address).unwrap();
        assert_eq!(player.gui_balance, 950_000);
        assert_eq!(player.pets_owned, 1);
        let colony_id = player.current_colony.unwrap();
        let colony = contract.ledger().colony(colony_id).unwrap();
        assert_eq!(colony.name, "Lichen Ridge");
        assert_eq!(colony.total_gui_pooled, 40_000);
        let pets: Vec<_> = contract.ledger().pets_of(&address).collect();
        assert_eq!(pets.len(), 1);
        assert_eq!(pets[0].1.happiness, 100);
    }

    #[test]
    fn claims_pay_table_values_and_xp() {
        let (mut contract, _, session) = seeded();
        let table = [1_000, 5_000, 25_000, 100_000, 500_000];
        let mut total = 0;
        for _ in 0..50 {
            let outcome = contract
                .claim_artifact(session, "Fossil", "51.500000, -0.120000")
                .unwrap();
            assert!(outcome.success);
            assert!(table.contains(&outcome.gui_reward));
            total += outcome.gui_reward;
        }
        let address = contract.sessions.address(session).unwrap().clone();
        let player = contract.player_stats(&address).unwrap();
        assert_eq!(player.total_artifacts, 50);
        assert_eq!(player.walks_xp, 5_000);
        assert_eq!(player.gui_balance, 1_000_000 + total);
        assert_eq!(contract.ledger().artifacts_of(&address).len(), 50);
    }

    #[test]
    fn claim_for_unregistered_player_fails_softly() {
        let (mut contract, _, _) = seeded();
        let stranger = contract.connect_as("stranger").id;
        let outcome = contract.claim_artifact(stranger, "Mushroom", "here").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.gui_reward, 0);
    }

    #[test]
    fn same_seed_same_claims() {
        let (mut a, _, sa) = seeded();
        let (mut b, _, sb) = seeded();
        for _ in 0..20 {
            let ra = a.claim_artifact(sa, "Graffiti", "x").unwrap().gui_reward;
            let rb = b.claim_artifact(sb, "Graffiti", "x").unwrap().gui_reward;
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn two_players_share_one_ledger() {
        let (mut contract, _, alice) = seeded();
        let bob = contract.connect_as("bob").id;
        contract.register_player(bob).unwrap();
        assert!(contract.stake_gui(alice, 500_000, 180).unwrap());
        assert_eq!(balance(&contract, alice), 500_000);
        assert_eq!(balance(&contract, bob), 1_000_000);
    }

    #[test]
    fn actions_dispatch_from_json() {
        let (mut contract, clock, session) = seeded();
        let actions: Vec<ContractAction> = serde_json::from_str(
            r#"[
                {"action": "stake", "amount": 1000, "lock_period_days": 30},
                {"action": "adopt_pet", "pet_type": "digital_friend", "investment": 500},
                {"action": "daily_checkin"}
            ]"#,
        )
        .unwrap();
        clock.advance_days(1);
        let outcomes: Vec<ActionOutcome> = actions
            .into_iter()
            .map(|a| contract.apply_action(session, a).unwrap())
            .collect();
        assert_eq!(outcomes[0], ActionOutcome::Staked { success: true });
        assert_eq!(outcomes[1], ActionOutcome::PetAdopted { success: true });
        let json = serde_json::to_value(&outcomes[2]).unwrap();
        assert_eq!(json["outcome"], "checked_in");
        assert_eq!(json["success"], true);
    }

    #[test]
    fn pet_types_accept_codes_and_names() {
        let (mut contract, _, session) = seeded();
        let actions: Vec<ContractAction> = serde_json::from_str(
            r#"[
                {"action": "adopt_pet", "pet_type": 5, "investment": 100},
                {"action": "adopt_pet", "pet_type": "meme_spirit", "investment": 100}
            ]"#,
        )
        .unwrap();
        for action in actions {
            assert_eq!(
                contract.apply_action(session, action).unwrap(),
                ActionOutcome::PetAdopted { success: true }
            );
        }
        let address = contract.sessions.address(session).unwrap().clone();
        let kinds: Vec<_> = contract
            .ledger()
            .pets_of(&address)
            .map(|(_, pet)| pet.pet_type)
            .collect();
        assert_eq!(kinds, vec![PetType::BlockchainBuddy, PetType::MemeSpirit]);

        for bad in [
            r#"{"action": "adopt_pet", "pet_type": 0, "investment": 1}"#,
            r#"{"action": "adopt_pet", "pet_type": 6, "investment": 1}"#,
            r#"{"action": "adopt_pet", "pet_type": "dragon", "investment": 1}"#,
        ] {
            assert!(serde_json::from_str::<ContractAction>(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn market_quotes_are_recorded() {
        let (mut contract, _, _) = seeded();
        let price = contract.gui_price();
        let data = contract.gui_market_data();
        assert!(price > 0.0 && data.current_price_usd > 0.0);
        assert_eq!(contract.market().history().count(), 2);
    }

    proptest! {
        #[test]
        fn restake_overwrites_staked_amount(first in 0u64..=400_000, second in 0u64..=400_000) {
            let (mut contract, _, session) = seeded();
            prop_assert!(contract.stake_gui(session, first, 30).unwrap());
            let before = balance(&contract, session);
            prop_assert!(contract.stake_gui(session, second, 90).unwrap());
            let address = contract.sessions.address(session).unwrap().clone();
            let player = contract.player_stats(&address).unwrap();
            prop_assert_eq!(player.gui_balance, before - second);
            prop_assert_eq!(player.gui_staked, second);
            prop_assert_eq!(contract.stake_info(&address).unwrap().stake.amount, second);
        }
    }
}
