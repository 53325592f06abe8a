use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::clock::{whole_days_between, MS_PER_DAY};
use crate::config::{LedgerConfig, RestakePolicy};
use crate::error::LedgerError;
use crate::rewards::{checkin_reward, stake_reward, LockPeriod, Rarity};

pub type AccountId = String;
pub type Amount = u64;

/// Events retained by `LedgerState::new`; older entries are dropped first.
pub const DEFAULT_EVENT_LOG_LIMIT: usize = 1024;

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(ColonyId, "colony");
id_type!(PetId, "pet");
id_type!(ArtifactId, "artifact");

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerStats {
    pub walks_xp: u64,
    pub health_score: u32,
    pub last_checkin: u64,
    pub total_artifacts: u64,
    pub current_colony: Option<ColonyId>,
    pub pets_owned: u32,
    pub grass_touch_streak: u64,
    pub gui_balance: Amount,
    pub gui_staked: Amount,
    pub gui_rewards_earned: Amount,
}

impl PlayerStats {
    fn fresh(config: &LedgerConfig, now: u64) -> Self {
        Self {
            walks_xp: 0,
            health_score: config.initial_health,
            last_checkin: now,
            total_artifacts: 0,
            current_colony: None,
            pets_owned: 0,
            grass_touch_streak: 0,
            gui_balance: config.starting_balance,
            gui_staked: 0,
            gui_rewards_earned: 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeInfo {
    pub amount: Amount,
    pub start_time: u64,
    pub reward_rate: u32,
    pub lock_period: LockPeriod,
}

impl StakeInfo {
    pub fn accrued_rewards(&self, now: u64) -> Amount {
        stake_reward(self.amount, self.reward_rate, now.saturating_sub(self.start_time))
    }

    pub fn lock_ends_at(&self) -> u64 {
        self.start_time.saturating_add(self.lock_period.duration_ms())
    }
}

/// Read view of an active stake at a given instant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeView {
    #[serde(flatten)]
    pub stake: StakeInfo,
    pub pending_rewards: Amount,
    pub lock_ended: bool,
}

/// Deserializes from either the client's numeric code (1-5) or the
/// snake_case name; always serializes as the name.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", try_from = "PetTypeRepr")]
pub enum PetType {
    GuiPup,
    AptosCompanion,
    DigitalFriend,
    MemeSpirit,
    BlockchainBuddy,
}

impl PetType {
    pub fn from_code(code: u8) -> Result<Self, LedgerError> {
        match code {
            1 => Ok(PetType::GuiPup),
            2 => Ok(PetType::AptosCompanion),
            3 => Ok(PetType::DigitalFriend),
            4 => Ok(PetType::MemeSpirit),
            5 => Ok(PetType::BlockchainBuddy),
            other => Err(LedgerError::InvalidPetType(other.to_string())),
        }
    }

    pub fn from_name(name: &str) -> Result<Self, LedgerError> {
        match name {
            "gui_pup" => Ok(PetType::GuiPup),
            "aptos_companion" => Ok(PetType::AptosCompanion),
            "digital_friend" => Ok(PetType::DigitalFriend),
            "meme_spirit" => Ok(PetType::MemeSpirit),
            "blockchain_buddy" => Ok(PetType::BlockchainBuddy),
            other => Err(LedgerError::InvalidPetType(other.to_string())),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PetType::GuiPup => 1,
            PetType::AptosCompanion => 2,
            PetType::DigitalFriend => 3,
            PetType::MemeSpirit => 4,
            PetType::BlockchainBuddy => 5,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PetTypeRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<PetTypeRepr> for PetType {
    type Error = LedgerError;

    fn try_from(repr: PetTypeRepr) -> Result<Self, Self::Error> {
        match repr {
            PetTypeRepr::Code(code) => PetType::from_code(code),
            PetTypeRepr::Name(name) => PetType::from_name(&name),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PetStats {
    pub owner: AccountId,
    pub pet_type: PetType,
    pub level: u32,
    pub happiness: u32,
    pub evolution_stage: u32,
    pub last_fed: u64,
    pub special_traits: u32,
    pub gui_investment: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColonyStats {
    pub name: String,
    pub founder: AccountId,
    pub member_count: u32,
    pub total_gui_pooled: Amount,
    pub prosperity_level: u32,
    pub special_projects: Vec<String>,
    pub creation_time: u64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Mushroom,
    Fossil,
    Graffiti,
    PixelPlant,
    GuiCrystal,
}

impl ArtifactKind {
    /// Resolve the kind from a display name; unknown names are mushrooms.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "fossil" => ArtifactKind::Fossil,
            "graffiti" => ArtifactKind::Graffiti,
            "pixel plant" | "pixel_plant" => ArtifactKind::PixelPlant,
            "gui crystal" | "gui_crystal" => ArtifactKind::GuiCrystal,
            _ => ArtifactKind::Mushroom,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ArtifactKind::Mushroom => "Mushroom",
            ArtifactKind::Fossil => "Fossil",
            ArtifactKind::Graffiti => "Graffiti",
            ArtifactKind::PixelPlant => "Pixel Plant",
            ArtifactKind::GuiCrystal => "GUI Crystal",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub name: String,
    pub kind: ArtifactKind,
    pub rarity: Rarity,
    pub gui_value: Amount,
    pub discovery_location: String,
    pub special_properties: Vec<String>,
    pub discovered_at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SnapshotMetadata {
    pub height: u64,
    pub timestamp: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub meta: SnapshotMetadata,
    pub players: BTreeMap<AccountId, PlayerStats>,
    pub stakes: BTreeMap<AccountId, StakeInfo>,
    pub pets: BTreeMap<PetId, PetStats>,
    pub colonies: BTreeMap<ColonyId, ColonyStats>,
    pub artifacts: BTreeMap<AccountId, Vec<Artifact>>,
    pub events: Vec<LedgerEvent>,
    pub state_root: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    PlayerRegistered {
        account: AccountId,
        balance: Amount,
    },
    CheckedIn {
        account: AccountId,
        reward: Amount,
        streak: u64,
    },
    Staked {
        account: AccountId,
        amount: Amount,
        lock_period: LockPeriod,
        reward_rate: u32,
    },
    StakeReplaced {
        account: AccountId,
        forfeited: Amount,
    },
    Unstaked {
        account: AccountId,
        amount: Amount,
        rewards: Amount,
    },
    PetAdopted {
        account: AccountId,
        pet_id: PetId,
        pet_type: PetType,
        investment: Amount,
    },
    ColonyCreated {
        account: AccountId,
        colony_id: ColonyId,
        name: String,
        pool: Amount,
    },
    ArtifactClaimed {
        account: AccountId,
        artifact_id: ArtifactId,
        rarity: Rarity,
        reward: Amount,
    },
}

/// In-memory store of every player's economic state.
///
/// Construct one per simulation (or test) and drop it to discard the state;
/// nothing here is process-global. The event log keeps only the newest
/// `event_limit` entries; `meta.height` still counts every commit.
pub struct LedgerState {
    pub meta: SnapshotMetadata,
    players: BTreeMap<AccountId, PlayerStats>,
    stakes: BTreeMap<AccountId, StakeInfo>,
    pets: BTreeMap<PetId, PetStats>,
    colonies: BTreeMap<ColonyId, ColonyStats>,
    artifacts: BTreeMap<AccountId, Vec<Artifact>>,
    events: VecDeque<LedgerEvent>,
    event_limit: usize,
    next_id: u64,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::with_event_limit(DEFAULT_EVENT_LOG_LIMIT)
    }
}

impl LedgerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_limit(event_limit: usize) -> Self {
        Self {
            meta: SnapshotMetadata::default(),
            players: BTreeMap::new(),
            stakes: BTreeMap::new(),
            pets: BTreeMap::new(),
            colonies: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            events: VecDeque::new(),
            event_limit,
            next_id: 0,
        }
    }

    pub fn player(&self, account: &str) -> Option<&PlayerStats> {
        self.players.get(account)
    }

    pub fn is_registered(&self, account: &str) -> bool {
        self.players.contains_key(account)
    }

    pub fn stake(&self, account: &str) -> Option<&StakeInfo> {
        self.stakes.get(account)
    }

    pub fn stake_view(&self, account: &str, now: u64) -> Option<StakeView> {
        self.stakes.get(account).map(|stake| StakeView {
            pending_rewards: stake.accrued_rewards(now),
            lock_ended: now >= stake.lock_ends_at(),
            stake: stake.clone(),
        })
    }

    pub fn pet(&self, id: PetId) -> Option<&PetStats> {
        self.pets.get(&id)
    }

    pub fn pets_of<'a>(&'a self, account: &'a str) -> impl Iterator<Item = (PetId, &'a PetStats)> + 'a {
        self.pets
            .iter()
            .filter(move |(_, pet)| pet.owner == account)
            .map(|(id, pet)| (*id, pet))
    }

    pub fn colony(&self, id: ColonyId) -> Option<&ColonyStats> {
        self.colonies.get(&id)
    }

    pub fn artifacts_of(&self, account: &str) -> &[Artifact] {
        self.artifacts.get(account).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn events(&self) -> &VecDeque<LedgerEvent> {
        &self.events
    }

    /// Create a player with default stats, or refresh `last_checkin` on an
    /// existing one. Returns whether a new record was created.
    pub fn register_player(&mut self, account: &AccountId, config: &LedgerConfig, now: u64) -> bool {
        if let Some(player) = self.players.get_mut(account) {
            player.last_checkin = now;
            debug!(%account, "player already registered, refreshed check-in time");
            return false;
        }
        let player = PlayerStats::fresh(config, now);
        let balance = player.gui_balance;
        self.players.insert(account.clone(), player);
        info!(%account, balance, "player registered");
        self.commit(
            LedgerEvent::PlayerRegistered {
                account: account.clone(),
                balance,
            },
            now,
        );
        true
    }

    pub fn credit_account(&mut self, account: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let player = self.player_mut(account)?;
        player.gui_balance = player.gui_balance.saturating_add(amount);
        Ok(())
    }

    pub fn debit_account(&mut self, account: &AccountId, amount: Amount) -> Result<(), LedgerError> {
        let player = self.player_mut(account)?;
        if player.gui_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available: player.gui_balance,
            });
        }
        player.gui_balance -= amount;
        Ok(())
    }

    /// Pay the daily check-in reward if at least one whole day has passed.
    pub fn daily_checkin(
        &mut self,
        account: &AccountId,
        config: &LedgerConfig,
        now: u64,
    ) -> Result<Amount, LedgerError> {
        let player = self.player_mut(account)?;
        let days = whole_days_between(player.last_checkin, now);
        if days < 1 {
            return Err(LedgerError::CheckinTooSoon {
                account: account.clone(),
                remaining_ms: (player.last_checkin + MS_PER_DAY).saturating_sub(now),
            });
        }
        if config.enforce_streak_reset && days >= 2 && player.grass_touch_streak > 0 {
            debug!(%account, days, streak = player.grass_touch_streak, "missed a day, streak reset");
            player.grass_touch_streak = 0;
        }
        let reward = checkin_reward(
            config.checkin_base_reward,
            player.grass_touch_streak,
            config.streak_bonus_tenths,
        );
        player.gui_balance = player.gui_balance.saturating_add(reward);
        player.gui_rewards_earned = player.gui_rewards_earned.saturating_add(reward);
        player.last_checkin = now;
        player.grass_touch_streak += 1;
        let streak = player.grass_touch_streak;
        info!(%account, reward, streak, "daily check-in paid");
        self.commit(
            LedgerEvent::CheckedIn {
                account: account.clone(),
                reward,
                streak,
            },
            now,
        );
        Ok(reward)
    }

    /// Lock `amount` into the account's single stake slot.
    ///
    /// Under `RestakePolicy::Replace` an existing stake is overwritten and its
    /// principal is returned as forfeited.
    pub fn stake_tokens(
        &mut self,
        account: &AccountId,
        amount: Amount,
        lock_period: LockPeriod,
        policy: RestakePolicy,
        now: u64,
    ) -> Result<Option<Amount>, LedgerError> {
        let available = self.player_mut(account)?.gui_balance;
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account: account.clone(),
                needed: amount,
                available,
            });
        }
        let previous = self.stakes.get(account).map(|s| s.amount);
        if previous.is_some() && policy == RestakePolicy::Reject {
            return Err(LedgerError::StakeAlreadyActive {
                account: account.clone(),
            });
        }

        self.debit_account(account, amount)?;
        let player = self.player_mut(account)?;
        player.gui_staked = player
            .gui_staked
            .saturating_sub(previous.unwrap_or(0))
            .saturating_add(amount);

        let stake = StakeInfo {
            amount,
            start_time: now,
            reward_rate: lock_period.apy_percent(),
            lock_period,
        };
        self.stakes.insert(account.clone(), stake);

        if let Some(forfeited) = previous {
            warn!(%account, forfeited, "active stake overwritten, prior principal forfeited");
            self.commit(
                LedgerEvent::StakeReplaced {
                    account: account.clone(),
                    forfeited,
                },
                now,
            );
        }
        info!(%account, amount, days = lock_period.days(), "tokens staked");
        self.commit(
            LedgerEvent::Staked {
                account: account.clone(),
                amount,
                lock_period,
                reward_rate: lock_period.apy_percent(),
            },
            now,
        );
        Ok(previous)
    }

    /// Close the active stake, paying principal plus linear rewards.
    /// Returns `(principal, rewards)`.
    pub fn unstake_tokens(&mut self, account: &AccountId, now: u64) -> Result<(Amount, Amount), LedgerError> {
        self.player_mut(account)?;
        let stake = self
            .stakes
            .remove(account)
            .ok_or_else(|| LedgerError::NoActiveStake {
                account: account.clone(),
            })?;
        let rewards = stake.accrued_rewards(now);
        let player = self.player_mut(account)?;
        player.gui_balance = player
            .gui_balance
            .saturating_add(stake.amount)
            .saturating_add(rewards);
        player.gui_staked = player.gui_staked.saturating_sub(stake.amount);
        player.gui_rewards_earned = player.gui_rewards_earned.saturating_add(rewards);
        info!(%account, amount = stake.amount, rewards, "stake closed");
        self.commit(
            LedgerEvent::Unstaked {
                account: account.clone(),
                amount: stake.amount,
                rewards,
            },
            now,
        );
        Ok((stake.amount, rewards))
    }

    pub fn adopt_pet(
        &mut self,
        account: &AccountId,
        pet_type: PetType,
        investment: Amount,
        now: u64,
    ) -> Result<PetId, LedgerError> {
        self.debit_account(account, investment)?;
        let player = self.player_mut(account)?;
        player.pets_owned += 1;
        let pet_id = PetId(self.allocate_id());
        self.pets.insert(
            pet_id,
            PetStats {
                owner: account.clone(),
                pet_type,
                level: 1,
                happiness: 100,
                evolution_stage: 1,
                last_fed: now,
                special_traits: 0,
                gui_investment: investment,
            },
        );
        info!(%account, %pet_id, ?pet_type, investment, "pet adopted");
        self.commit(
            LedgerEvent::PetAdopted {
                account: account.clone(),
                pet_id,
                pet_type,
                investment,
            },
            now,
        );
        Ok(pet_id)
    }

    pub fn create_colony(
        &mut self,
        account: &AccountId,
        name: &str,
        pool: Amount,
        now: u64,
    ) -> Result<ColonyId, LedgerError> {
        self.debit_account(account, pool)?;
        let colony_id = ColonyId(self.allocate_id());
        self.colonies.insert(
            colony_id,
            ColonyStats {
                name: name.to_string(),
                founder: account.clone(),
                member_count: 1,
                total_gui_pooled: pool,
                prosperity_level: 1,
                special_projects: Vec::new(),
                creation_time: now,
            },
        );
        self.player_mut(account)?.current_colony = Some(colony_id);
        info!(%account, %colony_id, name, pool, "colony founded");
        self.commit(
            LedgerEvent::ColonyCreated {
                account: account.clone(),
                colony_id,
                name: name.to_string(),
                pool,
            },
            now,
        );
        Ok(colony_id)
    }

    /// Append an artifact of the given rarity and pay its reward and XP.
    pub fn record_artifact(
        &mut self,
        account: &AccountId,
        name: &str,
        location: &str,
        rarity: Rarity,
        xp: u64,
        now: u64,
    ) -> Result<Artifact, LedgerError> {
        self.player_mut(account)?;
        let reward = rarity.gui_value();
        let artifact = Artifact {
            id: ArtifactId(self.allocate_id()),
            name: name.to_string(),
            kind: ArtifactKind::from_name(name),
            rarity,
            gui_value: reward,
            discovery_location: location.to_string(),
            special_properties: rarity.special_properties(),
            discovered_at: now,
        };
        self.artifacts
            .entry(account.clone())
            .or_default()
            .push(artifact.clone());

        let player = self.player_mut(account)?;
        player.total_artifacts += 1;
        player.gui_balance = player.gui_balance.saturating_add(reward);
        player.gui_rewards_earned = player.gui_rewards_earned.saturating_add(reward);
        player.walks_xp = player.walks_xp.saturating_add(xp);
        info!(%account, artifact = %artifact.id, %rarity, reward, "artifact claimed");
        self.commit(
            LedgerEvent::ArtifactClaimed {
                account: account.clone(),
                artifact_id: artifact.id,
                rarity,
                reward,
            },
            now,
        );
        Ok(artifact)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            meta: self.meta.clone(),
            players: self.players.clone(),
            stakes: self.stakes.clone(),
            pets: self.pets.clone(),
            colonies: self.colonies.clone(),
            artifacts: self.artifacts.clone(),
            events: self.events.iter().cloned().collect(),
            state_root: hex::encode(self.state_root()),
        }
    }

    pub fn state_root(&self) -> [u8; 32] {
        compute_state_root(&self.players, &self.stakes, &self.colonies, &self.pets)
    }

    fn player_mut(&mut self, account: &AccountId) -> Result<&mut PlayerStats, LedgerError> {
        self.players
            .get_mut(account)
            .ok_or_else(|| LedgerError::PlayerNotRegistered {
                account: account.clone(),
            })
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn commit(&mut self, event: LedgerEvent, now: u64) {
        if self.event_limit > 0 {
            if self.events.len() == self.event_limit {
                self.events.pop_front();
            }
            self.events.push_back(event);
        }
        self.meta.height += 1;
        self.meta.timestamp = now;
    }
}

fn compute_state_root(
    players: &BTreeMap<AccountId, PlayerStats>,
    stakes: &BTreeMap<AccountId, StakeInfo>,
    colonies: &BTreeMap<ColonyId, ColonyStats>,
    pets: &BTreeMap<PetId, PetStats>,
) -> [u8; 32] {
    let mut leaves: Vec<[u8; 32]> = Vec::new();
    for (account, player) in players {
        let mut hasher = Sha256::new();
        hasher.update(b"player");
        hasher.update(account.as_bytes());
        hasher.update(player.gui_balance.to_le_bytes());
        hasher.update(player.gui_staked.to_le_bytes());
        hasher.update(player.gui_rewards_earned.to_le_bytes());
        hasher.update(player.walks_xp.to_le_bytes());
        hasher.update(player.grass_touch_streak.to_le_bytes());
        hasher.update(player.total_artifacts.to_le_bytes());
        hasher.update(player.health_score.to_le_bytes());
        hasher.update(player.last_checkin.to_le_bytes());
        hasher.update(player.pets_owned.to_le_bytes());
        match player.current_colony {
            Some(colony) => {
                hasher.update([1u8]);
                hasher.update(colony.0.to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        leaves.push(hasher.finalize().into());
    }
    for (account, stake) in stakes {
        let mut hasher = Sha256::new();
        hasher.update(b"stake");
        hasher.update(account.as_bytes());
        hasher.update(stake.amount.to_le_bytes());
        hasher.update(stake.start_time.to_le_bytes());
        hasher.update(stake.reward_rate.to_le_bytes());
        hasher.update(stake.lock_period.days().to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (id, colony) in colonies {
        let mut hasher = Sha256::new();
        hasher.update(b"colony");
        hasher.update(id.0.to_le_bytes());
        hasher.update(colony.founder.as_bytes());
        hasher.update((colony.name.len() as u64).to_le_bytes());
        hasher.update(colony.name.as_bytes());
        hasher.update(colony.total_gui_pooled.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    for (id, pet) in pets {
        let mut hasher = Sha256::new();
        hasher.update(b"pet");
        hasher.update(id.0.to_le_bytes());
        hasher.update(pet.owner.as_bytes());
        hasher.update([pet.pet_type.code()]);
        hasher.update(pet.gui_investment.to_le_bytes());
        leaves.push(hasher.finalize().into());
    }
    build_merkle(leaves)
}

fn build_merkle(mut leaves: Vec<[u8; 32]>) -> [u8; 32] {
    if leaves.is_empty() {
        return Sha256::digest(b"walkscape-ledger-empty").into();
    }
    while leaves.len() > 1 {
        let mut next = Vec::with_capacity((leaves.len() + 1) / 2);
        for chunk in leaves.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(b"node");
            hasher.update(chunk[0]);
            hasher.update(chunk.get(1).unwrap_or(&chunk[0]));
            next.push(hasher.finalize().into());
        }
        leaves = next;
    }
    leaves[0]
}
