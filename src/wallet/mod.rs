//! Mock wallet sessions.
//!
//! Each connection gets its own `SessionId`; contract calls name the session
//! they act for, so any number of players can share one ledger.

use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::LedgerError;
use crate::ledger::AccountId;

const ADDRESS_PREFIX: &str = "apt_";
const ADDRESS_LEN: usize = 13;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub address: AccountId,
}

#[derive(Debug, Default)]
pub struct Sessions {
    active: BTreeMap<SessionId, AccountId>,
    next_id: u64,
}

/// Mock address: `apt_` followed by 13 lowercase base-36 characters.
pub fn mock_address<R: Rng + ?Sized>(rng: &mut R) -> AccountId {
    let mut address = String::with_capacity(ADDRESS_PREFIX.len() + ADDRESS_LEN);
    address.push_str(ADDRESS_PREFIX);
    for _ in 0..ADDRESS_LEN {
        address.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    address
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Session {
        let address = mock_address(rng);
        self.connect_as(address)
    }

    pub fn connect_as(&mut self, address: AccountId) -> Session {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.active.insert(id, address.clone());
        info!(%id, %address, "wallet connected");
        Session { id, address }
    }

    /// Returns whether the session was active.
    pub fn disconnect(&mut self, id: SessionId) -> bool {
        let removed = self.active.remove(&id);
        if let Some(address) = &removed {
            info!(%id, %address, "wallet disconnected");
        }
        removed.is_some()
    }

    pub fn is_connected(&self, id: SessionId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn address(&self, id: SessionId) -> Result<&AccountId, LedgerError> {
        self.active.get(&id).ok_or(LedgerError::WalletNotConnected)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn mock_addresses_have_expected_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let address = mock_address(&mut rng);
        assert!(address.starts_with("apt_"));
        assert_eq!(address.len(), 17);
        assert!(address[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn sessions_are_independent() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut sessions = Sessions::new();
        let a = sessions.connect(&mut rng);
        let b = sessions.connect_as("bob".into());
        assert_ne!(a.id, b.id);
        assert_eq!(sessions.len(), 2);

        assert!(sessions.disconnect(a.id));
        assert!(!sessions.disconnect(a.id));
        assert_eq!(sessions.address(a.id), Err(LedgerError::WalletNotConnected));
        assert_eq!(sessions.address(b.id).unwrap(), "bob");
    }
}
