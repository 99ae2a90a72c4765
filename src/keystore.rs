//! Key management seam.
//!
//! Key distribution, rotation, and expiry policy are out of scope for this
//! crate; what it needs is a stable trait boundary so [`crate::adapter`] can
//! ask "give me the key for this identifier" without caring where that
//! answer comes from. [`StaticKeyStore`] is the one concrete implementation
//! provided here, backing a fixed in-memory list the way a test harness or a
//! small single-tenant host would; production hosts are expected to supply
//! their own [`KeyStore`] impl (fetched from a vault, rotated on a timer,
//! whatever their policy demands).

use std::sync::{Arc, RwLock};

use crate::codec::KEY_LEN;

/// Outcome of a key lookup, distinguishing "never had one" from "had one,
/// but it's stale" — the two credential-tier failures the container format
/// cares about (`ContainerError::NoKey` / `ContainerError::KeyExpired`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Available([u8; KEY_LEN]),
    Expired,
    Unknown,
}

/// A source of decryption keys, addressed by an opaque integer identifier.
///
/// The identifier's meaning is entirely up to the implementation; the host
/// adapter in [`crate::adapter`] derives it from the `key=` query parameter
/// of the crypto-scheme URI it was asked to open.
pub trait KeyStore: Send + Sync {
    fn lookup(&self, key_id: u64) -> KeyStatus;
}

/// A fixed, in-memory list of keys, indexed by position. This is what the
/// original encoder's `KeyCache` amounted to: a `Vec` of keys addressed by
/// the integer that showed up in the stream URI, with no rotation or
/// expiry logic of its own.
#[derive(Clone)]
pub struct StaticKeyStore {
    keys: Arc<RwLock<Vec<Option<[u8; KEY_LEN]>>>>,
}

impl StaticKeyStore {
    pub fn new(keys: Vec<[u8; KEY_LEN]>) -> Self {
        Self {
            keys: Arc::new(RwLock::new(keys.into_iter().map(Some).collect())),
        }
    }

    /// Mark the key at `key_id` as expired without removing its slot, so
    /// later lookups by the same id consistently report `Expired` rather
    /// than `Unknown`.
    pub fn expire(&self, key_id: u64) {
        if let Ok(mut keys) = self.keys.write() {
            if let Some(slot) = keys.get_mut(key_id as usize) {
                *slot = None;
            }
        }
    }
}

impl KeyStore for StaticKeyStore {
    fn lookup(&self, key_id: u64) -> KeyStatus {
        let keys = match self.keys.read() {
            Ok(guard) => guard,
            Err(_) => return KeyStatus::Unknown,
        };
        match keys.get(key_id as usize) {
            Some(Some(key)) => KeyStatus::Available(*key),
            Some(None) => KeyStatus::Expired,
            None => KeyStatus::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_available_for_known_index() {
        let store = StaticKeyStore::new(vec![[1u8; KEY_LEN], [2u8; KEY_LEN]]);
        assert_eq!(store.lookup(0), KeyStatus::Available([1u8; KEY_LEN]));
        assert_eq!(store.lookup(1), KeyStatus::Available([2u8; KEY_LEN]));
    }

    #[test]
    fn lookup_returns_unknown_for_out_of_range_index() {
        let store = StaticKeyStore::new(vec![[1u8; KEY_LEN]]);
        assert_eq!(store.lookup(5), KeyStatus::Unknown);
    }

    #[test]
    fn expire_marks_slot_expired_not_unknown() {
        let store = StaticKeyStore::new(vec![[1u8; KEY_LEN]]);
        store.expire(0);
        assert_eq!(store.lookup(0), KeyStatus::Expired);
    }
}
