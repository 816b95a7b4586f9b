//! Content-addressed key-value persistence scoped to the beacon precompile address.
//!
//! `InMemoryBeaconStore` stands in for the chain's state trie the way `other_examples/`'s
//! `RandomnessManager` backs its on-disk tables with `typed_store::Map`: a `BTreeMap` gives the
//! same read/write semantics for tests and the demo driver without pulling in a real trie
//! implementation.

use crate::types::Address;
use std::collections::BTreeMap;

/// Scoped key-value store: `Put` is an idempotent overwrite, `Get` returns `None` if absent. No
/// iteration or range queries are exposed.
pub trait BeaconStore: Send + Sync {
    fn put(&mut self, addr: Address, key: [u8; 32], value: Vec<u8>);
    fn get(&self, addr: Address, key: [u8; 32]) -> Option<Vec<u8>>;
}

/// `BTreeMap`-backed store. Not persisted across process restarts; a real deployment backs this
/// with the chain's state trie so writes are part of the transaction's state delta.
#[derive(Default)]
pub struct InMemoryBeaconStore {
    data: BTreeMap<(Address, [u8; 32]), Vec<u8>>,
}

impl InMemoryBeaconStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BeaconStore for InMemoryBeaconStore {
    fn put(&mut self, addr: Address, key: [u8; 32], value: Vec<u8>) {
        self.data.insert((addr, key), value);
    }

    fn get(&self, addr: Address, key: [u8; 32]) -> Option<Vec<u8>> {
        self.data.get(&(addr, key)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: Address = Address([7u8; 20]);

    #[test]
    fn put_then_get_round_trips() {
        let mut store = InMemoryBeaconStore::new();
        store.put(ADDR, [1u8; 32], vec![1, 2, 3]);
        assert_eq!(store.get(ADDR, [1u8; 32]), Some(vec![1, 2, 3]));
    }

    #[test]
    fn missing_key_is_none() {
        let store = InMemoryBeaconStore::new();
        assert_eq!(store.get(ADDR, [9u8; 32]), None);
    }

    #[test]
    fn put_is_idempotent_overwrite() {
        let mut store = InMemoryBeaconStore::new();
        store.put(ADDR, [2u8; 32], vec![1]);
        store.put(ADDR, [2u8; 32], vec![1]);
        assert_eq!(store.get(ADDR, [2u8; 32]), Some(vec![1]));
    }

    #[test]
    fn keys_are_scoped_by_address() {
        let mut store = InMemoryBeaconStore::new();
        let other = Address([8u8; 20]);
        store.put(ADDR, [3u8; 32], vec![1]);
        assert_eq!(store.get(other, [3u8; 32]), None);
    }
}
