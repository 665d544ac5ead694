use std::collections::BTreeMap;

use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};

/// A pool announced by a factory's deployment event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRecord {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_spacing: Option<i32>,
    pub deployment_block: u64,
    pub transaction_hash: H256,
}

/// Pools keyed by address. A pool seen twice (overlapping scans, replays) is kept once,
/// with the first observation winning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolSet {
    pools: BTreeMap<Address, PoolRecord>,
}

impl PoolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the pool was already known.
    pub fn insert(&mut self, record: PoolRecord) -> bool {
        if self.pools.contains_key(&record.address) {
            return false;
        }
        self.pools.insert(record.address, record);
        true
    }

    pub fn merge(&mut self, other: PoolSet) -> usize {
        other.pools.into_values().filter(|record| self.insert(record.clone())).count()
    }

    pub fn get(&self, address: &Address) -> Option<&PoolRecord> {
        self.pools.get(address)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolRecord> {
        self.pools.values()
    }
}
