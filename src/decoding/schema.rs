use ethers::types::H256;

use crate::storage::keccak256_concat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Address,
    /// Unsigned integer of the given bit width (8..=256).
    Uint(u16),
    /// Signed integer of the given bit width (8..=64).
    Int(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PoolDeployed,
    SovereignPoolDeployed,
    Upgraded,
    AdminChanged,
    BeaconUpgraded,
}

/// Declared layout of one event: indexed fields live in `topics[1..]`, the rest
/// are static words in `data`, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSchema {
    pub name: &'static str,
    pub signature: &'static str,
    pub kind: EventKind,
    pub indexed: &'static [FieldSpec],
    pub data: &'static [FieldSpec],
}

impl EventSchema {
    pub fn topic0(&self) -> H256 {
        H256::from(keccak256_concat(&[self.signature.as_bytes()]))
    }

    pub fn topic_count(&self) -> usize {
        1 + self.indexed.len()
    }

    pub fn data_len(&self) -> usize {
        32 * self.data.len()
    }
}

pub static POOL_DEPLOYED: EventSchema = EventSchema {
    name: "PoolDeployed",
    signature: "PoolDeployed(address,address,address,uint24,int24)",
    kind: EventKind::PoolDeployed,
    indexed: &[
        field("pool", FieldKind::Address),
        field("token0", FieldKind::Address),
        field("token1", FieldKind::Address),
    ],
    data: &[
        field("fee", FieldKind::Uint(24)),
        field("tickSpacing", FieldKind::Int(24)),
    ],
};

pub static SOVEREIGN_POOL_DEPLOYED: EventSchema = EventSchema {
    name: "SovereignPoolDeployed",
    signature: "SovereignPoolDeployed(address,address,address)",
    kind: EventKind::SovereignPoolDeployed,
    indexed: &[
        field("token0", FieldKind::Address),
        field("token1", FieldKind::Address),
    ],
    data: &[field("pool", FieldKind::Address)],
};

pub static UPGRADED: EventSchema = EventSchema {
    name: "Upgraded",
    signature: "Upgraded(address)",
    kind: EventKind::Upgraded,
    indexed: &[field("implementation", FieldKind::Address)],
    data: &[],
};

pub static ADMIN_CHANGED: EventSchema = EventSchema {
    name: "AdminChanged",
    signature: "AdminChanged(address,address)",
    kind: EventKind::AdminChanged,
    indexed: &[],
    data: &[
        field("previousAdmin", FieldKind::Address),
        field("newAdmin", FieldKind::Address),
    ],
};

pub static BEACON_UPGRADED: EventSchema = EventSchema {
    name: "BeaconUpgraded",
    signature: "BeaconUpgraded(address)",
    kind: EventKind::BeaconUpgraded,
    indexed: &[field("beacon", FieldKind::Address)],
    data: &[],
};

/// Every event the scanner knows how to decode.
pub static CATALOG: [&EventSchema; 5] = [
    &POOL_DEPLOYED,
    &SOVEREIGN_POOL_DEPLOYED,
    &UPGRADED,
    &ADMIN_CHANGED,
    &BEACON_UPGRADED,
];
