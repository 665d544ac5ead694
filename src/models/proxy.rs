use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Result of reading one reserved proxy slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "camelCase")]
pub enum SlotValue {
    /// Slot held a non-zero word; this is its low 20 bytes.
    Present(Address),
    /// Slot held the all-zero word.
    Absent,
    /// The read itself failed. Not the same thing as `Absent`.
    Unresolved(String),
}

impl SlotValue {
    pub fn address(&self) -> Option<Address> {
        match self {
            SlotValue::Present(address) => Some(*address),
            _ => None,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, SlotValue::Unresolved(_))
    }
}

/// EIP-1967 proxy metadata for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyInfo {
    pub implementation: SlotValue,
    pub admin: SlotValue,
    pub beacon: SlotValue,
}

impl ProxyInfo {
    pub fn is_proxy(&self) -> bool {
        self.implementation.address().is_some() || self.beacon.address().is_some()
    }

    pub fn all_unresolved(&self) -> bool {
        self.implementation.is_unresolved() && self.admin.is_unresolved() && self.beacon.is_unresolved()
    }
}
