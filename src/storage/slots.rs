//! EIP-1967 reserved storage slots
//!
//! Each slot is `keccak256(label) - 1`, so no compiler-assigned slot can collide
//! with it and no known preimage exists for the result.

use ethers::types::{Address, H256, U256};
use once_cell::sync::Lazy;
use sha3::{Digest, Keccak256};

pub const IMPLEMENTATION_LABEL: &str = "eip1967.proxy.implementation";
pub const ADMIN_LABEL: &str = "eip1967.proxy.admin";
pub const BEACON_LABEL: &str = "eip1967.proxy.beacon";

pub static IMPLEMENTATION_SLOT: Lazy<H256> = Lazy::new(|| eip1967_slot(IMPLEMENTATION_LABEL));
pub static ADMIN_SLOT: Lazy<H256> = Lazy::new(|| eip1967_slot(ADMIN_LABEL));
pub static BEACON_SLOT: Lazy<H256> = Lazy::new(|| eip1967_slot(BEACON_LABEL));

/// Generic keccak256 concatenation helper
pub fn keccak256_concat(data: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for chunk in data {
        hasher.update(chunk);
    }
    hasher.finalize().into()
}

/// `keccak256(label) - 1` as a storage key.
pub fn eip1967_slot(label: &str) -> H256 {
    let hash = U256::from_big_endian(&keccak256_concat(&[label.as_bytes()]));
    let mut bytes = [0u8; 32];
    (hash - U256::one()).to_big_endian(&mut bytes);
    H256::from(bytes)
}

/// First four bytes of `keccak256(signature)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256_concat(&[signature.as_bytes()]);
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Low 20 bytes of a storage word; the all-zero word means "absent".
pub fn address_from_word(word: H256) -> Option<Address> {
    if word.is_zero() {
        None
    } else {
        Some(Address::from_slice(&word.as_bytes()[12..]))
    }
}
