//! Proxy metadata resolution
//!
//! Reads the three EIP-1967 slots of a contract and turns the raw words into
//! [`ProxyInfo`]. A failed read is kept apart from an empty slot.

mod slots;

pub use slots::{
    address_from_word, eip1967_slot, keccak256_concat, selector, ADMIN_SLOT, BEACON_SLOT,
    IMPLEMENTATION_SLOT,
};

use std::sync::Arc;

use ethers::types::{Address, H256};

use crate::blockchain::RateLimiter;
use crate::core::{ChainReader, ShutdownSignal};
use crate::models::{ProxyInfo, SlotValue};
use crate::utils::{Result, ScannerError};

/// Interpret the outcome of one slot read.
pub fn slot_value(read: Result<H256>) -> SlotValue {
    match read {
        Ok(word) => match address_from_word(word) {
            Some(address) => SlotValue::Present(address),
            None => SlotValue::Absent,
        },
        Err(e) => SlotValue::Unresolved(e.to_string()),
    }
}

pub struct ProxySlotResolver {
    chain: Arc<dyn ChainReader>,
    limiter: Arc<RateLimiter>,
    shutdown: ShutdownSignal,
}

impl ProxySlotResolver {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self {
            chain,
            limiter: Arc::new(RateLimiter::unlimited()),
            shutdown: ShutdownSignal::new(),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Reads not yet sent when `shutdown` fires come back `Unresolved`.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Read implementation, admin and beacon slots independently.
    pub async fn resolve(&self, address: Address) -> ProxyInfo {
        let read = |slot: H256| async move {
            self.limiter.acquire().await;
            if self.shutdown.is_triggered() {
                return Err(ScannerError::Cancelled);
            }
            self.chain.get_storage_at(address, slot).await
        };
        let (implementation, admin, beacon) = tokio::join!(
            read(*IMPLEMENTATION_SLOT),
            read(*ADMIN_SLOT),
            read(*BEACON_SLOT),
        );

        ProxyInfo {
            implementation: slot_value(implementation),
            admin: slot_value(admin),
            beacon: slot_value(beacon),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{address_word, MockChain};

    #[test]
    fn test_slot_value_keeps_failure_apart_from_absence() {
        assert_eq!(slot_value(Ok(H256::zero())), SlotValue::Absent);
        assert!(slot_value(Err(ScannerError::Network("timeout".into()))).is_unresolved());
    }

    #[tokio::test]
    async fn test_resolve_reads_each_slot() {
        let proxy = Address::repeat_byte(0x10);
        let implementation = Address::repeat_byte(0x20);
        let chain = MockChain::new().with_storage(proxy, *IMPLEMENTATION_SLOT, address_word(implementation));

        let info = ProxySlotResolver::new(Arc::new(chain)).resolve(proxy).await;

        assert_eq!(info.implementation, SlotValue::Present(implementation));
        assert_eq!(info.admin, SlotValue::Absent);
        assert_eq!(info.beacon, SlotValue::Absent);
        assert!(info.is_proxy());
    }

    #[tokio::test]
    async fn test_one_failed_slot_does_not_block_others() {
        let proxy = Address::repeat_byte(0x10);
        let admin = Address::repeat_byte(0x30);
        let chain = MockChain::new()
            .with_storage(proxy, *ADMIN_SLOT, address_word(admin))
            .with_failing_slot(*IMPLEMENTATION_SLOT);

        let info = ProxySlotResolver::new(Arc::new(chain)).resolve(proxy).await;

        assert!(info.implementation.is_unresolved());
        assert_eq!(info.admin, SlotValue::Present(admin));
        assert_eq!(info.beacon, SlotValue::Absent);
        assert!(!info.all_unresolved());
    }

    #[tokio::test]
    async fn test_no_reads_after_shutdown() {
        let proxy = Address::repeat_byte(0x10);
        let chain = Arc::new(MockChain::new().with_storage(proxy, *IMPLEMENTATION_SLOT, address_word(proxy)));
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let info = ProxySlotResolver::new(chain.clone())
            .with_shutdown(shutdown)
            .resolve(proxy)
            .await;

        assert_eq!(chain.storage_reads(), 0);
        assert!(info.all_unresolved());
    }
}
