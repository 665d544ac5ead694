//! In-memory collaborators for unit and integration tests.
//!
//! Compiled for `cfg(test)` and behind the `test-utils` feature, so the
//! integration tests under `tests/` share these doubles.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

use crate::core::{ChainReader, ShutdownSignal, SourceProvider};
use crate::models::{LogEvent, SourceLookup, VerifiedSource};
use crate::utils::{Result, ScannerError};

/// Left-pad an address into a 32-byte word, the way it sits in a topic or slot.
pub fn address_word(address: Address) -> H256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    H256::from(bytes)
}

pub fn sample_log(address: Address, topic0: H256, block_number: u64, log_index: u64) -> LogEvent {
    LogEvent {
        address,
        topics: vec![topic0],
        data: Bytes::new(),
        block_number,
        log_index,
        transaction_hash: H256::from_low_u64_be(block_number),
    }
}

/// One log per block in `from..=to`, each carrying `topic0`.
pub fn dense_logs(emitter: Address, topic0: H256, from: u64, to: u64) -> Vec<LogEvent> {
    (from..=to).map(|block| sample_log(emitter, topic0, block, 0)).collect()
}

/// Scriptable chain. Logs are served from memory, failures are injected by rule,
/// and every storage read and log query is counted.
#[derive(Default)]
pub struct MockChain {
    code: HashMap<Address, Bytes>,
    storage: HashMap<(Address, H256), H256>,
    failing_slots: HashSet<H256>,
    broken_accounts: HashSet<Address>,
    hanging_accounts: HashSet<Address>,
    logs: Vec<LogEvent>,
    max_span: Option<u64>,
    rejected_starts: HashSet<u64>,
    rejected_once: Mutex<HashSet<(u64, u64)>>,
    failing_log_starts: HashSet<u64>,
    callable: HashSet<Address>,
    shutdown_on_code: Option<ShutdownSignal>,
    log_queries: Mutex<Vec<(u64, u64)>>,
    storage_reads: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, address: Address) -> Self {
        self.code.insert(address, Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));
        self
    }

    pub fn with_storage(mut self, address: Address, slot: H256, value: H256) -> Self {
        self.storage.insert((address, slot), value);
        self
    }

    pub fn with_failing_slot(mut self, slot: H256) -> Self {
        self.failing_slots.insert(slot);
        self
    }

    /// Every code or storage request touching this account fails with a network error.
    pub fn with_broken_account(mut self, address: Address) -> Self {
        self.broken_accounts.insert(address);
        self
    }

    /// `get_code` for this account never answers.
    pub fn with_hanging_code(mut self, address: Address) -> Self {
        self.hanging_accounts.insert(address);
        self
    }

    pub fn with_logs(mut self, mut logs: Vec<LogEvent>) -> Self {
        self.logs.append(&mut logs);
        self.logs.sort_by_key(LogEvent::position);
        self
    }

    /// Any query wider than `span` blocks is rejected as too large.
    pub fn with_max_span(mut self, span: u64) -> Self {
        self.max_span = Some(span);
        self
    }

    /// Every query starting at `from_block` is rejected as too large.
    pub fn with_range_rejected_always(mut self, from_block: u64) -> Self {
        self.rejected_starts.insert(from_block);
        self
    }

    /// The first query for exactly `from..=to` is rejected as too large.
    pub fn with_range_rejected_once(self, from_block: u64, to_block: u64) -> Self {
        self.rejected_once.lock().unwrap().insert((from_block, to_block));
        self
    }

    pub fn with_failing_log_start(mut self, from_block: u64) -> Self {
        self.failing_log_starts.insert(from_block);
        self
    }

    pub fn with_callable(mut self, address: Address) -> Self {
        self.callable.insert(address);
        self
    }

    /// Trigger `signal` while answering the first `get_code`, as a Ctrl-C landing
    /// mid-target would.
    pub fn with_shutdown_on_code(mut self, signal: ShutdownSignal) -> Self {
        self.shutdown_on_code = Some(signal);
        self
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.log_queries.lock().unwrap().clone()
    }

    pub fn storage_reads(&self) -> usize {
        self.storage_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn get_code(&self, address: Address) -> Result<Bytes> {
        if let Some(signal) = &self.shutdown_on_code {
            signal.trigger();
        }
        if self.hanging_accounts.contains(&address) {
            std::future::pending::<()>().await;
        }
        if self.broken_accounts.contains(&address) {
            return Err(ScannerError::Network("connection refused".into()));
        }
        Ok(self.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256> {
        self.storage_reads.fetch_add(1, Ordering::SeqCst);
        if self.broken_accounts.contains(&address) {
            return Err(ScannerError::Network("connection refused".into()));
        }
        if self.failing_slots.contains(&slot) {
            return Err(ScannerError::Network("storage read timed out".into()));
        }
        Ok(self.storage.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn get_past_logs(
        &self,
        address: Address,
        topics: &[H256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>> {
        self.log_queries.lock().unwrap().push((from_block, to_block));

        let span = to_block - from_block + 1;
        let rejected_once = self.rejected_once.lock().unwrap().remove(&(from_block, to_block));
        if rejected_once
            || self.rejected_starts.contains(&from_block)
            || self.max_span.is_some_and(|max| span > max)
        {
            return Err(ScannerError::RangeTooLarge { from_block, to_block });
        }
        if self.failing_log_starts.contains(&from_block) {
            return Err(ScannerError::Network("connection reset".into()));
        }

        Ok(self
            .logs
            .iter()
            .filter(|log| log.address == address)
            .filter(|log| (from_block..=to_block).contains(&log.block_number))
            .filter(|log| topics.is_empty() || log.topics.first().is_some_and(|t| topics.contains(t)))
            .cloned()
            .collect())
    }

    async fn call(&self, address: Address, _data: Bytes) -> Result<Bytes> {
        if self.callable.contains(&address) {
            Ok(Bytes::new())
        } else {
            Err(ScannerError::Reverted("execution reverted".into()))
        }
    }
}

/// Source lookups from a fixed table; anything missing is unverified.
#[derive(Default)]
pub struct MockSources {
    sources: HashMap<Address, VerifiedSource>,
    failing: HashSet<Address>,
    lookups: AtomicUsize,
}

impl MockSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, address: Address, name: &str, text: &str) -> Self {
        self.sources.insert(
            address,
            VerifiedSource {
                contract_name: name.to_string(),
                compiler_version: "v0.8.19+commit.7dd6d404".to_string(),
                source_text: text.to_string(),
            },
        );
        self
    }

    /// Lookups for this address fail as an explorer outage would.
    pub fn with_failing(mut self, address: Address) -> Self {
        self.failing.insert(address);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for MockSources {
    async fn get_verified_source(&self, address: Address) -> Result<SourceLookup> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&address) {
            return Err(ScannerError::SourceProvider("explorer returned NOTOK".into()));
        }
        Ok(match self.sources.get(&address) {
            Some(source) => SourceLookup::Verified(source.clone()),
            None => SourceLookup::NotVerified,
        })
    }
}
