use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256};

use crate::models::{LogEvent, ScanReport, SourceLookup};
use crate::utils::Result;

/// Read access to the chain. Everything the engine learns on-chain goes through this.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn get_code(&self, address: Address) -> Result<Bytes>;

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256>;

    /// Logs emitted by `address` whose `topics[0]` is any of `topics`, over
    /// `from_block..=to_block`, in ascending (block, log index) order.
    ///
    /// Fails with `ScannerError::RangeTooLarge` when the provider rejects the span.
    async fn get_past_logs(
        &self,
        address: Address,
        topics: &[H256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>>;

    async fn call(&self, address: Address, data: Bytes) -> Result<Bytes>;
}

/// Verified source code lookup (block explorer or similar).
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn get_verified_source(&self, address: Address) -> Result<SourceLookup>;
}

/// Where a finished report goes.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &ScanReport) -> Result<()>;
}
