use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use ethers::types::{Address, Bytes, H256};

use crate::config::RpcConfig;
use crate::core::ChainReader;
use crate::models::LogEvent;
use crate::utils::{Result, ScannerError};

/// Run one request under a per-attempt timeout, retrying transient failures
/// with bounded exponential backoff. An elapsed timeout counts as a network error.
pub(crate) async fn with_retry<T, F, Fut>(rpc: &RpcConfig, what: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBuilder::default()
        .with_max_times(rpc.max_retries)
        .with_min_delay(rpc.min_retry_delay);
    let timeout = rpc.request_timeout;
    let operation = &operation;

    (move || async move {
        match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ScannerError::Network(format!("{} timed out after {:?}", what, timeout))),
        }
    })
    .retry(retry_strategy)
    .sleep(tokio::time::sleep)
    .when(ScannerError::is_transient)
    .notify(|e, delay| tracing::debug!("Retrying {} in {:?}: {}", what, delay, e))
    .await
}

/// Wraps any [`ChainReader`] so every request gets a timeout and bounded retries.
///
/// A request that never answers ends as a `Network` error after
/// `max_retries + 1` timed-out attempts instead of holding its target forever.
pub struct RobustChain {
    inner: Arc<dyn ChainReader>,
    rpc: RpcConfig,
}

impl RobustChain {
    pub fn new(inner: Arc<dyn ChainReader>, rpc: RpcConfig) -> Self {
        Self { inner, rpc }
    }
}

#[async_trait]
impl ChainReader for RobustChain {
    async fn get_code(&self, address: Address) -> Result<Bytes> {
        with_retry(&self.rpc, "eth_getCode", || self.inner.get_code(address)).await
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256> {
        with_retry(&self.rpc, "eth_getStorageAt", || self.inner.get_storage_at(address, slot)).await
    }

    async fn get_past_logs(
        &self,
        address: Address,
        topics: &[H256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>> {
        with_retry(&self.rpc, "eth_getLogs", || {
            self.inner.get_past_logs(address, topics, from_block, to_block)
        })
        .await
    }

    async fn call(&self, address: Address, data: Bytes) -> Result<Bytes> {
        with_retry(&self.rpc, "eth_call", || self.inner.call(address, data.clone())).await
    }
}
