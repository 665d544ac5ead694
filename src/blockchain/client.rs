use std::sync::Arc;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;

use super::robust::with_retry;
use crate::config::RpcConfig;
use crate::core::ChainReader;
use crate::models::LogEvent;
use crate::utils::{Result, ScannerError};

/// Blockchain RPC client
///
/// Its `ChainReader` methods make a single attempt each; wrap it in
/// [`RobustChain`](super::RobustChain) for per-request timeouts and retries.
pub struct BlockchainClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
    rpc: RpcConfig,
}

impl BlockchainClient {
    /// Create a new client
    pub async fn new(rpc_url: &str, rpc: RpcConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| ScannerError::Configuration(format!("Invalid RPC URL: {}", e)))?;

        let provider = Arc::new(provider);

        let chain_id = with_retry(&rpc, "eth_chainId", || async {
            provider.get_chainid().await.map_err(ScannerError::from)
        })
        .await?;

        tracing::info!("Connected to chain ID: {}", chain_id);

        Ok(Self {
            provider,
            chain_id: chain_id.as_u64(),
            rpc,
        })
    }

    /// Get current block number
    pub async fn block_number(&self) -> Result<u64> {
        let block = with_retry(&self.rpc, "eth_blockNumber", || async {
            self.provider.get_block_number().await.map_err(ScannerError::from)
        })
        .await?;
        Ok(block.as_u64())
    }

    /// Get chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Get chain name
    pub fn chain_name(&self) -> &'static str {
        match self.chain_id {
            1 => "Ethereum Mainnet",
            11155111 => "Sepolia",
            42161 => "Arbitrum One",
            8453 => "Base",
            _ => "Unknown Chain",
        }
    }

    pub fn chain(&self) -> Chain {
        Chain::try_from(self.chain_id).unwrap_or(Chain::Mainnet)
    }
}

#[async_trait]
impl ChainReader for BlockchainClient {
    async fn get_code(&self, address: Address) -> Result<Bytes> {
        tracing::debug!("Fetching bytecode for {:?}", address);
        Ok(self.provider.get_code(address, None).await?)
    }

    async fn get_storage_at(&self, address: Address, slot: H256) -> Result<H256> {
        Ok(self.provider.get_storage_at(address, slot, None).await?)
    }

    async fn get_past_logs(
        &self,
        address: Address,
        topics: &[H256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEvent>> {
        let mut filter = Filter::new()
            .address(address)
            .from_block(from_block)
            .to_block(to_block);
        if !topics.is_empty() {
            let topic0: Topic = ValueOrArray::Array(topics.iter().copied().map(Some).collect());
            filter = filter.topic0(topic0);
        }

        let logs = self
            .provider
            .get_logs(&filter)
            .await
            .map_err(|e| ScannerError::from_log_query(&e, from_block, to_block))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match LogEvent::try_from(log) {
                Ok(event) => events.push(event),
                Err(reason) => tracing::debug!("Dropping log from {:?}: {}", address, reason),
            }
        }
        Ok(events)
    }

    async fn call(&self, address: Address, data: Bytes) -> Result<Bytes> {
        let tx: TypedTransaction = TransactionRequest::new().to(address).data(data).into();
        self.provider
            .call(&tx, None)
            .await
            .map_err(|e| ScannerError::from_call(&e))
    }
}
