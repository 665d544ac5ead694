use std::sync::Arc;

use async_trait::async_trait;
use ethers::etherscan::errors::EtherscanError;
use ethers::etherscan::Client;
use ethers::types::{Address, Chain};

use super::robust::with_retry;
use super::rate_limit::RateLimiter;
use crate::config::RpcConfig;
use crate::core::SourceProvider;
use crate::models::{SourceLookup, VerifiedSource};
use crate::utils::{Result, ScannerError};

/// Verified source lookups against an Etherscan-compatible explorer.
pub struct EtherscanSource {
    client: Client,
    limiter: Arc<RateLimiter>,
    rpc: RpcConfig,
}

impl EtherscanSource {
    pub fn new(chain: Chain, api_key: &str, limiter: Arc<RateLimiter>, rpc: RpcConfig) -> Result<Self> {
        let client = Client::new(chain, api_key)
            .map_err(|e| ScannerError::Configuration(format!("Etherscan client: {}", e)))?;
        Ok(Self { client, limiter, rpc })
    }
}

#[async_trait]
impl SourceProvider for EtherscanSource {
    async fn get_verified_source(&self, address: Address) -> Result<SourceLookup> {
        tracing::debug!("Fetching verified source for {:?}", address);

        let lookup = with_retry(&self.rpc, "getsourcecode", || async {
            self.limiter.acquire().await;
            match self.client.contract_source_code(address).await {
                Ok(metadata) => Ok(Some(metadata)),
                Err(EtherscanError::ContractCodeNotVerified(_)) => Ok(None),
                Err(e) => Err(classify(e)),
            }
        })
        .await?;

        let Some(metadata) = lookup else {
            return Ok(SourceLookup::NotVerified);
        };
        let Some(item) = metadata.items.first() else {
            return Ok(SourceLookup::NotVerified);
        };

        let source_text = item.source_code();
        if source_text.trim().is_empty() {
            return Ok(SourceLookup::NotVerified);
        }

        Ok(SourceLookup::Verified(VerifiedSource {
            contract_name: item.contract_name.clone(),
            compiler_version: item.compiler_version.clone(),
            source_text,
        }))
    }
}

fn classify(error: EtherscanError) -> ScannerError {
    match error {
        EtherscanError::RateLimitExceeded | EtherscanError::Reqwest(_) => ScannerError::Network(error.to_string()),
        other => ScannerError::SourceProvider(other.to_string()),
    }
}
