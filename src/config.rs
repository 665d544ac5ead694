use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scanning::{BlockRange, DEFAULT_MAX_SHRINKS};
use crate::utils::{Result, ScannerError};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(500);
/// Spacing between chain requests (the factory scan ran one request per 100ms).
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
/// Etherscan's free tier allows 5 requests per second.
pub const DEFAULT_SOURCE_REQUEST_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_MAX_CHUNK: u64 = 4;

/// Per-request behavior of the RPC client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub request_timeout: Duration,
    pub max_retries: usize,
    pub min_retry_delay: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_retry_delay: DEFAULT_MIN_RETRY_DELAY,
        }
    }
}

/// Historical log scan over each target. Absent means targets are not log-scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogScanConfig {
    pub from_block: u64,
    pub to_block: u64,
    pub max_chunk: u64,
    pub max_shrinks: u32,
}

impl LogScanConfig {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block,
            max_chunk: DEFAULT_MAX_CHUNK,
            max_shrinks: DEFAULT_MAX_SHRINKS,
        }
    }

    pub fn with_max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    pub fn with_max_shrinks(mut self, max_shrinks: u32) -> Self {
        self.max_shrinks = max_shrinks;
        self
    }

    pub fn range(&self) -> Result<BlockRange> {
        BlockRange::new(self.from_block, self.to_block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub rpc: RpcConfig,
    pub request_interval: Duration,
    pub source_request_interval: Duration,
    /// Targets analyzed at the same time.
    pub concurrency: usize,
    pub log_scan: Option<LogScanConfig>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rpc: RpcConfig::default(),
            request_interval: DEFAULT_REQUEST_INTERVAL,
            source_request_interval: DEFAULT_SOURCE_REQUEST_INTERVAL,
            concurrency: DEFAULT_CONCURRENCY,
            log_scan: None,
        }
    }
}

impl ScanConfig {
    pub fn with_log_scan(mut self, log_scan: LogScanConfig) -> Self {
        self.log_scan = Some(log_scan);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ScannerError::Configuration("concurrency must be at least 1".into()));
        }
        if self.rpc.request_timeout.is_zero() {
            return Err(ScannerError::Configuration("request timeout must be non-zero".into()));
        }
        if let Some(log_scan) = &self.log_scan {
            if log_scan.max_chunk == 0 {
                return Err(ScannerError::Configuration("max chunk must be at least 1 block".into()));
            }
            log_scan.range()?;
        }
        Ok(())
    }
}
