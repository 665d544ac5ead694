use thiserror::Error;

use crate::decoding::DecodeError;

/// Provider messages that mean "ask for fewer blocks", across the RPC vendors we have seen.
const RANGE_LIMIT_MARKERS: &[&str] = &[
    "-32005",
    "block range",
    "range too large",
    "range is too large",
    "query returned more than",
    "limit exceeded",
    "exceed maximum block range",
    "query timeout exceeded",
];

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Block range {from_block}-{to_block} too large for provider")]
    RangeTooLarge { from_block: u64, to_block: u64 },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Source provider error: {0}")]
    SourceProvider(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Contract not found at address {0}")]
    ContractNotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Call reverted: {0}")]
    Reverted(String),

    #[error("Scan cancelled")]
    Cancelled,
}

impl ScannerError {
    /// Only transient failures are worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScannerError::Network(_))
    }

    pub fn is_range_too_large(&self) -> bool {
        matches!(self, ScannerError::RangeTooLarge { .. })
    }

    /// Classify a raw provider failure for a log query over `from_block..=to_block`.
    pub fn from_log_query(error: &ethers::providers::ProviderError, from_block: u64, to_block: u64) -> Self {
        let message = error.to_string();
        if is_range_limit_message(&message) {
            ScannerError::RangeTooLarge { from_block, to_block }
        } else {
            ScannerError::Network(message)
        }
    }

    /// Classify a failed `eth_call`. A revert is an answer, not a transport failure.
    pub fn from_call(error: &ethers::providers::ProviderError) -> Self {
        let message = error.to_string();
        if message.to_lowercase().contains("revert") {
            ScannerError::Reverted(message)
        } else {
            ScannerError::Network(message)
        }
    }
}

impl From<ethers::providers::ProviderError> for ScannerError {
    fn from(error: ethers::providers::ProviderError) -> Self {
        ScannerError::Network(error.to_string())
    }
}

pub fn is_range_limit_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RANGE_LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker))
}

pub type Result<T> = std::result::Result<T, ScannerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_limit_messages() {
        assert!(is_range_limit_message("(code: -32005, message: query returned more than 10000 results)"));
        assert!(is_range_limit_message("eth_getLogs is limited to a 5 Block Range"));
        assert!(is_range_limit_message("Query Timeout Exceeded"));
        assert!(!is_range_limit_message("connection reset by peer"));
    }

    #[test]
    fn test_only_network_errors_are_transient() {
        assert!(ScannerError::Network("reset".into()).is_transient());
        assert!(!ScannerError::RangeTooLarge { from_block: 1, to_block: 2 }.is_transient());
        assert!(!ScannerError::Configuration("missing".into()).is_transient());
        assert!(!ScannerError::Reverted("execution reverted".into()).is_transient());
    }
}
