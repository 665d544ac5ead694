pub mod client;
pub mod etherscan;
pub mod rate_limit;
pub mod robust;

pub use client::BlockchainClient;
pub use etherscan::EtherscanSource;
pub use rate_limit::RateLimiter;
pub use robust::RobustChain;
