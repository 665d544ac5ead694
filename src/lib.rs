pub mod contracts;      // Well-known default targets
pub mod storage;        // EIP-1967 proxy slot resolution
pub mod scanning;       // Chunked log retrieval
pub mod decoding;       // Event schemas and typed decoding

pub mod analyzers;
pub mod blockchain;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{LogScanConfig, RpcConfig, ScanConfig};
pub use core::{ChainReader, ReportSink, ScanOrchestrator, ShutdownSignal, SourceProvider, TargetState};
pub use models::{Finding, Pattern, ScanReport, ScanTarget, Severity};
pub use utils::{Result, ScannerError};
