//! Chunked historical log retrieval

pub mod log_scanner;
pub mod range;

pub use log_scanner::{ChunkOutcome, LogRangeScanner, RangeScan, ScanSummary, DEFAULT_MAX_SHRINKS};
pub use range::{BlockRange, ChunkPlan};
