pub mod finding;
pub mod contract;
pub mod log;
pub mod pool;
pub mod proxy;
pub mod report;

pub use finding::{Finding, Pattern, Severity};
pub use contract::{canonical_address, ScanTarget, SourceLookup, VerifiedSource};
pub use log::{is_strictly_ordered, LogEvent};
pub use pool::{PoolRecord, PoolSet};
pub use proxy::{ProxyInfo, SlotValue};
pub use report::{ReportDocument, ScanReport, ScanStats, TargetOutcome, TargetSummary};
