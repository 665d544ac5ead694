pub mod orchestrator;
pub mod shutdown;
pub mod sink;
pub mod state;
pub mod traits;

pub use orchestrator::{ScanOrchestrator, ScanOrchestratorBuilder};
pub use shutdown::ShutdownSignal;
pub use sink::WriterSink;
pub use state::TargetState;
pub use traits::{ChainReader, ReportSink, SourceProvider};
