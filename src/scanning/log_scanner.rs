use std::sync::Arc;

use ethers::types::{Address, H256};

use super::range::{BlockRange, ChunkPlan};
use crate::blockchain::RateLimiter;
use crate::core::{ChainReader, ShutdownSignal};
use crate::models::LogEvent;
use crate::utils::{Result, ScannerError};

pub const DEFAULT_MAX_SHRINKS: u32 = 4;

/// Result of one log query as seen by the caller.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Blocks this outcome accounts for. Successive outcomes tile the scanned range.
    pub range: BlockRange,
    pub result: Result<Vec<LogEvent>>,
    /// Requests spent on this outcome, counting shrink retries.
    pub attempts: u32,
}

impl ChunkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Paginates `eth_getLogs` over a block range, halving the request width when the
/// provider rejects a span as too large.
pub struct LogRangeScanner {
    chain: Arc<dyn ChainReader>,
    limiter: Arc<RateLimiter>,
    shutdown: ShutdownSignal,
    max_shrinks: u32,
}

impl LogRangeScanner {
    pub fn new(chain: Arc<dyn ChainReader>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            chain,
            limiter,
            shutdown: ShutdownSignal::new(),
            max_shrinks: DEFAULT_MAX_SHRINKS,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_max_shrinks(mut self, max_shrinks: u32) -> Self {
        self.max_shrinks = max_shrinks;
        self
    }

    /// Start a lazy scan. Nothing is requested until the first `next_chunk`.
    pub fn scan(
        &self,
        address: Address,
        topics: Vec<H256>,
        range: BlockRange,
        max_chunk: u64,
    ) -> Result<RangeScan<'_>> {
        let plan = ChunkPlan::new(range, max_chunk)?;
        Ok(RangeScan {
            scanner: self,
            address,
            topics,
            overall: range,
            plan,
            current: None,
            finished: false,
        })
    }
}

/// Planned sub-range still being worked through.
#[derive(Debug, Clone, Copy)]
struct InProgress {
    remaining: BlockRange,
    width: u64,
    shrinks: u32,
}

/// Cursor over one scan. Outcomes come back strictly left to right.
pub struct RangeScan<'a> {
    scanner: &'a LogRangeScanner,
    address: Address,
    topics: Vec<H256>,
    overall: BlockRange,
    plan: ChunkPlan,
    current: Option<InProgress>,
    finished: bool,
}

impl<'a> RangeScan<'a> {
    pub async fn next_chunk(&mut self) -> Option<ChunkOutcome> {
        if self.finished {
            return None;
        }

        let mut attempts = 0;
        loop {
            let mut progress = match self.current.take() {
                Some(progress) => progress,
                None => {
                    let planned = self.plan.next()?;
                    InProgress {
                        remaining: planned,
                        width: planned.width(),
                        shrinks: 0,
                    }
                }
            };

            if self.scanner.shutdown.is_triggered() {
                self.finished = true;
                let unscanned = BlockRange {
                    from_block: progress.remaining.from_block,
                    to_block: self.overall.to_block,
                };
                tracing::warn!("🛑 Log scan of {:?} stopped before {}", self.address, unscanned);
                return Some(ChunkOutcome {
                    range: unscanned,
                    result: Err(ScannerError::Cancelled),
                    attempts,
                });
            }

            let request = progress.remaining.head(progress.width);
            self.scanner.limiter.acquire().await;
            attempts += 1;

            tracing::debug!("  Querying logs {} for {:?}", request, self.address);

            match self
                .scanner
                .chain
                .get_past_logs(self.address, &self.topics, request.from_block, request.to_block)
                .await
            {
                Ok(events) => {
                    if let Some(rest) = progress.remaining.after(&request) {
                        progress.remaining = rest;
                        self.current = Some(progress);
                    }
                    return Some(ChunkOutcome {
                        range: request,
                        result: Ok(events),
                        attempts,
                    });
                }
                Err(e) if e.is_range_too_large()
                    && progress.shrinks < self.scanner.max_shrinks
                    && request.width() > 1 =>
                {
                    let old_width = request.width();
                    progress.width = (old_width / 2).max(1);
                    progress.shrinks += 1;
                    tracing::warn!(
                        "⚠️  Range {} too large, reducing chunk size: {} → {}",
                        request,
                        old_width,
                        progress.width
                    );
                    self.current = Some(progress);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to query range {} after {} attempt(s): {}",
                        progress.remaining,
                        attempts,
                        e
                    );
                    return Some(ChunkOutcome {
                        range: progress.remaining,
                        result: Err(e),
                        attempts,
                    });
                }
            }
        }
    }

    /// Drain the scan. Events from successful chunks, in order, plus every failed range.
    pub async fn collect_all(mut self) -> ScanSummary {
        let mut summary = ScanSummary::default();
        while let Some(outcome) = self.next_chunk().await {
            summary.requests += outcome.attempts;
            match outcome.result {
                Ok(events) => {
                    summary.chunks += 1;
                    summary.events.extend(events);
                }
                Err(ScannerError::Cancelled) => {
                    summary.cancelled = true;
                    summary.failed.push(outcome.range);
                }
                Err(_) => summary.failed.push(outcome.range),
            }
        }
        summary
    }
}

#[derive(Debug, Default)]
pub struct ScanSummary {
    pub events: Vec<LogEvent>,
    pub failed: Vec<BlockRange>,
    pub chunks: usize,
    pub requests: u32,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::is_strictly_ordered;
    use crate::test_utils::{sample_log, MockChain};
    use std::time::Duration;

    const FACTORY: Address = Address::repeat_byte(0xFA);

    fn scanner(chain: MockChain) -> (Arc<MockChain>, LogRangeScanner) {
        let chain = Arc::new(chain);
        let scanner = LogRangeScanner::new(chain.clone(), Arc::new(RateLimiter::unlimited()));
        (chain, scanner)
    }

    #[tokio::test]
    async fn test_outcomes_tile_the_range() {
        let (_, scanner) = scanner(MockChain::new());
        let range = BlockRange::new(0, 9).unwrap();
        let mut scan = scanner.scan(FACTORY, vec![H256::zero()], range, 4).unwrap();

        let mut ranges = Vec::new();
        while let Some(outcome) = scan.next_chunk().await {
            assert!(outcome.is_ok());
            ranges.push((outcome.range.from_block, outcome.range.to_block));
        }
        assert_eq!(ranges, vec![(0, 3), (4, 7), (8, 9)]);
    }

    #[tokio::test]
    async fn test_shrink_then_continue_at_smaller_width() {
        let topic = H256::repeat_byte(0x01);
        let chain = MockChain::new()
            .with_logs(vec![sample_log(FACTORY, topic, 1, 0), sample_log(FACTORY, topic, 6, 0)])
            .with_max_span(2);
        let (chain, scanner) = scanner(chain);
        let range = BlockRange::new(0, 7).unwrap();

        let summary = scanner.scan(FACTORY, vec![topic], range, 4).unwrap().collect_all().await;

        assert!(summary.failed.is_empty());
        assert_eq!(summary.events.len(), 2);
        assert!(is_strictly_ordered(&summary.events));
        // Each planned chunk of 4: one rejected request, then two of width 2.
        assert_eq!(
            chain.log_queries(),
            vec![(0, 3), (0, 1), (2, 3), (4, 7), (4, 5), (6, 7)]
        );
    }

    #[tokio::test]
    async fn test_exhausted_shrinks_fail_only_that_sub_range() {
        let topic = H256::repeat_byte(0x01);
        let chain = MockChain::new()
            .with_logs(vec![sample_log(FACTORY, topic, 9, 0)])
            .with_range_rejected_always(0);
        let (_, scanner) = scanner(chain);
        let scanner = scanner.with_max_shrinks(1);
        let range = BlockRange::new(0, 11).unwrap();

        let summary = scanner.scan(FACTORY, vec![topic], range, 4).unwrap().collect_all().await;

        assert_eq!(summary.failed, vec![BlockRange::new(0, 3).unwrap()]);
        assert_eq!(summary.chunks, 2);
        assert_eq!(summary.events.len(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_is_not_shrunk() {
        let chain = MockChain::new().with_failing_log_start(4);
        let (chain, scanner) = scanner(chain);
        let range = BlockRange::new(0, 11).unwrap();

        let summary = scanner.scan(FACTORY, vec![H256::zero()], range, 4).unwrap().collect_all().await;

        assert_eq!(summary.failed, vec![BlockRange::new(4, 7).unwrap()]);
        assert_eq!(chain.log_queries(), vec![(0, 3), (4, 7), (8, 11)]);
    }

    #[tokio::test]
    async fn test_shutdown_stops_new_requests() {
        let shutdown = ShutdownSignal::new();
        let (chain, scanner) = scanner(MockChain::new());
        let scanner = scanner.with_shutdown(shutdown.clone());
        let range = BlockRange::new(0, 11).unwrap();
        let mut scan = scanner.scan(FACTORY, vec![H256::zero()], range, 4).unwrap();

        assert!(scan.next_chunk().await.unwrap().is_ok());
        shutdown.trigger();

        let last = scan.next_chunk().await.unwrap();
        assert!(matches!(last.result, Err(ScannerError::Cancelled)));
        assert_eq!(last.range, BlockRange::new(4, 11).unwrap());
        assert!(scan.next_chunk().await.is_none());
        assert_eq!(chain.log_queries().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_rate_limited() {
        let chain = Arc::new(MockChain::new());
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(100)));
        let scanner = LogRangeScanner::new(chain, limiter);
        let range = BlockRange::new(0, 15).unwrap();
        let start = tokio::time::Instant::now();

        let summary = scanner.scan(FACTORY, vec![H256::zero()], range, 4).unwrap().collect_all().await;

        assert_eq!(summary.requests, 4);
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_zero_chunk_is_configuration_error() {
        let (_, scanner) = scanner(MockChain::new());
        let range = BlockRange::new(0, 10).unwrap();
        assert!(matches!(
            scanner.scan(FACTORY, vec![], range, 0),
            Err(ScannerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_inverted_range_literal_is_configuration_error() {
        let (chain, scanner) = scanner(MockChain::new());
        let inverted = BlockRange { from_block: 20, to_block: 10 };
        assert!(matches!(
            scanner.scan(FACTORY, vec![], inverted, 4),
            Err(ScannerError::Configuration(_))
        ));
        assert!(chain.log_queries().is_empty());
    }
}
