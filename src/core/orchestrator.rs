use std::sync::Arc;

use ethers::types::{Address, Bytes, H256};
use futures::stream::{self, StreamExt};

use super::shutdown::ShutdownSignal;
use super::state::TargetState;
use super::traits::{ChainReader, SourceProvider};
use crate::analyzers::PatternClassifier;
use crate::blockchain::RateLimiter;
use crate::config::{LogScanConfig, ScanConfig};
use crate::decoding::{DomainEvent, EventDecoder};
use crate::models::{
    Finding, Pattern, PoolRecord, PoolSet, ProxyInfo, ScanReport, ScanTarget, SourceLookup,
    TargetOutcome, TargetSummary,
};
use crate::scanning::{BlockRange, LogRangeScanner, DEFAULT_MAX_SHRINKS};
use crate::storage::{address_from_word, selector, ProxySlotResolver};
use crate::utils::{Result, ScannerError};

/// Drives proxy resolution, log scanning and classification over a set of targets.
///
/// A failing target ends up as an `ERRORED` entry with a `ScanFailure` finding; it
/// never stops the rest of the run.
pub struct ScanOrchestrator {
    chain: Arc<dyn ChainReader>,
    sources: Arc<dyn SourceProvider>,
    config: ScanConfig,
    shutdown: ShutdownSignal,
    limiter: Arc<RateLimiter>,
    resolver: ProxySlotResolver,
    scanner: LogRangeScanner,
    decoder: EventDecoder,
    classifier: PatternClassifier,
}

impl ScanOrchestrator {
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::default()
    }

    /// Analyze every target and return the finished report.
    ///
    /// Targets run up to `concurrency` at a time, but results are appended here, in
    /// input order, by this task alone.
    pub async fn run(&self, targets: &[ScanTarget]) -> ScanReport {
        tracing::info!("🚀 Scanning {} target(s)", targets.len());

        let mut report = ScanReport::new();
        let mut outcomes = stream::iter(targets)
            .map(|target| self.analyze_target(target))
            .buffered(self.config.concurrency);

        while let Some(outcome) = outcomes.next().await {
            if let Some(outcome) = outcome {
                report.record(outcome);
            }
        }
        report.finalize();

        tracing::info!(
            "✅ Scan complete: {} contract(s), {} finding(s), {} critical, {} high, {} pool(s)",
            report.stats.contracts_analyzed,
            report.total_findings(),
            report.stats.critical_issues,
            report.stats.high_issues,
            report.pools.len()
        );
        report
    }

    /// `None` when shutdown was requested before the target started.
    async fn analyze_target(&self, target: &ScanTarget) -> Option<TargetOutcome> {
        if self.shutdown.is_triggered() {
            tracing::info!("🛑 Skipping {} ({:?}): shutdown requested", target.name, target.address);
            return None;
        }

        tracing::info!("🔍 Analyzing {} ({:?})", target.name, target.address);

        let mut job = TargetJob::new(target);
        match self.run_target(&mut job).await {
            Ok(()) => {}
            Err(ScannerError::Cancelled) => {
                tracing::warn!("🛑 {} stopped at {}: shutdown requested", target.name, job.summary.state());
                job.fail(ScannerError::Cancelled.to_string());
            }
            Err(e) => {
                tracing::error!("❌ {} failed: {}", target.name, e);
                job.fail(e.to_string());
            }
        }
        job.settle();
        Some(job.into_outcome())
    }

    /// Checked before every request phase; in-flight requests are left to finish.
    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_triggered() {
            Err(ScannerError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        self.ensure_running()?;
        self.limiter.acquire().await;
        Ok(!self.chain.get_code(address).await?.is_empty())
    }

    async fn run_target(&self, job: &mut TargetJob) -> Result<()> {
        let address = job.summary.address;

        if !self.has_code(address).await? {
            return Err(ScannerError::ContractNotFound(format!("{:?}", address)));
        }

        self.ensure_running()?;
        let proxy = self.resolver.resolve(address).await;
        self.ensure_running()?;
        if proxy.all_unresolved() {
            let reason = proxy.implementation.clone();
            return Err(ScannerError::Network(format!("proxy slots unreadable: {:?}", reason)));
        }
        job.summary.proxy = Some(proxy.clone());

        if let Some(implementation) = proxy.implementation.address() {
            tracing::info!("🔗 {} is a proxy for {:?}", job.summary.name, implementation);
            match self.has_code(implementation).await {
                Ok(deployed) => {
                    if !deployed {
                        tracing::warn!("⚠️  {} points at {:?}, which holds no code", job.summary.name, implementation);
                    }
                    job.summary.implementation_has_code = Some(deployed);
                }
                Err(ScannerError::Cancelled) => return Err(ScannerError::Cancelled),
                Err(e) => tracing::warn!("Could not read code of {:?}: {}", implementation, e),
            }
        }
        job.advance(TargetState::ProxyChecked);

        if let Some(log_scan) = &self.config.log_scan {
            self.ensure_running()?;
            self.scan_logs(job, log_scan).await?;
            job.advance(TargetState::LogsScanned);
        }

        self.classify_target(job, &proxy).await
    }

    async fn scan_logs(&self, job: &mut TargetJob, log_scan: &LogScanConfig) -> Result<()> {
        let address = job.summary.address;
        let scan = self
            .scanner
            .scan(address, self.decoder.topics(), log_scan.range()?, log_scan.max_chunk)?;
        let result = scan.collect_all().await;

        let batch = self.decoder.decode_batch(&result.events);
        for skipped in &batch.skipped {
            tracing::warn!(
                "Skipping log {}:{} from {}: {}",
                skipped.block_number,
                skipped.log_index,
                job.summary.name,
                skipped.error
            );
        }

        let mut announced = Vec::new();
        for event in batch.events {
            match event {
                DomainEvent::PoolDeployed(record) => announced.push(record),
                DomainEvent::Upgraded { implementation } => {
                    tracing::debug!("{} upgraded to {:?}", job.summary.name, implementation);
                    job.summary.upgrades_observed += 1;
                }
                DomainEvent::AdminChanged { new_admin, .. } => {
                    tracing::debug!("{} admin changed to {:?}", job.summary.name, new_admin);
                    job.summary.upgrades_observed += 1;
                }
                DomainEvent::BeaconUpgraded { beacon } => {
                    tracing::debug!("{} beacon changed to {:?}", job.summary.name, beacon);
                    job.summary.upgrades_observed += 1;
                }
            }
        }

        job.summary.events_decoded = result.events.len() - batch.skipped.len();
        job.summary.events_skipped = batch.skipped.len();
        job.summary.failed_ranges = result.failed;
        if result.cancelled {
            return Err(ScannerError::Cancelled);
        }

        for record in announced {
            self.record_pool(job, record).await?;
        }

        tracing::info!(
            "📜 {}: {} event(s) decoded, {} pool(s), {} upgrade event(s)",
            job.summary.name,
            job.summary.events_decoded,
            job.pools.len(),
            job.summary.upgrades_observed
        );
        Ok(())
    }

    /// Keep an announced pool only once its address holds code. A failed lookup
    /// keeps the pool; only a confirmed empty account drops it.
    async fn record_pool(&self, job: &mut TargetJob, record: PoolRecord) -> Result<()> {
        if job.pools.get(&record.address).is_some() {
            return Ok(());
        }
        match self.has_code(record.address).await {
            Ok(false) => {
                tracing::warn!("Pool {:?} announced by {} holds no code, dropping", record.address, job.summary.name);
            }
            Ok(true) => {
                job.pools.insert(record);
            }
            Err(ScannerError::Cancelled) => return Err(ScannerError::Cancelled),
            Err(e) => {
                tracing::warn!("Could not confirm pool {:?}: {}", record.address, e);
                job.pools.insert(record);
            }
        }
        Ok(())
    }

    async fn classify_target(&self, job: &mut TargetJob, proxy: &ProxyInfo) -> Result<()> {
        let name = job.summary.name.clone();
        let address = job.summary.address;

        self.ensure_running()?;
        match self.sources.get_verified_source(address).await? {
            SourceLookup::Verified(source) => {
                let findings = self.classifier.classify(&name, &source.source_text);
                tracing::info!("🧪 {}: {} finding(s)", name, findings.len());
                job.summary.compiler_version = Some(source.compiler_version);
                job.summary.classified.push(name.clone());
                job.findings.extend(findings);
                job.verified = true;
                if let Some(finding) = unscanned_blocks(&name, &job.summary.failed_ranges) {
                    job.findings.push(finding);
                }
            }
            SourceLookup::NotVerified => {
                tracing::info!("📭 {} has no verified source", name);
                job.findings.push(unverified(&name, &job.summary.failed_ranges));
            }
        }

        let implementation = proxy
            .implementation
            .address()
            .filter(|a| *a != address && job.summary.implementation_has_code != Some(false));
        if let Some(implementation) = implementation {
            self.ensure_running()?;
            self.classify_implementation(job, implementation).await;
        }

        self.ensure_running()?;
        self.read_owner(job).await;

        if proxy.is_proxy() {
            self.try_initializer(job).await;
        }

        let outcome = if job.verified {
            TargetState::Classified
        } else {
            TargetState::Unverified
        };
        job.advance(outcome);
        Ok(())
    }

    /// Best effort: an unverified or unreachable implementation is logged and skipped.
    async fn classify_implementation(&self, job: &mut TargetJob, implementation: Address) {
        let label = format!("{} (implementation)", job.summary.name);
        match self.sources.get_verified_source(implementation).await {
            Ok(SourceLookup::Verified(source)) => {
                let findings = self.classifier.classify(&label, &source.source_text);
                tracing::info!("🧪 {}: {} finding(s)", label, findings.len());
                job.summary.classified.push(label);
                job.findings.extend(findings);
                job.verified = true;
            }
            Ok(SourceLookup::NotVerified) => {
                tracing::info!("📭 {} ({:?}) has no verified source, skipping", label, implementation);
            }
            Err(e) => {
                tracing::warn!("Could not fetch source for {}: {}", label, e);
            }
        }
    }

    /// Best effort `owner()` read; reverts and short answers leave it unset.
    async fn read_owner(&self, job: &mut TargetJob) {
        self.limiter.acquire().await;
        let data = Bytes::from(selector("owner()").to_vec());
        match self.chain.call(job.summary.address, data).await {
            Ok(answer) if answer.len() >= 32 => {
                job.summary.owner = address_from_word(H256::from_slice(&answer[..32]));
                if let Some(owner) = job.summary.owner {
                    tracing::debug!("{} owner() = {:?}", job.summary.name, owner);
                }
            }
            Ok(_) | Err(ScannerError::Reverted(_)) => {}
            Err(e) => tracing::debug!("owner() on {} failed: {}", job.summary.name, e),
        }
    }

    /// Ask the proxy whether `initialize()` still goes through.
    async fn try_initializer(&self, job: &mut TargetJob) {
        if !job
            .findings
            .iter()
            .any(|f| f.pattern == Pattern::ProxyInitializationBypass)
        {
            return;
        }
        if self.shutdown.is_triggered() {
            return;
        }

        self.limiter.acquire().await;
        let data = Bytes::from(selector("initialize()").to_vec());
        let callable = match self.chain.call(job.summary.address, data).await {
            Ok(_) => Some(true),
            Err(ScannerError::Reverted(_)) => Some(false),
            Err(e) => {
                tracing::warn!("initialize() call on {} failed: {}", job.summary.name, e);
                None
            }
        };
        if callable == Some(true) {
            tracing::warn!("⚠️  initialize() on {} did not revert", job.summary.name);
        }

        let has_code = job.summary.implementation_has_code;
        for finding in job
            .findings
            .iter_mut()
            .filter(|f| f.pattern == Pattern::ProxyInitializationBypass)
        {
            if let Some(serde_json::Value::Object(evidence)) = finding.evidence.as_mut() {
                if let Some(callable) = callable {
                    evidence.insert("initializeCallable".to_string(), serde_json::Value::Bool(callable));
                }
                if let Some(has_code) = has_code {
                    evidence.insert("implementationHasCode".to_string(), serde_json::Value::Bool(has_code));
                }
            }
        }
    }
}

/// The single informational finding for a target without verified source. Blocks
/// the log scan could not cover are listed in it rather than in a second finding.
fn unverified(name: &str, failed_ranges: &[BlockRange]) -> Finding {
    let mut finding = Finding::unverified(name);
    if !failed_ranges.is_empty() {
        finding.risk = format!("{}; logs unavailable for blocks {}", finding.risk, join_ranges(failed_ranges));
        finding = finding.with_evidence(serde_json::json!({ "failedRanges": failed_ranges }));
    }
    finding
}

fn unscanned_blocks(name: &str, failed_ranges: &[BlockRange]) -> Option<Finding> {
    if failed_ranges.is_empty() {
        return None;
    }
    let reason = format!("logs unavailable for blocks {}", join_ranges(failed_ranges));
    Some(
        Finding::scan_failure(name, reason)
            .with_evidence(serde_json::json!({ "failedRanges": failed_ranges })),
    )
}

fn join_ranges(ranges: &[BlockRange]) -> String {
    ranges.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Working state for one target, owned by the task analyzing it.
struct TargetJob {
    summary: TargetSummary,
    findings: Vec<Finding>,
    pools: PoolSet,
    verified: bool,
}

impl TargetJob {
    fn new(target: &ScanTarget) -> Self {
        Self {
            summary: TargetSummary::new(target.name.clone(), target.address),
            findings: Vec::new(),
            pools: PoolSet::new(),
            verified: false,
        }
    }

    fn advance(&mut self, next: TargetState) {
        let current = self.summary.state();
        if !self.summary.advance(next) {
            tracing::error!("{}: refused state change {} → {}", self.summary.name, current, next);
        }
    }

    fn fail(&mut self, reason: String) {
        self.findings
            .push(Finding::scan_failure(self.summary.name.clone(), reason.clone()));
        self.summary.error = Some(reason);
        self.advance(TargetState::Errored);
    }

    fn settle(&mut self) {
        if !self.summary.state().is_terminal() {
            self.advance(TargetState::Done);
        }
    }

    fn into_outcome(self) -> TargetOutcome {
        TargetOutcome {
            summary: self.summary,
            findings: self.findings,
            pools: self.pools,
        }
    }
}

/// Collects collaborators and configuration. Nothing is read from the environment.
#[derive(Default)]
pub struct ScanOrchestratorBuilder {
    chain: Option<Arc<dyn ChainReader>>,
    sources: Option<Arc<dyn SourceProvider>>,
    config: ScanConfig,
    shutdown: Option<ShutdownSignal>,
    limiter: Option<Arc<RateLimiter>>,
}

impl ScanOrchestratorBuilder {
    pub fn chain_reader(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn source_provider(mut self, sources: Arc<dyn SourceProvider>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Share a limiter with other users of the same provider. Defaults to one
    /// spaced by `config.request_interval`.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn build(self) -> Result<ScanOrchestrator> {
        let chain = self
            .chain
            .ok_or_else(|| ScannerError::Configuration("no chain reader configured".into()))?;
        let sources = self
            .sources
            .ok_or_else(|| ScannerError::Configuration("no source provider configured".into()))?;
        self.config.validate()?;

        let shutdown = self.shutdown.unwrap_or_default();
        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(self.config.request_interval)));
        let max_shrinks = self
            .config
            .log_scan
            .as_ref()
            .map_or(DEFAULT_MAX_SHRINKS, |log_scan| log_scan.max_shrinks);

        let resolver = ProxySlotResolver::new(chain.clone())
            .with_rate_limiter(limiter.clone())
            .with_shutdown(shutdown.clone());
        let scanner = LogRangeScanner::new(chain.clone(), limiter.clone())
            .with_shutdown(shutdown.clone())
            .with_max_shrinks(max_shrinks);

        Ok(ScanOrchestrator {
            chain,
            sources,
            config: self.config,
            shutdown,
            limiter,
            resolver,
            scanner,
            decoder: EventDecoder::default(),
            classifier: PatternClassifier::new(),
        })
    }
}
