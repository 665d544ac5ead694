use std::sync::Arc;
use std::time::Duration;

use defi_pattern_scanner::blockchain::RobustChain;
use defi_pattern_scanner::core::WriterSink;
use defi_pattern_scanner::decoding::schema::SOVEREIGN_POOL_DEPLOYED;
use defi_pattern_scanner::decoding::{DomainEvent, EventDecoder};
use defi_pattern_scanner::models::{LogEvent, PoolSet};
use defi_pattern_scanner::storage::IMPLEMENTATION_SLOT;
use defi_pattern_scanner::test_utils::{address_word, MockChain, MockSources};
use defi_pattern_scanner::*;
use ethers::types::{Address, Bytes, H256};

const POOL: Address = Address::repeat_byte(0xAA);
const TOKEN0: Address = Address::repeat_byte(0x01);
const TOKEN1: Address = Address::repeat_byte(0x02);
const FACTORY: Address = Address::repeat_byte(0xFA);

const GUARDED_SOURCE: &str = r#"
    contract Factory is Ownable {
        function deploy(address token0, address token1) external onlyOwner returns (address) {}
    }
"#;

const RISKY_SOURCE: &str = r#"
    contract Pool is Initializable {
        function initialize(address manager) public {}
        function flashLoan(address receiver, uint256 amount) external {}
        function setPoolManager(address manager) external {}
    }
"#;

fn pool_deployed(block_number: u64) -> LogEvent {
    LogEvent {
        address: FACTORY,
        topics: vec![
            SOVEREIGN_POOL_DEPLOYED.topic0(),
            address_word(TOKEN0),
            address_word(TOKEN1),
        ],
        data: Bytes::from(address_word(POOL).as_bytes().to_vec()),
        block_number,
        log_index: 7,
        transaction_hash: H256::repeat_byte(0x42),
    }
}

fn build(chain: MockChain, sources: MockSources, config: ScanConfig) -> ScanOrchestrator {
    ScanOrchestrator::builder()
        .chain_reader(Arc::new(chain))
        .source_provider(Arc::new(sources))
        .config(config.with_request_interval(Duration::ZERO))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_unverified_target_gets_one_informational_finding() {
    let unverified = Address::repeat_byte(0x11);
    let verified = Address::repeat_byte(0x12);
    let chain = MockChain::new().with_code(unverified).with_code(verified);
    let sources = MockSources::new().with_source(verified, "Factory", GUARDED_SOURCE);

    let report = build(chain, sources, ScanConfig::default())
        .run(&[ScanTarget::new("Mystery", unverified), ScanTarget::new("Factory", verified)])
        .await;

    let mystery: Vec<&Finding> = report.findings.iter().filter(|f| f.contract == "Mystery").collect();
    assert_eq!(mystery.len(), 1);
    assert_eq!(mystery[0].pattern, Pattern::Unverified);
    assert_eq!(mystery[0].severity, Severity::Info);

    assert_eq!(report.targets.len(), 2);
    assert_eq!(report.targets[0].outcome(), Some(TargetState::Unverified));
    assert_eq!(report.targets[1].outcome(), Some(TargetState::Classified));
    assert_eq!(report.stats.vulnerabilities_found, 0);
}

#[test]
fn test_decoded_pool_is_kept_once() {
    let decoder = EventDecoder::default();
    let mut pools = PoolSet::new();

    for _ in 0..2 {
        let DomainEvent::PoolDeployed(record) = decoder.decode_any(&pool_deployed(100)).unwrap() else {
            panic!("expected a pool deployment");
        };
        pools.insert(record);
    }

    assert_eq!(pools.len(), 1);
    let record = pools.get(&POOL).unwrap();
    assert_eq!(record.token0, TOKEN0);
    assert_eq!(record.token1, TOKEN1);
    assert_eq!(record.deployment_block, 100);
}

#[tokio::test]
async fn test_pool_seen_by_two_scans_is_reported_once() {
    let chain = MockChain::new()
        .with_code(FACTORY)
        .with_code(POOL)
        .with_logs(vec![pool_deployed(12)]);
    let config = ScanConfig::default().with_log_scan(LogScanConfig::new(0, 39).with_max_chunk(8));

    let report = build(chain, MockSources::new(), config)
        .run(&[
            ScanTarget::new("SovereignPoolFactory", FACTORY),
            ScanTarget::new("SovereignPoolFactory (replay)", FACTORY),
        ])
        .await;

    assert_eq!(report.pools.len(), 1);
    assert_eq!(report.pools.get(&POOL).unwrap().token0, TOKEN0);
    assert!(report.targets.iter().all(|t| t.events_decoded == 1));
}

#[tokio::test]
async fn test_failures_stay_with_their_target() {
    let broken = Address::repeat_byte(0x21);
    let explorer_down = Address::repeat_byte(0x22);
    let healthy = Address::repeat_byte(0x23);
    let chain = MockChain::new()
        .with_broken_account(broken)
        .with_code(explorer_down)
        .with_code(healthy);
    let sources = MockSources::new()
        .with_failing(explorer_down)
        .with_source(healthy, "Pool", RISKY_SOURCE);

    let report = build(chain, sources, ScanConfig::default().with_concurrency(2))
        .run(&[
            ScanTarget::new("Broken", broken),
            ScanTarget::new("ExplorerDown", explorer_down),
            ScanTarget::new("Pool", healthy),
        ])
        .await;

    let names: Vec<&str> = report.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Broken", "ExplorerDown", "Pool"]);
    assert_eq!(report.targets[0].outcome(), Some(TargetState::Errored));
    assert_eq!(report.targets[1].outcome(), Some(TargetState::Errored));
    assert_eq!(report.targets[2].outcome(), Some(TargetState::Classified));
    assert!(report.targets.iter().all(|t| t.state() == TargetState::Done));

    let pool_patterns: Vec<Pattern> = report
        .findings
        .iter()
        .filter(|f| f.contract == "Pool")
        .map(|f| f.pattern)
        .collect();
    assert_eq!(
        pool_patterns,
        vec![
            Pattern::ProxyInitializationBypass,
            Pattern::FlashLoanReentrancy,
            Pattern::GovernanceManipulation,
            Pattern::AccessControlBypass,
            Pattern::StorageCollision,
        ]
    );
    assert_eq!(report.stats.contracts_analyzed, 3);
    assert_eq!(report.stats.critical_issues, 4);
    assert_eq!(report.stats.high_issues, 1);
    assert_eq!(report.count_severity(Severity::Info), 2);
}

#[tokio::test]
async fn test_every_target_failing_still_yields_a_report() {
    let a = Address::repeat_byte(0x31);
    let b = Address::repeat_byte(0x32);
    let chain = MockChain::new().with_broken_account(a).with_broken_account(b);

    let report = build(chain, MockSources::new(), ScanConfig::default())
        .run(&[ScanTarget::new("A", a), ScanTarget::new("B", b)])
        .await;

    assert_eq!(report.findings.len(), 2);
    assert!(report.findings.iter().all(|f| f.pattern == Pattern::ScanFailure));
    assert_eq!(report.stats.contracts_analyzed, 2);
    assert_eq!(report.stats.vulnerabilities_found, 0);
}

#[test]
fn test_missing_source_provider_aborts_before_scanning() {
    let result = ScanOrchestrator::builder()
        .chain_reader(Arc::new(MockChain::new()))
        .build();
    assert!(matches!(result, Err(ScannerError::Configuration(_))));
}

#[test]
fn test_invalid_log_scan_aborts_before_scanning() {
    let result = ScanOrchestrator::builder()
        .chain_reader(Arc::new(MockChain::new()))
        .source_provider(Arc::new(MockSources::new()))
        .config(ScanConfig::default().with_log_scan(LogScanConfig::new(50, 10)))
        .build();
    assert!(matches!(result, Err(ScannerError::Configuration(_))));
}

#[tokio::test]
async fn test_report_json_shape() {
    let proxy = Address::repeat_byte(0x41);
    let implementation = Address::repeat_byte(0x42);
    let chain = MockChain::new()
        .with_code(proxy)
        .with_code(implementation)
        .with_storage(proxy, *IMPLEMENTATION_SLOT, address_word(implementation));
    let sources = MockSources::new()
        .with_source(proxy, "Proxy", GUARDED_SOURCE)
        .with_source(implementation, "PoolImpl", RISKY_SOURCE);

    let report = build(chain, sources, ScanConfig::default())
        .run(&[ScanTarget::new("Pool", proxy)])
        .await;

    let sink = WriterSink::new(Vec::new());
    sink.persist(&report).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&sink.into_inner()).unwrap();

    assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());

    let patterns = json["patterns"].as_array().unwrap();
    assert_eq!(patterns.len(), 8);
    for entry in patterns {
        assert!(entry["pattern"].is_string());
        assert!(entry["name"].is_string());
        assert!(matches!(entry["severity"].as_str(), Some("CRITICAL") | Some("HIGH")));
        assert!(entry["findings"].is_u64());
        assert_eq!(entry["tests"].as_array().unwrap().len(), 2);
    }

    let init = &patterns[0];
    assert_eq!(init["pattern"], "proxy_initialization_bypass");
    assert_eq!(init["findings"], 1);
    assert_eq!(init["tests"][0]["contract"], "Pool");
    assert_eq!(init["tests"][0]["status"], "clear");
    assert_eq!(init["tests"][1]["contract"], "Pool (implementation)");
    assert_eq!(init["tests"][1]["status"], "flagged");

    let stats = &json["summaryStatistics"];
    assert_eq!(stats["contractsAnalyzed"], 1);
    assert_eq!(stats["criticalIssues"], 4);
    assert_eq!(stats["highIssues"], 1);
    assert_eq!(stats["vulnerabilitiesFound"], 5);

    let bypass = json["findings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["pattern"] == "proxy_initialization_bypass")
        .unwrap();
    assert_eq!(bypass["evidence"]["initializeCallable"], false);
    assert_eq!(bypass["evidence"]["implementationHasCode"], true);
    assert_eq!(
        json["targets"][0]["proxy"]["implementation"]["value"],
        format!("{:?}", implementation)
    );
}

#[tokio::test]
async fn test_shutdown_during_a_target_stops_its_remaining_requests() {
    let first = Address::repeat_byte(0x51);
    let second = Address::repeat_byte(0x52);
    let shutdown = ShutdownSignal::new();
    let chain = Arc::new(
        MockChain::new()
            .with_code(first)
            .with_code(second)
            .with_shutdown_on_code(shutdown.clone()),
    );
    let sources = Arc::new(
        MockSources::new()
            .with_source(first, "Pool", RISKY_SOURCE)
            .with_source(second, "Factory", GUARDED_SOURCE),
    );
    let orchestrator = ScanOrchestrator::builder()
        .chain_reader(chain.clone())
        .source_provider(sources.clone())
        .config(
            ScanConfig::default()
                .with_concurrency(1)
                .with_request_interval(Duration::ZERO)
                .with_log_scan(LogScanConfig::new(0, 63)),
        )
        .shutdown(shutdown)
        .build()
        .unwrap();

    let report = orchestrator
        .run(&[ScanTarget::new("Pool", first), ScanTarget::new("Factory", second)])
        .await;

    assert_eq!(chain.storage_reads() + sources.lookups(), 0);
    assert!(chain.log_queries().is_empty());

    assert_eq!(report.targets.len(), 1);
    assert_eq!(
        report.targets[0].history,
        vec![TargetState::Pending, TargetState::Errored, TargetState::Done]
    );
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].pattern, Pattern::ScanFailure);
    assert_eq!(report.stats.vulnerabilities_found, 0);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_target_times_out_while_others_finish() {
    let stuck = Address::repeat_byte(0x61);
    let pool = Address::repeat_byte(0x62);
    let factory = Address::repeat_byte(0x63);
    let chain = MockChain::new()
        .with_hanging_code(stuck)
        .with_code(pool)
        .with_code(factory);
    let sources = MockSources::new().with_source(pool, "Pool", RISKY_SOURCE);
    let config = ScanConfig::default().with_request_interval(Duration::ZERO);
    let rpc = RpcConfig {
        request_timeout: Duration::from_secs(2),
        max_retries: 1,
        min_retry_delay: Duration::from_millis(10),
    };
    let orchestrator = ScanOrchestrator::builder()
        .chain_reader(Arc::new(RobustChain::new(Arc::new(chain), rpc)))
        .source_provider(Arc::new(sources))
        .config(config)
        .build()
        .unwrap();
    let start = tokio::time::Instant::now();

    let report = orchestrator
        .run(&[
            ScanTarget::new("Stuck", stuck),
            ScanTarget::new("Pool", pool),
            ScanTarget::new("Factory", factory),
        ])
        .await;

    assert!(start.elapsed() >= Duration::from_secs(4));
    assert!(report.targets.iter().all(|t| t.state() == TargetState::Done));
    assert_eq!(report.targets[0].outcome(), Some(TargetState::Errored));
    assert!(report.targets[0].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(report.targets[1].outcome(), Some(TargetState::Classified));
    assert_eq!(report.targets[2].outcome(), Some(TargetState::Unverified));
    assert_eq!(report.stats.critical_issues, 4);
}
