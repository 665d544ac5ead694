use ethers::types::Address;
use serde::Serialize;

use super::contract::canonical_address;
use super::finding::{Finding, Pattern, Severity};
use super::pool::{PoolRecord, PoolSet};
use super::proxy::ProxyInfo;
use crate::core::TargetState;
use crate::scanning::BlockRange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub contracts_analyzed: usize,
    /// CRITICAL + HIGH findings.
    pub vulnerabilities_found: usize,
    pub critical_issues: usize,
    pub high_issues: usize,
}

/// Per-target bookkeeping carried into the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSummary {
    pub name: String,
    #[serde(serialize_with = "serialize_address")]
    pub address: Address,
    /// Every state the target passed through, starting at `Pending`.
    pub history: Vec<TargetState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyInfo>,
    /// Whether the account behind the implementation slot holds code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation_has_code: Option<bool>,
    /// `owner()` of the target, when it answers one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler_version: Option<String>,
    /// Contracts whose source went through the classifier (target and/or implementation).
    pub classified: Vec<String>,
    pub events_decoded: usize,
    pub events_skipped: usize,
    pub upgrades_observed: usize,
    pub failed_ranges: Vec<BlockRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetSummary {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            history: vec![TargetState::Pending],
            proxy: None,
            implementation_has_code: None,
            owner: None,
            compiler_version: None,
            classified: Vec::new(),
            events_decoded: 0,
            events_skipped: 0,
            upgrades_observed: 0,
            failed_ranges: Vec::new(),
            error: None,
        }
    }

    pub fn state(&self) -> TargetState {
        self.history.last().copied().unwrap_or(TargetState::Pending)
    }

    /// Classified, unverified or errored, once reached.
    pub fn outcome(&self) -> Option<TargetState> {
        self.history.iter().copied().find(|state| state.is_outcome())
    }

    /// Move forward; refuses (and returns false) anything the state machine forbids.
    pub fn advance(&mut self, next: TargetState) -> bool {
        if self.state().can_transition(next) {
            self.history.push(next);
            true
        } else {
            false
        }
    }
}

/// Everything produced for a single target; handed back to the orchestrator to append.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub summary: TargetSummary,
    pub findings: Vec<Finding>,
    pub pools: PoolSet,
}

/// Write-once output of a scan. Only the orchestrator appends to it.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub timestamp: String,
    pub findings: Vec<Finding>,
    pub targets: Vec<TargetSummary>,
    pub pools: PoolSet,
    pub stats: ScanStats,
}

impl ScanReport {
    pub fn new() -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            findings: Vec::new(),
            targets: Vec::new(),
            pools: PoolSet::new(),
            stats: ScanStats::default(),
        }
    }

    pub(crate) fn record(&mut self, outcome: TargetOutcome) {
        self.findings.extend(outcome.findings);
        self.pools.merge(outcome.pools);
        self.targets.push(outcome.summary);
    }

    pub(crate) fn finalize(&mut self) {
        let critical_issues = self.count_severity(Severity::Critical);
        let high_issues = self.count_severity(Severity::High);
        self.stats = ScanStats {
            contracts_analyzed: self.targets.len(),
            vulnerabilities_found: self.findings.iter().filter(|f| f.is_vulnerability()).count(),
            critical_issues,
            high_issues,
        };
    }

    pub fn total_findings(&self) -> usize {
        self.findings.len()
    }

    pub fn count_severity(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn findings_for(&self, pattern: Pattern) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.pattern == pattern)
    }

    /// External JSON shape of the report.
    pub fn document(&self) -> ReportDocument<'_> {
        let patterns = Pattern::CATALOG
            .iter()
            .map(|pattern| self.pattern_summary(*pattern))
            .collect();

        ReportDocument {
            timestamp: &self.timestamp,
            patterns,
            summary_statistics: self.stats,
            findings: &self.findings,
            targets: &self.targets,
            pools: self.pools.iter().collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.document())
    }

    fn pattern_summary(&self, pattern: Pattern) -> PatternSummary {
        let mut tests = Vec::new();
        for target in &self.targets {
            for contract in &target.classified {
                let hit = self
                    .findings
                    .iter()
                    .find(|f| f.pattern == pattern && &f.contract == contract);
                tests.push(PatternTest {
                    contract: contract.clone(),
                    address: canonical_address(&target.address),
                    status: if hit.is_some() { "flagged" } else { "clear" },
                    risk: hit.map(|f| f.risk.clone()),
                });
            }
        }

        PatternSummary {
            pattern: pattern.key(),
            name: pattern.name(),
            severity: pattern.severity().label(),
            findings: self.findings_for(pattern).count(),
            tests,
        }
    }
}

impl Default for ScanReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument<'a> {
    pub timestamp: &'a str,
    pub patterns: Vec<PatternSummary>,
    pub summary_statistics: ScanStats,
    pub findings: &'a [Finding],
    pub targets: &'a [TargetSummary],
    pub pools: Vec<&'a PoolRecord>,
}

#[derive(Debug, Serialize)]
pub struct PatternSummary {
    pub pattern: &'static str,
    pub name: &'static str,
    pub severity: &'static str,
    pub findings: usize,
    pub tests: Vec<PatternTest>,
}

#[derive(Debug, Serialize)]
pub struct PatternTest {
    pub contract: String,
    pub address: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
}

fn serialize_address<S: serde::Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&canonical_address(address))
}

impl std::fmt::Display for ScanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        writeln!(f, "              VULNERABILITY PATTERN SCAN")?;
        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        writeln!(f, "Timestamp: {}", self.timestamp)?;
        writeln!(f)?;
        writeln!(f, "Contracts analyzed: {}", self.stats.contracts_analyzed)?;
        writeln!(f, "Critical issues:    {}", self.stats.critical_issues)?;
        writeln!(f, "High issues:        {}", self.stats.high_issues)?;
        writeln!(f, "Total findings:     {}", self.total_findings())?;
        writeln!(f, "Pools discovered:   {}", self.pools.len())?;

        if !self.findings.is_empty() {
            writeln!(f)?;
            writeln!(f, "═══ FINDINGS ═══")?;

            let mut sorted = self.findings.clone();
            sorted.sort_by(|a, b| b.severity.cmp(&a.severity));

            for finding in &sorted {
                writeln!(
                    f,
                    "{} [{}] {}: {}",
                    finding.severity.emoji(),
                    finding.pattern.name(),
                    finding.contract,
                    finding.risk
                )?;
            }
        }

        writeln!(f, "═══════════════════════════════════════════════════════════")?;
        Ok(())
    }
}
