use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    High,
    Critical,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Info => "INFO",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🔴",
            Severity::High => "🟠",
            Severity::Info => "ℹ️",
        }
    }
}

/// The eight catalog vulnerability classes plus the bookkeeping entries the
/// orchestrator records when a target cannot be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    ProxyInitializationBypass,
    FlashLoanReentrancy,
    OracleStaleness,
    FlashSwapSlippage,
    GovernanceManipulation,
    #[serde(rename = "access_control")]
    AccessControlBypass,
    SignatureValidation,
    StorageCollision,
    Unverified,
    ScanFailure,
}

impl Pattern {
    /// Catalog patterns in report order.
    pub const CATALOG: [Pattern; 8] = [
        Pattern::ProxyInitializationBypass,
        Pattern::FlashLoanReentrancy,
        Pattern::OracleStaleness,
        Pattern::FlashSwapSlippage,
        Pattern::GovernanceManipulation,
        Pattern::AccessControlBypass,
        Pattern::SignatureValidation,
        Pattern::StorageCollision,
    ];

    /// Machine key used in the JSON report.
    pub fn key(&self) -> &'static str {
        match self {
            Pattern::ProxyInitializationBypass => "proxy_initialization_bypass",
            Pattern::FlashLoanReentrancy => "flash_loan_reentrancy",
            Pattern::OracleStaleness => "oracle_staleness",
            Pattern::FlashSwapSlippage => "flash_swap_slippage",
            Pattern::GovernanceManipulation => "governance_manipulation",
            Pattern::AccessControlBypass => "access_control",
            Pattern::SignatureValidation => "signature_validation",
            Pattern::StorageCollision => "storage_collision",
            Pattern::Unverified => "unverified",
            Pattern::ScanFailure => "scan_failure",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Pattern::ProxyInitializationBypass => "Proxy Initialization Bypass",
            Pattern::FlashLoanReentrancy => "Flash Loan Reentrancy",
            Pattern::OracleStaleness => "Oracle Staleness Exploitation",
            Pattern::FlashSwapSlippage => "Flash Swap Slippage Bypass",
            Pattern::GovernanceManipulation => "Governance Manipulation",
            Pattern::AccessControlBypass => "Access Control Bypass",
            Pattern::SignatureValidation => "Signature Validation Flaws",
            Pattern::StorageCollision => "Storage Collision Vulnerabilities",
            Pattern::Unverified => "Unverified Source",
            Pattern::ScanFailure => "Scan Failure",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Pattern::ProxyInitializationBypass
            | Pattern::FlashLoanReentrancy
            | Pattern::GovernanceManipulation
            | Pattern::AccessControlBypass => Severity::Critical,
            Pattern::OracleStaleness
            | Pattern::FlashSwapSlippage
            | Pattern::SignatureValidation
            | Pattern::StorageCollision => Severity::High,
            Pattern::Unverified | Pattern::ScanFailure => Severity::Info,
        }
    }

    pub fn is_catalog(&self) -> bool {
        !matches!(self, Pattern::Unverified | Pattern::ScanFailure)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub pattern: Pattern,
    pub severity: Severity,
    /// Contract the finding is attributed to (target name, or "<name> (implementation)").
    pub contract: String,
    pub risk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence: Option<serde_json::Value>,
}

impl Finding {
    /// Finding for a catalog pattern; severity comes from the catalog.
    pub fn new(pattern: Pattern, contract: impl Into<String>, risk: impl Into<String>) -> Self {
        Self {
            pattern,
            severity: pattern.severity(),
            contract: contract.into(),
            risk: risk.into(),
            evidence: None,
        }
    }

    pub fn unverified(contract: impl Into<String>) -> Self {
        Self::new(
            Pattern::Unverified,
            contract,
            "No verified source available; heuristic classification skipped",
        )
    }

    pub fn scan_failure(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(Pattern::ScanFailure, contract, reason)
    }

    pub fn with_evidence(mut self, evidence: serde_json::Value) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub fn is_vulnerability(&self) -> bool {
        matches!(self.severity, Severity::Critical | Severity::High)
    }
}
