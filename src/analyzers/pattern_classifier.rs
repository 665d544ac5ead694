use crate::models::{Finding, Pattern};

/// One heuristic: fires when a trigger marker is in the source and none of the guards are.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: Pattern,
    pub triggers: &'static [&'static str],
    pub guards: &'static [&'static str],
    /// Match triggers against the lower-cased source.
    pub fold_case: bool,
    pub risk: &'static str,
}

/// Substring markers per catalog pattern, in report order.
pub const RULES: [Rule; 8] = [
    Rule {
        pattern: Pattern::ProxyInitializationBypass,
        triggers: &["function initialize"],
        guards: &["initializer"],
        fold_case: true,
        risk: "initialize entry point without an initializer guard; proxy state may be re-initialized",
    },
    Rule {
        pattern: Pattern::FlashLoanReentrancy,
        triggers: &["flashLoan", "flashMint", "receiveFlashLoan", "onFlashLoan"],
        guards: &["nonReentrant", "ReentrancyGuard", "locked"],
        fold_case: false,
        risk: "flash loan callback without a reentrancy guard",
    },
    Rule {
        pattern: Pattern::OracleStaleness,
        triggers: &["latestRoundData", "latestPrice", "getPrice", "peek("],
        guards: &["updatedAt", "timestamp"],
        fold_case: false,
        risk: "oracle price consumed without a freshness check",
    },
    Rule {
        pattern: Pattern::FlashSwapSlippage,
        triggers: &["function swap", "function exchange", "function flashSwap"],
        guards: &["minAmountOut", "amountOutMin", "amountOutMinimum", "maxSlippage", "minReturn"],
        fold_case: false,
        risk: "swap entry point without a minimum-output or slippage bound",
    },
    Rule {
        pattern: Pattern::GovernanceManipulation,
        triggers: &[
            "setParameter",
            "updateConfig",
            "setFee",
            "setLimit",
            "proposeGovernance",
            "setALM",
            "setPoolManager",
        ],
        guards: &["onlyOwner", "onlyGovernance", "onlyPoolManager"],
        fold_case: false,
        risk: "parameter setter without an owner or governance modifier",
    },
    Rule {
        pattern: Pattern::AccessControlBypass,
        triggers: &[" external", " public"],
        guards: &[
            "require(msg.sender",
            "require(_msgSender()",
            "msg.sender ==",
            "msg.sender !=",
            "onlyRole",
            "onlyOwner",
            "onlyAdmin",
            "AccessControl",
        ],
        fold_case: false,
        risk: "externally reachable functions with no caller checks anywhere in the source",
    },
    Rule {
        pattern: Pattern::SignatureValidation,
        triggers: &["function permit", "executeMetaTx", "metaTransaction"],
        guards: &[
            "ecrecover",
            "ECDSA.recover",
            "SignatureChecker",
            "checkSignature",
            "verifySignature",
            "_domainSeparator",
        ],
        fold_case: false,
        risk: "signature-authorized entry point without visible signature recovery",
    },
    Rule {
        pattern: Pattern::StorageCollision,
        triggers: &["Upgradeable", "Initializable", "delegatecall", "UUPS"],
        guards: &["__gap"],
        fold_case: false,
        risk: "upgradeable layout without a storage gap",
    },
];

/// Heuristic source triage against the eight-pattern catalog.
///
/// Pure substring matching: no parsing, no proof. A hit means "look here",
/// a miss means nothing.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    rules: Vec<Rule>,
}

impl PatternClassifier {
    pub fn new() -> Self {
        Self { rules: RULES.to_vec() }
    }

    /// At most one finding per pattern, in catalog order. Empty source gives no findings.
    pub fn classify(&self, contract_name: &str, source_text: &str) -> Vec<Finding> {
        if source_text.trim().is_empty() {
            return Vec::new();
        }

        let folded = source_text.to_lowercase();
        self.rules
            .iter()
            .filter_map(|rule| {
                let haystack = if rule.fold_case { folded.as_str() } else { source_text };
                let matched: Vec<&str> = rule
                    .triggers
                    .iter()
                    .copied()
                    .filter(|marker| haystack.contains(marker))
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                if rule.guards.iter().any(|guard| source_text.contains(guard)) {
                    return None;
                }

                Some(
                    Finding::new(rule.pattern, contract_name, rule.risk).with_evidence(serde_json::json!({
                        "matched": matched,
                        "missingGuards": rule.guards,
                        "heuristic": true,
                    })),
                )
            })
            .collect()
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}
