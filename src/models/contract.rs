use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::utils::{Result, ScannerError};

/// A contract to analyze, as given to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub name: String,
    pub address: Address,
}

impl ScanTarget {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }

    /// Parse `Name=0x...` as accepted on the command line.
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, address) = spec
            .split_once('=')
            .ok_or_else(|| ScannerError::InvalidAddress(format!("expected NAME=ADDRESS, got {spec}")))?;
        let address: Address = address
            .trim()
            .parse()
            .map_err(|_| ScannerError::InvalidAddress(address.to_string()))?;
        Ok(Self::new(name.trim(), address))
    }

    pub fn address_hex(&self) -> String {
        canonical_address(&self.address)
    }
}

/// Lower-case, full-width hex form used for every address we emit.
pub fn canonical_address(address: &Address) -> String {
    format!("{:?}", address)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSource {
    pub contract_name: String,
    pub compiler_version: String,
    pub source_text: String,
}

/// Outcome of a source lookup. `NotVerified` is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLookup {
    Verified(VerifiedSource),
    NotVerified,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        let target = ScanTarget::parse("ProtocolFactory=0x29939b3b2aD83882174a50DFD80a3B6329C4a603").unwrap();
        assert_eq!(target.name, "ProtocolFactory");
        assert_eq!(target.address_hex(), "0x29939b3b2ad83882174a50dfd80a3b6329c4a603");
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert!(ScanTarget::parse("no-separator").is_err());
        assert!(ScanTarget::parse("Name=0x1234").is_err());
    }
}
