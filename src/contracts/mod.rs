//! Well-known contract addresses used as default scan targets

use crate::models::ScanTarget;
use crate::utils::{Result, ScannerError};

/// Valantis deployments on Ethereum mainnet (Chain ID: 1)
pub mod addresses {
    /// Protocol factory that deploys pools and emits `PoolDeployed`
    pub const PROTOCOL_FACTORY: &str = "0x29939b3b2aD83882174a50DFD80a3B6329C4a603";

    /// Sovereign pool factory, emits `SovereignPoolDeployed`
    pub const SOVEREIGN_POOL_FACTORY: &str = "0xa68d6c59Cf3048292dc4EC1F76ED9DEf8b6F9617";

    /// stHYPE (proxy)
    pub const ST_HYPE: &str = "0xfFaa4a3D97fE9107Cef8a3F48c069F577Ff76cC1";

    /// OverseerV1 (implementation)
    pub const OVERSEER_V1: &str = "0xB96f07367e69e86d6e9C3F49215885104813eeAE";

    /// wstHYPE (proxy)
    pub const WST_HYPE: &str = "0x94e8396e0869c9F2200760aF0621aFd240E1CF38";

    pub const ALL: [(&str, &str); 5] = [
        ("ProtocolFactory", PROTOCOL_FACTORY),
        ("SovereignPoolFactory", SOVEREIGN_POOL_FACTORY),
        ("stHYPE", ST_HYPE),
        ("OverseerV1", OVERSEER_V1),
        ("wstHYPE", WST_HYPE),
    ];
}

/// Targets scanned when none are given on the command line.
pub fn default_targets() -> Result<Vec<ScanTarget>> {
    addresses::ALL
        .iter()
        .map(|(name, address)| {
            let address = address
                .parse()
                .map_err(|_| ScannerError::InvalidAddress(address.to_string()))?;
            Ok(ScanTarget::new(*name, address))
        })
        .collect()
}
