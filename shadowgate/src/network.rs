//! Settlement networks.
//!
//! Payment challenges name their network with the x402 v1 human-readable
//! name (`"base"`, `"ethereum"`, `"solana"`). Each network also knows its
//! CAIP-2 identifier and the canonical USDC deployment used as the default
//! asset when configuration does not name one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::UnknownNetwork;

/// Canonical USDC contract on Base mainnet.
pub const USDC_BASE: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";
/// Canonical USDC contract on Ethereum mainnet.
pub const USDC_ETHEREUM: &str = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48";
/// Canonical USDC mint on Solana mainnet.
pub const USDC_SOLANA: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// A network on which payments settle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNetwork {
    /// Base mainnet (`eip155:8453`).
    #[default]
    Base,
    /// Ethereum mainnet (`eip155:1`).
    Ethereum,
    /// Solana mainnet.
    Solana,
}

impl ChainNetwork {
    /// Every supported network.
    pub const ALL: [Self; 3] = [Self::Base, Self::Ethereum, Self::Solana];

    /// The x402 v1 network name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Ethereum => "ethereum",
            Self::Solana => "solana",
        }
    }

    /// The CAIP-2 chain identifier.
    #[must_use]
    pub const fn caip2(self) -> &'static str {
        match self {
            Self::Base => "eip155:8453",
            Self::Ethereum => "eip155:1",
            Self::Solana => "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        }
    }

    /// USDC asset identifier on this network.
    #[must_use]
    pub const fn usdc(self) -> &'static str {
        match self {
            Self::Base => USDC_BASE,
            Self::Ethereum => USDC_ETHEREUM,
            Self::Solana => USDC_SOLANA,
        }
    }
}

impl fmt::Display for ChainNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainNetwork {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s) || n.caip2() == s)
            .ok_or_else(|| UnknownNetwork(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_name_and_caip2() {
        assert_eq!("base".parse::<ChainNetwork>().unwrap(), ChainNetwork::Base);
        assert_eq!("Solana".parse::<ChainNetwork>().unwrap(), ChainNetwork::Solana);
        assert_eq!(
            "eip155:1".parse::<ChainNetwork>().unwrap(),
            ChainNetwork::Ethereum
        );
        assert!("polygon".parse::<ChainNetwork>().is_err());
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&ChainNetwork::Ethereum).unwrap();
        assert_eq!(json, "\"ethereum\"");
    }
}
