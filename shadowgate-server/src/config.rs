//! Server configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3000
//! base_url = "https://api.shadowgate.example"
//!
//! [payments]
//! network = "base"
//! pay_to = "$PAY_TO_ADDRESS"
//! verification = "facilitator"
//! facilitator_url = "https://facilitator.x402.rs"
//! verify_timeout_secs = 15
//!
//! [pricing]
//! post-bounty = "$0.30"
//! list-bounties = 10000
//!
//! [node]
//! mode = "exit"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `config.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Anything referenced by `$VAR` in the config file

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shadowgate::amount::USDC_DECIMALS;
use shadowgate::price::DEFAULT_MAX_TIMEOUT_SECONDS;
use shadowgate::{AmountError, ChainNetwork, MinorUnits, VerificationPolicy};
use shadowgate_http::constants::DEFAULT_FACILITATOR_URL;
use url::Url;

/// Default `payTo` on EVM networks.
pub const DEFAULT_EVM_PAY_TO: &str = "0x11c24Fbcd702cd611729F8402d8fB51ECa75Ba83";
/// Default `payTo` on Solana.
pub const DEFAULT_SOLANA_PAY_TO: &str = "2x4BRUreTFZCaCKbGKVXFYD5p2ZUBpYaYjuYsw9KYhf3";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration TOML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `3000`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL used in challenge `resource` fields. When unset the
    /// URL is rebuilt from `Host` and `X-Forwarded-Proto`.
    #[serde(default)]
    pub base_url: Option<Url>,

    /// Payment settings shared by every operation.
    #[serde(default)]
    pub payments: PaymentsConfig,

    /// Price overrides keyed by operation key.
    #[serde(default)]
    pub pricing: BTreeMap<String, PriceSetting>,

    /// Identity of this node.
    #[serde(default)]
    pub node: NodeConfig,

    /// Whether to seed the demo proxy nodes at startup.
    #[serde(default = "default_true")]
    pub seed_demo_nodes: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
            payments: PaymentsConfig::default(),
            pricing: BTreeMap::new(),
            node: NodeConfig::default(),
            seed_demo_nodes: true,
        }
    }
}

/// Where payments go and how they are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Settlement network.
    pub network: ChainNetwork,
    /// Recipient address; defaults per network family.
    pub pay_to: Option<String>,
    /// Asset id; defaults to the network's USDC.
    pub asset: Option<String>,
    /// Payment window advertised in challenges.
    pub max_timeout_seconds: u64,
    /// Verification strategy.
    pub verification: VerificationPolicy,
    /// Facilitator base URL, used when `verification = "facilitator"`.
    pub facilitator_url: String,
    /// Upper bound on a single verification, in seconds.
    pub verify_timeout_secs: Option<u64>,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            network: ChainNetwork::default(),
            pay_to: None,
            asset: None,
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            verification: VerificationPolicy::default(),
            facilitator_url: DEFAULT_FACILITATOR_URL.to_owned(),
            verify_timeout_secs: None,
        }
    }
}

impl PaymentsConfig {
    /// The configured recipient, or the default for the network.
    #[must_use]
    pub fn pay_to(&self) -> &str {
        match (&self.pay_to, self.network) {
            (Some(address), _) => address,
            (None, ChainNetwork::Solana) => DEFAULT_SOLANA_PAY_TO,
            (None, ChainNetwork::Base | ChainNetwork::Ethereum) => DEFAULT_EVM_PAY_TO,
        }
    }

    /// The configured asset, or the network's USDC.
    #[must_use]
    pub fn asset(&self) -> &str {
        self.asset.as_deref().unwrap_or_else(|| self.network.usdc())
    }

    /// The verification cap, if configured.
    #[must_use]
    pub fn verify_timeout(&self) -> Option<Duration> {
        self.verify_timeout_secs.map(Duration::from_secs)
    }
}

/// A price override: an integer in minor units, or a money string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceSetting {
    /// `250000`
    MinorUnits(u64),
    /// `"$0.25"` or `"0.25"`
    Money(String),
}

impl PriceSetting {
    /// The amount in USDC minor units.
    ///
    /// # Errors
    ///
    /// [`AmountError`] if a money string is malformed or too precise.
    pub fn to_minor_units(&self) -> Result<MinorUnits, AmountError> {
        match self {
            Self::MinorUnits(units) => Ok(MinorUnits::new(*units)),
            Self::Money(money) => MinorUnits::from_money(money, USDC_DECIMALS),
        }
    }
}

/// Role this node plays in the proxy network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Relays and exits.
    #[default]
    Full,
    /// Relays only.
    Relay,
    /// Exit only.
    Exit,
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::Relay => "relay",
            Self::Exit => "exit",
        })
    }
}

/// Node identity settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node role.
    pub mode: NodeMode,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    3000
}

const fn default_true() -> bool {
    true
}

impl ServiceConfig {
    /// Loads configuration from `path`. A missing file yields the defaults.
    ///
    /// After loading, all `$VAR` / `${VAR}` references are expanded from the
    /// process environment. `HOST` and `PORT` override the file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = if path.exists() {
            std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?
        } else {
            String::new()
        };

        let mut config = Self::from_toml(&content, |name| std::env::var(name).ok())?;

        if let Some(host) = std::env::var("HOST").ok().and_then(|h| h.parse().ok()) {
            config.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.port = port;
        }

        Ok(config)
    }

    /// Parses TOML after expanding variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = expand_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }

        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        match lookup(&name) {
            Some(value) if !name.is_empty() => result.push_str(&value),
            _ => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(name: &str) -> Option<String> {
        match name {
            "PAY_TO" => Some("0xfeed".into()),
            "PRICE" => Some("$0.30".into()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_vars() {
        assert_eq!(expand_vars("a=$PAY_TO;", env), "a=0xfeed;");
        assert_eq!(expand_vars("a=${PAY_TO}b", env), "a=0xfeedb");
        assert_eq!(expand_vars("a=$MISSING", env), "a=$MISSING");
        assert_eq!(expand_vars("a=${MISSING}", env), "a=${MISSING}");
        assert_eq!(expand_vars("cost $ 5", env), "cost $ 5");
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = ServiceConfig::from_toml("", env).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(config.base_url.is_none());
        assert!(config.seed_demo_nodes);
        assert_eq!(config.payments.network, ChainNetwork::Base);
        assert_eq!(config.payments.pay_to(), DEFAULT_EVM_PAY_TO);
        assert_eq!(config.payments.asset(), ChainNetwork::Base.usdc());
        assert_eq!(config.payments.verification, VerificationPolicy::PresenceOnly);
        assert_eq!(config.node.mode, NodeMode::Full);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
            port = 8080
            base_url = "https://api.example"
            seed_demo_nodes = false

            [payments]
            network = "solana"
            pay_to = "$PAY_TO"
            verification = "facilitator"
            verify_timeout_secs = 5

            [pricing]
            post-bounty = "${PRICE}"
            list-bounties = 10000

            [node]
            mode = "exit"
        "#;
        let config = ServiceConfig::from_toml(content, env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url.unwrap().as_str(), "https://api.example/");
        assert!(!config.seed_demo_nodes);
        assert_eq!(config.payments.pay_to(), "0xfeed");
        assert_eq!(config.payments.asset(), ChainNetwork::Solana.usdc());
        assert_eq!(config.payments.verification, VerificationPolicy::Facilitator);
        assert_eq!(config.payments.verify_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.node.mode, NodeMode::Exit);
        assert_eq!(
            config.pricing["post-bounty"].to_minor_units().unwrap(),
            MinorUnits::new(300_000)
        );
        assert_eq!(
            config.pricing["list-bounties"].to_minor_units().unwrap(),
            MinorUnits::new(10_000)
        );
    }

    #[test]
    fn test_solana_default_pay_to() {
        let config = ServiceConfig::from_toml("[payments]\nnetwork = \"solana\"", env).unwrap();
        assert_eq!(config.payments.pay_to(), DEFAULT_SOLANA_PAY_TO);
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            ServiceConfig::from_toml("port = \"high\"", env),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_too_precise_price() {
        let setting = PriceSetting::Money("$0.0000001".into());
        assert!(setting.to_minor_units().is_err());
    }
}
