//! The ten operations the server sells.
//!
//! Each submodule turns a [`PriceEntry`] and the shared [`Services`] into a
//! registry [`Operation`]: input and output contracts plus a handler that
//! runs against the ledger. [`CATALOG`] holds the default price and
//! description of every key.
//!
//! | key                   | default | module       |
//! |-----------------------|---------|--------------|
//! | `start-proxy-stream`  | $0.05   | [`proxy`]    |
//! | `node-status`         | $0.02   | [`proxy`]    |
//! | `create-dead-drop`    | $0.10   | [`drops`]    |
//! | `purchase-dead-drop`  | $0.15   | [`drops`]    |
//! | `list-dead-drops`     | $0.02   | [`drops`]    |
//! | `post-bounty`         | $0.25   | [`bounties`] |
//! | `submit-bounty-proof` | $0.05   | [`bounties`] |
//! | `list-bounties`       | $0.02   | [`bounties`] |
//! | `ai-deck-query`       | $0.10   | [`deck`]     |
//! | `system-info`         | free    | [`system`]   |

pub mod bounties;
pub mod deck;
pub mod drops;
pub mod proxy;
pub mod system;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use shadowgate::amount::USDC_DECIMALS;
use shadowgate::{
    ChainNetwork, MinorUnits, OperationError, OperationResult, PriceEntry, PriceTable,
    UnknownOperation,
};
use shadowgate_http::server::{Operation, OperationContext};

use crate::config::NodeMode;
use crate::engine::QueryEngine;
use crate::ledger::Ledger;

/// Default price and description of one operation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Operation key.
    pub key: &'static str,
    /// Default price in USDC minor units.
    pub amount: u64,
    /// Description shown in challenges and the manifest.
    pub description: &'static str,
}

/// Every operation key with its default price.
pub const CATALOG: [CatalogEntry; 10] = [
    CatalogEntry {
        key: proxy::START_PROXY_STREAM,
        amount: 50_000,
        description: "Start an anonymous proxy streaming session",
    },
    CatalogEntry {
        key: drops::CREATE_DEAD_DROP,
        amount: 100_000,
        description: "Create an encrypted dead drop",
    },
    CatalogEntry {
        key: drops::PURCHASE_DEAD_DROP,
        amount: 150_000,
        description: "Purchase an encrypted dead drop",
    },
    CatalogEntry {
        key: drops::LIST_DEAD_DROPS,
        amount: 20_000,
        description: "List available dead drops",
    },
    CatalogEntry {
        key: bounties::POST_BOUNTY,
        amount: 250_000,
        description: "Post a hacking bounty",
    },
    CatalogEntry {
        key: bounties::SUBMIT_BOUNTY_PROOF,
        amount: 50_000,
        description: "Submit proof for a bounty",
    },
    CatalogEntry {
        key: bounties::LIST_BOUNTIES,
        amount: 20_000,
        description: "List available bounties",
    },
    CatalogEntry {
        key: deck::AI_DECK_QUERY,
        amount: 100_000,
        description: "Consult an AI deck assistant",
    },
    CatalogEntry {
        key: proxy::NODE_STATUS,
        amount: 20_000,
        description: "Check proxy node status",
    },
    CatalogEntry {
        key: system::SYSTEM_INFO,
        amount: 0,
        description: "Get system information",
    },
];

/// Collaborators shared by every handler.
pub struct Services {
    /// Entity storage.
    pub ledger: Arc<dyn Ledger>,
    /// AI deck backend.
    pub engine: Arc<dyn QueryEngine>,
    /// The price table in force, for `system-info`.
    pub prices: Arc<PriceTable>,
    /// Settlement network.
    pub network: ChainNetwork,
    /// Role of this node.
    pub node_mode: NodeMode,
    /// Process start, for uptime.
    pub started_at: Instant,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("prices", &self.prices)
            .field("network", &self.network)
            .field("node_mode", &self.node_mode)
            .finish_non_exhaustive()
    }
}

/// Builds every operation in [`CATALOG`] at the price `prices` gives it.
///
/// # Errors
///
/// [`UnknownOperation`] if `prices` lacks a catalog key.
pub fn all(services: &Arc<Services>) -> Result<Vec<Operation>, UnknownOperation> {
    let price = |key: &str| services.prices.lookup(key).cloned();
    Ok(vec![
        proxy::start_proxy_stream(price(proxy::START_PROXY_STREAM)?, services),
        proxy::node_status(price(proxy::NODE_STATUS)?, services),
        drops::create_dead_drop(price(drops::CREATE_DEAD_DROP)?, services),
        drops::purchase_dead_drop(price(drops::PURCHASE_DEAD_DROP)?, services),
        drops::list_dead_drops(price(drops::LIST_DEAD_DROPS)?, services),
        bounties::post_bounty(price(bounties::POST_BOUNTY)?, services),
        bounties::submit_bounty_proof(price(bounties::SUBMIT_BOUNTY_PROOF)?, services),
        bounties::list_bounties(price(bounties::LIST_BOUNTIES)?, services),
        deck::ai_deck_query(price(deck::AI_DECK_QUERY)?, services),
        system::system_info(price(system::SYSTEM_INFO)?, services),
    ])
}

/// An operation whose handler does not suspend.
fn immediate<F>(price: PriceEntry, services: &Arc<Services>, run: F) -> Operation
where
    F: Fn(&Services, &OperationContext) -> Result<OperationResult, OperationError>
        + Send
        + Sync
        + 'static,
{
    let services = Arc::clone(services);
    Operation::new(price, move |ctx| std::future::ready(run(&services, &ctx)))
}

/// A positive number of hours from the input, or `default`.
fn hours_field(ctx: &OperationContext, name: &str, default: f64) -> Result<Duration, OperationError> {
    seconds(ctx, name, default, 3600.0)
}

/// A positive number of seconds from the input, or `default`.
fn seconds_field(
    ctx: &OperationContext,
    name: &str,
    default: f64,
) -> Result<Duration, OperationError> {
    seconds(ctx, name, default, 1.0)
}

fn seconds(
    ctx: &OperationContext,
    name: &str,
    default: f64,
    scale: f64,
) -> Result<Duration, OperationError> {
    let value = ctx.f64_field(name).unwrap_or(default);
    Duration::try_from_secs_f64(value * scale)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| OperationError::InvalidState(format!("`{name}` must be positive")))
}

/// A dollar amount from the input, or `default`, in USDC minor units.
fn money_field(
    ctx: &OperationContext,
    name: &str,
    default: MinorUnits,
) -> Result<MinorUnits, OperationError> {
    match ctx.input.get(name).and_then(Value::as_f64) {
        None => Ok(default),
        Some(dollars) => MinorUnits::from_money(&dollars.to_string(), USDC_DECIMALS)
            .map_err(|err| OperationError::InvalidState(format!("invalid `{name}`: {err}"))),
    }
}

/// Renders minor units as `"$0.25"`.
fn money(amount: MinorUnits) -> String {
    amount.to_money(USDC_DECIMALS)
}

/// A page size from the input, or `default`, capped at `max`.
fn limit_field(ctx: &OperationContext, default: usize, max: usize) -> usize {
    ctx.u64_field("limit")
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
        .min(max)
}

/// The identity to record: `field` from the input, else the payer.
fn identity(ctx: &OperationContext, field: &str) -> String {
    ctx.str_field(field)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ctx.payer_or_anon())
        .to_owned()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the operation tests.

    use std::sync::Arc;
    use std::time::Instant;

    use axum::http::{HeaderMap, HeaderValue, Method, Uri};
    use serde_json::Value;
    use shadowgate::{ChainNetwork, MinorUnits, PriceEntry, PriceTable};
    use shadowgate_http::server::{
        DispatchError, Dispatched, OperationRegistry, OperationRequest, Paygate,
    };

    use super::{CATALOG, Services, all};
    use crate::config::NodeMode;
    use crate::engine::CannedEngine;
    use crate::ledger::MemoryLedger;

    pub(crate) struct Harness {
        pub ledger: Arc<MemoryLedger>,
        pub registry: OperationRegistry,
    }

    pub(crate) fn harness() -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let prices = PriceTable::try_from_entries(CATALOG.iter().map(|entry| {
            PriceEntry::new(
                entry.key,
                MinorUnits::new(entry.amount),
                ChainNetwork::Base,
                "0xPAYEE",
            )
            .with_description(entry.description)
        }))
        .unwrap();
        let services = Arc::new(Services {
            ledger: Arc::clone(&ledger) as _,
            engine: Arc::new(CannedEngine),
            prices: Arc::new(prices),
            network: ChainNetwork::Base,
            node_mode: NodeMode::Full,
            started_at: Instant::now(),
        });
        let mut registry = OperationRegistry::new(Paygate::default());
        for operation in all(&services).unwrap() {
            registry.register(operation).unwrap();
        }
        Harness { ledger, registry }
    }

    impl Harness {
        /// Dispatches a paid POST and returns the output.
        pub(crate) async fn call(&self, key: &str, body: Value) -> Result<Value, DispatchError> {
            let mut headers = HeaderMap::new();
            headers.insert("x-payment-proof", HeaderValue::from_static("0xproof"));
            headers.insert("x-payment-payer", HeaderValue::from_static("0xpayer"));
            let request = OperationRequest::new(Method::POST, Uri::from_static("/service/x"))
                .with_headers(headers)
                .with_body(body);
            match self.registry.dispatch(key, request).await? {
                Dispatched::Completed { result, .. } => Ok(result.output),
                Dispatched::Challenged(challenge) => panic!("unexpected challenge: {challenge:?}"),
            }
        }
    }
}
