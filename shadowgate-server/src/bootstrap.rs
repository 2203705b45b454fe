//! Wires configuration into a running service.
//!
//! [`app`] builds the whole router from a [`ServiceConfig`]: the price table,
//! the verifier behind the gate, the in-memory ledger and the operation
//! registry. The pieces are public so tests and embedders can swap one of
//! them out.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use shadowgate::timestamp::EpochMillis;
use shadowgate::{
    MinorUnits, PaymentVerifier, PresenceOnly, PriceEntry, PriceTable, VerificationPolicy,
};
use shadowgate_http::server::{FacilitatorClient, OperationRegistry, Paygate, operation_routes};

use crate::config::ServiceConfig;
use crate::engine::{CannedEngine, QueryEngine};
use crate::error::BootstrapError;
use crate::handlers::{ManifestState, manifest_routes};
use crate::ledger::{Ledger, MemoryLedger, ProxyNetwork, ProxyNode};
use crate::operations::{self, CATALOG, Services};

/// The catalog priced for `config`: defaults overridden by `[pricing]`.
///
/// # Errors
///
/// [`BootstrapError::UnknownPricingKey`] when `[pricing]` names a key the
/// catalog lacks, [`BootstrapError::InvalidPrice`] when an override does not
/// parse, [`BootstrapError::Price`] when the table is rejected.
pub fn price_table(config: &ServiceConfig) -> Result<PriceTable, BootstrapError> {
    if let Some(unknown) = config
        .pricing
        .keys()
        .find(|key| !CATALOG.iter().any(|entry| entry.key == key.as_str()))
    {
        return Err(BootstrapError::UnknownPricingKey(unknown.clone()));
    }

    let payments = &config.payments;
    let mut entries = Vec::with_capacity(CATALOG.len());
    for entry in &CATALOG {
        let amount = match config.pricing.get(entry.key) {
            Some(setting) => setting
                .to_minor_units()
                .map_err(|source| BootstrapError::InvalidPrice {
                    key: entry.key.to_owned(),
                    source,
                })?,
            None => MinorUnits::new(entry.amount),
        };
        entries.push(
            PriceEntry::new(entry.key, amount, payments.network, payments.pay_to())
                .with_asset(payments.asset())
                .with_description(entry.description)
                .with_max_timeout_seconds(payments.max_timeout_seconds),
        );
    }
    Ok(PriceTable::try_from_entries(entries)?)
}

/// The verifier selected by `payments.verification`.
///
/// # Errors
///
/// [`BootstrapError::Facilitator`] when the facilitator URL is unusable.
pub fn verifier(config: &ServiceConfig) -> Result<Arc<dyn PaymentVerifier>, BootstrapError> {
    let payments = &config.payments;
    match payments.verification {
        VerificationPolicy::PresenceOnly => {
            tracing::warn!("payment proofs are accepted on presence alone");
            Ok(Arc::new(PresenceOnly))
        }
        VerificationPolicy::Facilitator => {
            let mut client = FacilitatorClient::try_from(payments.facilitator_url.as_str())?;
            if let Some(timeout) = payments.verify_timeout() {
                client = client.with_timeout(timeout);
            }
            tracing::info!(url = %client.base_url(), "verifying payments through facilitator");
            Ok(Arc::new(client))
        }
    }
}

/// The gate in front of every operation.
///
/// # Errors
///
/// See [`verifier`].
pub fn paygate(config: &ServiceConfig) -> Result<Paygate, BootstrapError> {
    let mut gate = Paygate::new(verifier(config)?);
    if let Some(base_url) = &config.base_url {
        gate = gate.with_base_url(base_url.clone());
    }
    if let Some(cap) = config.payments.verify_timeout() {
        gate = gate.with_verify_timeout(cap);
    }
    Ok(gate)
}

/// Registers every catalog operation behind `gate`.
///
/// # Errors
///
/// [`BootstrapError::Unpriced`] if the price table lacks a catalog key,
/// [`BootstrapError::Duplicate`] if two operations share a key.
pub fn build_registry(
    gate: Paygate,
    services: &Arc<Services>,
) -> Result<OperationRegistry, BootstrapError> {
    let mut registry = OperationRegistry::new(gate);
    for operation in operations::all(services)? {
        registry.register(operation)?;
    }
    Ok(registry)
}

/// Inserts the four demo proxy nodes.
pub fn seed_demo_nodes(ledger: &dyn Ledger) {
    let now = EpochMillis::now();
    let node = |id: &str,
                address: &str,
                network: ProxyNetwork,
                reputation: f64,
                total_bytes: u64,
                total_sessions: u64,
                earnings: f64,
                region: &str,
                capability: &str| ProxyNode {
        id: id.to_owned(),
        address: address.to_owned(),
        network,
        reputation,
        total_bytes,
        total_sessions,
        earnings,
        region: Some(region.to_owned()),
        capabilities: vec![capability.to_owned()],
        last_seen: now,
    };

    for seed in [
        node(
            "tor-exit-nl-001",
            "tor://nlexitnode001.onion",
            ProxyNetwork::Tor,
            0.95,
            15_000_000_000,
            1250,
            125.5,
            "Netherlands",
            "streaming",
        ),
        node(
            "tor-exit-de-042",
            "tor://deexitnode042.onion",
            ProxyNetwork::Tor,
            0.88,
            8_500_000_000,
            820,
            89.3,
            "Germany",
            "streaming",
        ),
        node(
            "i2p-relay-jp-007",
            "i2p://jprelay007.i2p",
            ProxyNetwork::I2p,
            0.92,
            12_000_000_000,
            950,
            105.8,
            "Japan",
            "streaming",
        ),
        node(
            "tor-guard-us-123",
            "tor://usguardnode123.onion",
            ProxyNetwork::Tor,
            0.78,
            5_200_000_000,
            450,
            52.1,
            "United States",
            "guard",
        ),
    ] {
        ledger.upsert_node(seed);
    }
}

/// The full service router for `config`, backed by a fresh in-memory
/// ledger and the canned query engine.
///
/// # Errors
///
/// [`BootstrapError`] when the configuration cannot produce a runnable
/// service.
pub fn app(config: &ServiceConfig) -> Result<Router, BootstrapError> {
    let ledger = Arc::new(MemoryLedger::new());
    if config.seed_demo_nodes {
        seed_demo_nodes(ledger.as_ref());
        tracing::info!("seeded demo proxy nodes");
    }
    let engine: Arc<dyn QueryEngine> = Arc::new(CannedEngine);
    app_with(config, ledger, engine)
}

/// Like [`app`], over the given ledger and engine.
///
/// # Errors
///
/// See [`app`].
pub fn app_with(
    config: &ServiceConfig,
    ledger: Arc<dyn Ledger>,
    engine: Arc<dyn QueryEngine>,
) -> Result<Router, BootstrapError> {
    let prices = Arc::new(price_table(config)?);
    let services = Arc::new(Services {
        ledger,
        engine,
        prices: Arc::clone(&prices),
        network: config.payments.network,
        node_mode: config.node.mode,
        started_at: Instant::now(),
    });
    let registry = Arc::new(build_registry(paygate(config)?, &services)?);
    tracing::info!(
        operations = prices.len(),
        network = %config.payments.network,
        pay_to = config.payments.pay_to(),
        verification = %registry.gate().policy(),
        "operation registry ready"
    );

    let manifest = Arc::new(ManifestState {
        registry: Arc::clone(&registry),
        network: config.payments.network,
    });
    Ok(Router::new()
        .merge(manifest_routes(manifest))
        .merge(operation_routes(registry)))
}
