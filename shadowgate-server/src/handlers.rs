//! Discovery and health endpoints.
//!
//! - `GET /` and `GET /.well-known/agent.json` describe every operation with
//!   its price and input contract, so agents can plan calls before probing
//!   for a challenge.
//! - `GET /health` reports liveness.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use shadowgate::ChainNetwork;
use shadowgate::amount::USDC_DECIMALS;
use shadowgate::timestamp::EpochMillis;
use shadowgate::version::X402Version1;
use shadowgate_http::server::{Operation, OperationRegistry};

use crate::operations::system::{CAPABILITIES, SERVICE_NAME};

/// What the manifest is rendered from.
#[derive(Debug)]
pub struct ManifestState {
    /// The operations on offer.
    pub registry: Arc<OperationRegistry>,
    /// Settlement network.
    pub network: ChainNetwork,
}

/// Routes for the manifest and health check.
pub fn manifest_routes(state: Arc<ManifestState>) -> Router {
    Router::new()
        .route("/", get(manifest))
        .route("/.well-known/agent.json", get(manifest))
        .route("/health", get(health))
        .with_state(state)
}

/// `GET /`: the service manifest.
pub async fn manifest(State(state): State<Arc<ManifestState>>) -> Json<Value> {
    let entrypoints: Map<String, Value> = state
        .registry
        .operations()
        .map(|op| (op.key().to_owned(), entrypoint(op)))
        .collect();
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Anonymous proxy streams, dead drops, bounties and AI decks, paid per call over x402.",
        "network": state.network,
        "x402Version": X402Version1::VALUE,
        "capabilities": CAPABILITIES,
        "entrypoints": entrypoints,
    }))
}

fn entrypoint(op: &Operation) -> Value {
    let price = op.price();
    let key = op.key();
    json!({
        "description": price.description,
        "price": price.amount.to_money(USDC_DECIMALS),
        "maxAmountRequired": price.amount,
        "asset": price.asset,
        "payTo": price.pay_to,
        "invoke": format!("/entrypoints/{key}/invoke"),
        "service": format!("/service/{key}"),
        "input": op.input().to_schema(),
        "output": op.output().to_schema(),
    })
}

/// `GET /health`.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": EpochMillis::now(),
    }))
}
