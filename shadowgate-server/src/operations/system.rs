//! Free system information.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use shadowgate::{FieldType, OperationResult, OutputContract, PriceEntry};
use shadowgate_http::server::Operation;

use super::{Services, immediate, money};

/// Key of the system information operation.
pub const SYSTEM_INFO: &str = "system-info";

/// Service name reported to clients.
pub const SERVICE_NAME: &str = "shadowgate";

/// Features advertised by `system-info` and the manifest.
pub const CAPABILITIES: [&str; 5] = [
    "Tor/I2P routing",
    "Dead drops",
    "Bounties",
    "AI assistants",
    "x402 micropayments",
];

/// `system-info`: name, version, network, node mode and prices.
pub fn system_info(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, _ctx| {
        let pricing: Map<String, Value> = services
            .prices
            .iter()
            .map(|entry| (entry.operation_key.clone(), Value::from(money(entry.amount))))
            .collect();
        Ok(OperationResult::read_only(json!({
            "name": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "network": services.network,
            "nodeMode": services.node_mode,
            "uptime": services.started_at.elapsed().as_secs(),
            "pricing": pricing,
            "capabilities": CAPABILITIES,
            "message": "shadowgate operational. Welcome to the Sprawl.",
        })))
    })
    .with_output(
        OutputContract::new()
            .field("name", FieldType::String)
            .field("version", FieldType::String)
            .field("network", FieldType::String)
            .field("nodeMode", FieldType::String)
            .field("pricing", FieldType::Object)
            .field("capabilities", FieldType::Array),
    )
}
