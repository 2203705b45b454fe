//! Proxy streaming and node status.

use std::sync::Arc;

use serde_json::json;
use shadowgate::timestamp::EpochMillis;
use shadowgate::{
    FieldSpec, FieldType, InputContract, OperationError, OperationResult, OutputContract,
    PriceEntry,
};
use shadowgate_http::server::{Operation, OperationContext};

use super::{Services, immediate, money, seconds_field};
use crate::ledger::{NodeFilter, ProxyNetwork, ProxySession, new_id};

/// Key of the proxy streaming operation.
pub const START_PROXY_STREAM: &str = "start-proxy-stream";
/// Key of the node status operation.
pub const NODE_STATUS: &str = "node-status";

/// Nodes at or below this reputation never carry streams.
const STREAM_MIN_REPUTATION: f64 = 0.7;
const DEFAULT_NODE_STATUS_MIN_REPUTATION: f64 = 0.5;
const DEFAULT_STREAM_SECONDS: f64 = 60.0;
const DEFAULT_TARGET_URL: &str = "https://example.com";

fn network_field() -> FieldSpec {
    FieldSpec::string().one_of(ProxyNetwork::ALL.map(ProxyNetwork::as_str))
}

fn requested_network(ctx: &OperationContext) -> Option<ProxyNetwork> {
    ctx.str_field("network").and_then(|s| s.parse().ok())
}

/// `start-proxy-stream`: opens a session on the best node of a network.
pub fn start_proxy_stream(price: PriceEntry, services: &Arc<Services>) -> Operation {
    let cost = price.amount;
    immediate(price, services, move |services, ctx| {
        let network = requested_network(ctx).unwrap_or(ProxyNetwork::Tor);
        let duration = seconds_field(ctx, "duration", DEFAULT_STREAM_SECONDS)?;
        let target_url = ctx.str_field("targetUrl").unwrap_or(DEFAULT_TARGET_URL);

        let node = services
            .ledger
            .nodes(NodeFilter {
                network: Some(network),
                min_reputation: STREAM_MIN_REPUTATION,
            })
            .into_iter()
            .find(|n| n.reputation > STREAM_MIN_REPUTATION)
            .ok_or_else(|| OperationError::Unavailable("No nodes available".into()))?;

        let now = EpochMillis::now();
        let session = ProxySession {
            id: new_id("sess", now),
            node_id: node.id.clone(),
            user_id: ctx.payer_or_anon().to_owned(),
            cost,
            bytes_transferred: 0,
            created_at: now,
            expires_at: now + duration,
        };
        services.ledger.open_session(session.clone())?;

        Ok(OperationResult::applied(json!({
            "sessionId": session.id,
            "selectedNode": {
                "id": node.id,
                "network": node.network,
                "reputation": node.reputation,
                "region": node.region,
            },
            "targetUrl": target_url,
            "duration": duration.as_secs_f64(),
            "estimatedCost": money(cost),
            "streamUrl": format!("wss://shadowgate.stream/{}", session.id),
            "expiresAt": session.expires_at,
            "message": "Proxy stream established. Jack in safely, netrunner.",
        })))
    })
    .with_input(
        InputContract::new()
            .field(
                "targetUrl",
                FieldSpec::string().describe("URL to stream through the proxy"),
            )
            .field("network", network_field().describe("Overlay network, default tor"))
            .field(
                "duration",
                FieldSpec::number().describe("Session length in seconds, default 60"),
            ),
    )
    .with_output(
        OutputContract::new()
            .field("sessionId", FieldType::String)
            .field("selectedNode", FieldType::Object)
            .field("streamUrl", FieldType::String)
            .field("estimatedCost", FieldType::String)
            .field("expiresAt", FieldType::Integer)
            .field("message", FieldType::String),
    )
}

/// `node-status`: nodes above a reputation floor and their average.
pub fn node_status(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let filter = NodeFilter {
            network: requested_network(ctx),
            min_reputation: ctx
                .f64_field("minReputation")
                .unwrap_or(DEFAULT_NODE_STATUS_MIN_REPUTATION),
        };
        let nodes = services.ledger.nodes(filter);
        let average = if nodes.is_empty() {
            0.0
        } else {
            nodes.iter().map(|n| n.reputation).sum::<f64>() / nodes.len() as f64
        };
        let listed: Vec<_> = nodes
            .iter()
            .map(|n| {
                json!({
                    "nodeId": n.id,
                    "network": n.network,
                    "reputation": n.reputation,
                    "totalSessions": n.total_sessions,
                    "region": n.region,
                })
            })
            .collect();

        Ok(OperationResult::read_only(json!({
            "nodes": listed,
            "total": nodes.len(),
            "averageReputation": average,
            "message": format!("{} nodes operational.", nodes.len()),
        })))
    })
    .with_input(
        InputContract::new()
            .field("network", network_field())
            .field(
                "minReputation",
                FieldSpec::number().describe("Reputation floor, default 0.5"),
            ),
    )
    .with_output(
        OutputContract::new()
            .field("nodes", FieldType::Array)
            .field("total", FieldType::Integer)
            .field("averageReputation", FieldType::Number),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shadowgate::{MinorUnits, OperationError};
    use shadowgate_http::server::DispatchError;

    use crate::bootstrap::seed_demo_nodes;
    use crate::ledger::Ledger;
    use crate::operations::testing::harness;

    #[tokio::test]
    async fn test_stream_picks_best_tor_node() {
        let h = harness();
        seed_demo_nodes(h.ledger.as_ref());
        let output = h
            .call("start-proxy-stream", json!({ "duration": 120 }))
            .await
            .unwrap();
        assert_eq!(output["selectedNode"]["id"], "tor-exit-nl-001");
        assert_eq!(output["estimatedCost"], "$0.05");

        let session_id = output["sessionId"].as_str().unwrap();
        assert_eq!(
            output["streamUrl"],
            format!("wss://shadowgate.stream/{session_id}")
        );
        let session = h.ledger.session(session_id).unwrap();
        assert_eq!(session.user_id, "0xpayer");
        assert_eq!(session.cost, MinorUnits::new(50_000));
        assert_eq!(
            session.expires_at.as_millis() - session.created_at.as_millis(),
            120_000
        );
        assert_eq!(h.ledger.node("tor-exit-nl-001").unwrap().total_sessions, 1251);
    }

    #[tokio::test]
    async fn test_stream_without_nodes_is_unavailable() {
        let h = harness();
        let err = h
            .call("start-proxy-stream", json!({ "network": "clearnet" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::Unavailable(ref m)) if m == "No nodes available"
        ));
    }

    #[tokio::test]
    async fn test_stream_rejects_unknown_network() {
        let h = harness();
        let err = h
            .call("start-proxy-stream", json!({ "network": "carrier-pigeon" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_node_status_filters() {
        let h = harness();
        seed_demo_nodes(h.ledger.as_ref());

        let all = h.call("node-status", json!({})).await.unwrap();
        assert_eq!(all["total"], 4);
        assert_eq!(all["nodes"][0]["nodeId"], "tor-exit-nl-001");

        let i2p = h.call("node-status", json!({ "network": "i2p" })).await.unwrap();
        assert_eq!(i2p["total"], 1);
        assert_eq!(i2p["averageReputation"], 0.92);

        let strict = h
            .call("node-status", json!({ "minReputation": 0.9 }))
            .await
            .unwrap();
        assert_eq!(strict["total"], 2);
    }

    #[tokio::test]
    async fn test_node_status_empty() {
        let h = harness();
        let output = h.call("node-status", json!({})).await.unwrap();
        assert_eq!(output["total"], 0);
        assert_eq!(output["averageReputation"], 0.0);
    }
}
