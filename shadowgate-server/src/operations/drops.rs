//! Dead drops: encrypted payloads sold per download.

use std::sync::Arc;

use serde_json::{Value, json};
use shadowgate::timestamp::EpochMillis;
use shadowgate::{
    FieldSpec, FieldType, InputContract, MinorUnits, OperationResult, OutputContract, PriceEntry,
};
use shadowgate_http::server::Operation;

use super::{Services, hours_field, immediate, limit_field, money, money_field};
use crate::ledger::{DeadDrop, DropMetadata, new_id};

/// Key of the drop creation operation.
pub const CREATE_DEAD_DROP: &str = "create-dead-drop";
/// Key of the drop purchase operation.
pub const PURCHASE_DEAD_DROP: &str = "purchase-dead-drop";
/// Key of the drop listing operation.
pub const LIST_DEAD_DROPS: &str = "list-dead-drops";

const DEFAULT_DROP_PRICE: MinorUnits = MinorUnits::new(50_000);
const DEFAULT_DROP_HOURS: f64 = 168.0;
const DEFAULT_MAX_DOWNLOADS: u64 = 100;
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

fn metadata_json(metadata: &DropMetadata) -> Value {
    json!(metadata)
}

/// `create-dead-drop`: stores an encrypted payload for sale.
pub fn create_dead_drop(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let encrypted_data = ctx.str_field("encryptedData").unwrap_or_default().to_owned();
        let asking = money_field(ctx, "price", DEFAULT_DROP_PRICE)?;
        let lifetime = hours_field(ctx, "expiresInHours", DEFAULT_DROP_HOURS)?;
        let max_downloads = ctx.u64_field("maxDownloads").unwrap_or(DEFAULT_MAX_DOWNLOADS);

        let now = EpochMillis::now();
        let drop = DeadDrop {
            id: new_id("drop", now),
            price: asking,
            creator: ctx.payer_or_anon().to_owned(),
            created_at: now,
            expires_at: now + lifetime,
            downloads: 0,
            max_downloads,
            metadata: DropMetadata {
                size: u64::try_from(encrypted_data.len()).unwrap_or(u64::MAX),
                mime_type: ctx
                    .str_field("mimeType")
                    .unwrap_or(DEFAULT_MIME_TYPE)
                    .to_owned(),
                description: ctx.str_field("description").unwrap_or_default().to_owned(),
                tags: ctx.strings_field("tags"),
            },
            encrypted_data,
        };
        let output = json!({
            "dropId": drop.id,
            "price": money(drop.price),
            "maxDownloads": drop.max_downloads,
            "expiresAt": drop.expires_at,
            "message": "Dead drop created. Data cached in the void.",
        });
        services.ledger.create_drop(drop);
        Ok(OperationResult::applied(output))
    })
    .with_input(
        InputContract::new()
            .field(
                "encryptedData",
                FieldSpec::string().required().describe("Ciphertext to sell"),
            )
            .field(
                "price",
                FieldSpec::number().describe("Asking price in dollars, default 0.05"),
            )
            .field(
                "expiresInHours",
                FieldSpec::number().describe("Lifetime in hours, default 168"),
            )
            .field(
                "maxDownloads",
                FieldSpec::integer().describe("Download cap, default 100"),
            )
            .field("description", FieldSpec::string())
            .field("mimeType", FieldSpec::string())
            .field("tags", FieldSpec::array()),
    )
    .with_output(
        OutputContract::new()
            .field("dropId", FieldType::String)
            .field("price", FieldType::String)
            .field("maxDownloads", FieldType::Integer)
            .field("expiresAt", FieldType::Integer),
    )
}

/// `purchase-dead-drop`: consumes one download and returns the payload.
pub fn purchase_dead_drop(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let id = ctx.str_field("dropId").unwrap_or_default();
        let drop = services.ledger.redeem_drop(id, EpochMillis::now())?;
        Ok(OperationResult::applied(json!({
            "dropId": drop.id,
            "encryptedData": drop.encrypted_data,
            "metadata": metadata_json(&drop.metadata),
            "downloads": drop.downloads,
            "maxDownloads": drop.max_downloads,
            "message": "Dead drop unlocked. Extract complete.",
        })))
    })
    .with_input(InputContract::new().field("dropId", FieldSpec::string().required()))
    .with_output(
        OutputContract::new()
            .field("dropId", FieldType::String)
            .field("encryptedData", FieldType::String)
            .field("metadata", FieldType::Object)
            .field("downloads", FieldType::Integer),
    )
}

/// `list-dead-drops`: active drops, newest first.
pub fn list_dead_drops(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let limit = limit_field(ctx, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT);
        let drops: Vec<_> = services
            .ledger
            .active_drops(EpochMillis::now(), limit)
            .iter()
            .map(|d| {
                json!({
                    "dropId": d.id,
                    "price": money(d.price),
                    "downloads": d.downloads,
                    "maxDownloads": d.max_downloads,
                    "expiresAt": d.expires_at,
                    "metadata": metadata_json(&d.metadata),
                })
            })
            .collect();
        Ok(OperationResult::read_only(json!({
            "total": drops.len(),
            "message": format!("Found {} active drops in the sprawl.", drops.len()),
            "drops": drops,
        })))
    })
    .with_input(
        InputContract::new().field(
            "limit",
            FieldSpec::integer().describe("Page size, default 20, at most 100"),
        ),
    )
    .with_output(
        OutputContract::new()
            .field("drops", FieldType::Array)
            .field("total", FieldType::Integer),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shadowgate::timestamp::EpochMillis;
    use shadowgate::{InvalidInput, MinorUnits, OperationError};
    use shadowgate_http::server::DispatchError;

    use crate::ledger::{DeadDrop, DropMetadata, Ledger};
    use crate::operations::testing::harness;

    fn stored(id: &str, expires_at: EpochMillis, downloads: u64, max: u64) -> DeadDrop {
        DeadDrop {
            id: id.into(),
            encrypted_data: "ciphertext".into(),
            price: MinorUnits::new(50_000),
            creator: "anon".into(),
            created_at: EpochMillis::from_millis(0),
            expires_at,
            downloads,
            max_downloads: max,
            metadata: DropMetadata::default(),
        }
    }

    fn far_future() -> EpochMillis {
        EpochMillis::from_millis(u64::MAX)
    }

    #[tokio::test]
    async fn test_create_then_purchase() {
        let h = harness();
        let created = h
            .call(
                "create-dead-drop",
                json!({ "encryptedData": "deadbeef", "price": 0.25, "maxDownloads": 1, "tags": ["intel"] }),
            )
            .await
            .unwrap();
        assert_eq!(created["price"], "$0.25");
        let drop_id = created["dropId"].as_str().unwrap().to_owned();
        let stored = h.ledger.drop_by_id(&drop_id).unwrap();
        assert_eq!(stored.creator, "0xpayer");
        assert_eq!(stored.metadata.size, 8);
        assert_eq!(stored.metadata.tags, ["intel"]);

        let bought = h
            .call("purchase-dead-drop", json!({ "dropId": drop_id }))
            .await
            .unwrap();
        assert_eq!(bought["encryptedData"], "deadbeef");
        assert_eq!(bought["downloads"], 1);
        assert_eq!(bought["metadata"]["tags"][0], "intel");

        let err = h
            .call("purchase-dead-drop", json!({ "dropId": drop_id }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::Gone(ref m)) if m == "Maximum downloads reached"
        ));
    }

    #[tokio::test]
    async fn test_default_drop_terms() {
        let h = harness();
        let created = h
            .call("create-dead-drop", json!({ "encryptedData": "x" }))
            .await
            .unwrap();
        assert_eq!(created["price"], "$0.05");
        assert_eq!(created["maxDownloads"], 100);
        let stored = h
            .ledger
            .drop_by_id(created["dropId"].as_str().unwrap())
            .unwrap();
        assert_eq!(
            stored.expires_at.as_millis() - stored.created_at.as_millis(),
            168 * 3600 * 1000
        );
        assert_eq!(stored.metadata.mime_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_create_rejects_negative_lifetime() {
        let h = harness();
        let err = h
            .call(
                "create-dead-drop",
                json!({ "encryptedData": "x", "expiresInHours": -1 }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Operation(OperationError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_purchase_exhausted_leaves_count() {
        let h = harness();
        h.ledger.create_drop(stored("full", far_future(), 3, 3));
        let err = h
            .call("purchase-dead-drop", json!({ "dropId": "full" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Operation(OperationError::Gone(_))));
        assert_eq!(h.ledger.drop_by_id("full").unwrap().downloads, 3);
    }

    #[tokio::test]
    async fn test_purchase_expired_and_missing() {
        let h = harness();
        h.ledger
            .create_drop(stored("stale", EpochMillis::from_millis(1), 0, 3));
        let err = h
            .call("purchase-dead-drop", json!({ "dropId": "stale" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::Gone(ref m)) if m == "Dead drop expired"
        ));

        let err = h
            .call("purchase-dead-drop", json!({ "dropId": "ghost" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::NotFound(ref m)) if m == "Dead drop not found"
        ));
    }

    #[tokio::test]
    async fn test_purchase_requires_drop_id() {
        let h = harness();
        let err = h.call("purchase-dead-drop", json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidInput(InvalidInput::MissingField(ref f)) if f == "dropId"
        ));
    }

    #[tokio::test]
    async fn test_list_active_drops() {
        let h = harness();
        h.ledger.create_drop(stored("open", far_future(), 0, 3));
        h.ledger.create_drop(stored("full", far_future(), 3, 3));
        h.ledger
            .create_drop(stored("stale", EpochMillis::from_millis(1), 0, 3));
        let output = h.call("list-dead-drops", json!({})).await.unwrap();
        assert_eq!(output["total"], 1);
        assert_eq!(output["drops"][0]["dropId"], "open");
        assert_eq!(output["drops"][0]["price"], "$0.05");
    }
}
