//! The 402 Payment Required body.
//!
//! [`encode`] turns a [`PriceEntry`] and the request's resource URL into the
//! x402 v1 challenge a client needs to pay for that resource:
//!
//! ```json
//! {
//!   "x402Version": 1,
//!   "error": "Payment Required",
//!   "accepts": [{
//!     "scheme": "exact",
//!     "network": "base",
//!     "maxAmountRequired": "250000",
//!     "resource": "https://api.example/service/post-bounty",
//!     "description": "Post a bounty",
//!     "mimeType": "application/json",
//!     "payTo": "0x...",
//!     "maxTimeoutSeconds": 300,
//!     "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
//!     "outputSchema": { "input": { ... }, "output": { ... } }
//!   }]
//! }
//! ```
//!
//! Challenges are built fresh for every rejected request and never stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::amount::MinorUnits;
use crate::contract::{InputContract, OutputContract};
use crate::network::ChainNetwork;
use crate::price::PriceEntry;
use crate::version::X402Version1;

/// The `error` string of every challenge.
pub const PAYMENT_REQUIRED: &str = "Payment Required";

/// The only payment scheme offered.
pub const EXACT_SCHEME: &str = "exact";

/// MIME type of every operation's response.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Body of an HTTP 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Always `1`.
    pub x402_version: X402Version1,
    /// Always `"Payment Required"`.
    pub error: String,
    /// Acceptable ways to pay; this service offers exactly one.
    pub accepts: Vec<PaymentRequirements>,
}

/// One acceptable way to pay for a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, always `"exact"`.
    pub scheme: String,
    /// Settlement network.
    pub network: ChainNetwork,
    /// Amount in minor units, as a decimal string.
    pub max_amount_required: MinorUnits,
    /// Absolute URL of the resource being paid for.
    pub resource: String,
    /// Human-readable description.
    pub description: String,
    /// MIME type of the paid response.
    pub mime_type: String,
    /// Recipient address.
    pub pay_to: String,
    /// Seconds the client has to complete payment.
    pub max_timeout_seconds: u64,
    /// Token contract or mint.
    pub asset: String,
    /// Request and response shapes of the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,
}

/// The `outputSchema` member of [`PaymentRequirements`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Serialized [`InputContract`].
    pub input: Value,
    /// Serialized [`OutputContract`].
    pub output: Value,
}

impl PaymentRequirements {
    /// Requirements for paying `entry` to access `resource`.
    #[must_use]
    pub fn for_entry(
        entry: &PriceEntry,
        resource: &str,
        input: &InputContract,
        output: &OutputContract,
    ) -> Self {
        Self {
            scheme: EXACT_SCHEME.to_owned(),
            network: entry.network,
            max_amount_required: entry.amount,
            resource: resource.to_owned(),
            description: entry.description.clone(),
            mime_type: JSON_MIME_TYPE.to_owned(),
            pay_to: entry.pay_to.clone(),
            max_timeout_seconds: entry.max_timeout_seconds,
            asset: entry.asset.clone(),
            output_schema: Some(OutputSchema {
                input: input.to_schema(),
                output: output.to_schema(),
            }),
        }
    }
}

impl From<PaymentRequirements> for PaymentRequired {
    fn from(requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402Version1::default(),
            error: PAYMENT_REQUIRED.to_owned(),
            accepts: vec![requirements],
        }
    }
}

/// Builds the challenge for `entry` at `resource`. Pure: equal inputs give
/// equal challenges.
#[must_use]
pub fn encode(
    entry: &PriceEntry,
    resource: &str,
    input: &InputContract,
    output: &OutputContract,
) -> PaymentRequired {
    PaymentRequirements::for_entry(entry, resource, input, output).into()
}
