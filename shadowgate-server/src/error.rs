//! Errors raised while assembling the server.
//!
//! Request-time failures are rendered by
//! [`DispatchError`](shadowgate_http::server::DispatchError); these only
//! occur at startup and end the process.

use shadowgate::{AmountError, DuplicateOperation, PriceError, UnknownOperation};
use shadowgate_http::server::facilitator_client::FacilitatorClientError;

/// The configuration does not describe a runnable server.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// `[pricing]` names a key no operation uses.
    #[error("unknown operation `{0}` in [pricing]")]
    UnknownPricingKey(String),

    /// A `[pricing]` value is not a valid amount.
    #[error("invalid price for `{key}`: {source}")]
    InvalidPrice {
        /// Operation key.
        key: String,
        /// Why the amount was rejected.
        #[source]
        source: AmountError,
    },

    /// The price table was rejected.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Two operations share a key.
    #[error(transparent)]
    Duplicate(#[from] DuplicateOperation),

    /// An operation has no price.
    #[error("no price for operation `{}`", .0.0)]
    Unpriced(#[from] UnknownOperation),

    /// The facilitator URL is unusable.
    #[error("facilitator client: {0}")]
    Facilitator(#[from] FacilitatorClientError),
}
