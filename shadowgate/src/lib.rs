#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for a pay-per-call operation API gated by HTTP 402.
//!
//! Every operation the service exposes has a price. A request that does not
//! carry proof of payment for that price is answered with a machine-readable
//! x402 v1 challenge describing how to pay; a request that does is handed to
//! the operation. This crate holds the transport-independent pieces of that
//! flow.
//!
//! # Modules
//!
//! - [`amount`] - Minor-unit amounts and money-string parsing
//! - [`network`] - Settlement networks and their USDC assets
//! - [`price`] - Per-operation prices and the price table
//! - [`contract`] - Declared request and response shapes
//! - [`challenge`] - The 402 challenge body and its encoder
//! - [`verify`] - Proof tokens and payment verification strategies
//! - [`operation`] - Handler results
//! - [`timestamp`] - Millisecond wall-clock timestamps

pub mod amount;
pub mod challenge;
pub mod contract;
pub mod error;
pub mod network;
pub mod operation;
pub mod price;
pub mod timestamp;
pub mod verify;
pub mod version;

pub use amount::MinorUnits;
pub use challenge::{PaymentRequired, PaymentRequirements, encode};
pub use contract::{FieldSpec, FieldType, InputContract, OutputContract};
pub use error::{
    AmountError, DuplicateOperation, InvalidInput, OperationError, PriceError, UnknownOperation,
    VerifierError,
};
pub use network::ChainNetwork;
pub use operation::OperationResult;
pub use price::{PriceEntry, PriceTable};
pub use verify::{
    Admission, BoxFuture, PaymentVerifier, PresenceOnly, ProofToken, SettlementRef,
    VerificationPolicy, Verdict,
};
