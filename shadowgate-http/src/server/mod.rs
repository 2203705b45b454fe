//! Server side of the payment-gated operation API.
//!
//! A request flows through three pieces:
//!
//! - [`router`] maps `/entrypoints/{key}/invoke` and `/service/{key}` onto
//!   the registry and turns outcomes into HTTP responses;
//! - [`registry`] resolves the operation, checks the body against its input
//!   contract and runs the handler once the gate admits the call;
//! - [`paygate`] admits the call or answers it with a 402 challenge, using a
//!   [`PaymentVerifier`](shadowgate::PaymentVerifier) such as
//!   [`facilitator_client::FacilitatorClient`].

pub mod error;
pub mod facilitator_client;
pub mod paygate;
pub mod registry;
pub mod router;

pub use error::{DispatchError, VerificationError};
pub use facilitator_client::FacilitatorClient;
pub use paygate::{GateDecision, Offer, Paygate};
pub use registry::{
    Dispatched, Operation, OperationContext, OperationFuture, OperationRegistry,
    OperationRequest, RequestBody,
};
pub use router::operation_routes;
