//! Error types for the payment gate and operation dispatch.

use std::time::Duration;

use shadowgate::{InvalidInput, OperationError, UnknownOperation, VerifierError};

/// Reasons a priced request is not admitted. Every variant becomes a 402
/// challenge; they differ only in how they are logged.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// No proof header on the request.
    #[error("payment proof is required")]
    ProofRequired,
    /// The verifier checked the proof and rejected it.
    #[error("payment rejected: {0}")]
    Rejected(String),
    /// The verifier could not reach a verdict.
    #[error(transparent)]
    Verifier(#[from] VerifierError),
    /// The verifier did not answer in time.
    #[error("payment verification timed out after {0:?}")]
    Timeout(Duration),
}

impl VerificationError {
    /// Whether the failure points at the payment infrastructure rather than
    /// at the client.
    #[must_use]
    pub const fn is_degradation(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Verifier(VerifierError::Transport(_))
        )
    }
}

/// Failures of [`OperationRegistry::dispatch`](super::OperationRegistry::dispatch)
/// other than a payment challenge.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No operation under the requested key.
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),
    /// The request body does not satisfy the input contract.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// The handler ran and failed.
    #[error(transparent)]
    Operation(#[from] OperationError),
}
