//! Error types shared by the protocol core.

/// A money string could not be converted to minor units.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// Not a decimal number.
    #[error("invalid amount `{0}`")]
    Malformed(String),
    /// Prices cannot be negative.
    #[error("amount `{0}` is negative")]
    Negative(String),
    /// More fractional digits than the asset supports.
    #[error("amount `{input}` has more than {decimals} decimal places")]
    TooPrecise {
        /// The rejected input.
        input: String,
        /// Decimal places of the asset.
        decimals: u32,
    },
    /// Does not fit in a `u64` of minor units.
    #[error("amount `{0}` is too large")]
    Overflow(String),
}

/// The network name is not one this crate settles on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown network `{0}`")]
pub struct UnknownNetwork(pub String);

/// No operation is registered under the requested key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation `{0}`")]
pub struct UnknownOperation(pub String);

/// Two operations were registered under the same key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation `{0}` is already registered")]
pub struct DuplicateOperation(pub String);

/// A price table could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Two entries share an operation key.
    #[error(transparent)]
    Duplicate(#[from] DuplicateOperation),
    /// A priced entry with a zero verification window.
    #[error("operation `{0}` has a zero max timeout")]
    ZeroTimeout(String),
}

/// A request body does not satisfy an operation's input contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidInput {
    /// The body is not valid JSON.
    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),
    /// The body is JSON but not an object.
    #[error("request body must be a JSON object")]
    NotAnObject,
    /// A required field is absent.
    #[error("missing required field `{0}`")]
    MissingField(String),
    /// A field has the wrong JSON type.
    #[error("field `{field}` must be of type {expected}")]
    WrongType {
        /// Field name.
        field: String,
        /// Expected type name.
        expected: &'static str,
    },
    /// A field's value is outside its allowed set.
    #[error("field `{field}` must be one of: {allowed}")]
    NotAllowed {
        /// Field name.
        field: String,
        /// Comma-separated allowed values.
        allowed: String,
    },
}

/// A failure raised by an operation handler after admission.
///
/// These are never turned into payment challenges; the transport maps each
/// variant to its own status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// The referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The entity existed but is expired or used up.
    #[error("{0}")]
    Gone(String),
    /// The entity is in a state that forbids the operation.
    #[error("{0}")]
    InvalidState(String),
    /// A resource needed to serve the call is not available right now.
    #[error("{0}")]
    Unavailable(String),
    /// Anything else.
    #[error("{0}")]
    Internal(String),
}

/// A payment verifier could not reach a verdict.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// The proof token is not in the format the verifier expects.
    #[error("malformed payment proof: {0}")]
    MalformedProof(String),
    /// The verifier's backend could not be reached or answered badly.
    #[error("verifier unavailable: {0}")]
    Transport(String),
}
