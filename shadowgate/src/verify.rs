//! Payment verification strategies.
//!
//! The gate does not decide on its own whether a proof token pays for a
//! request; it hands the token and the exact [`PaymentRequirements`] to a
//! [`PaymentVerifier`]. Two strategies exist:
//!
//! - [`PresenceOnly`] accepts any non-empty token (development and demos).
//! - A facilitator client (in `shadowgate-http`) asks a remote x402
//!   facilitator to verify and settle the payment.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::challenge::PaymentRequirements;
use crate::error::VerifierError;

/// A pinned, boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque proof of payment taken from request headers. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct ProofToken(String);

impl ProofToken {
    /// Wraps a raw header value. Empty and whitespace-only values are not
    /// tokens.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == raw.len() {
            Some(Self(raw))
        } else {
            Some(Self(trimmed.to_owned()))
        }
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProofToken(<{} bytes>)", self.0.len())
    }
}

/// Where a settled payment landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRef {
    /// Whether settlement succeeded. Always `true` for an admission.
    pub success: bool,
    /// Transaction hash or signature.
    pub transaction: String,
    /// Network the transaction settled on.
    pub network: String,
    /// Paying address, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Record of an admitted request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Admission {
    /// Payer identity established by verification, if any.
    pub payer: Option<String>,
    /// Settlement reference, if the payment was settled.
    pub settlement: Option<SettlementRef>,
}

impl Admission {
    /// Admission of a free operation or a presence-only check.
    #[must_use]
    pub const fn unverified() -> Self {
        Self {
            payer: None,
            settlement: None,
        }
    }
}

/// Outcome of checking a proof token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The token pays for the resource.
    Valid(Admission),
    /// The token was checked and does not pay for the resource.
    Invalid {
        /// Reason given by the verifier.
        reason: String,
    },
}

/// Which verification strategy is in force.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerificationPolicy {
    /// Any non-empty token is accepted.
    #[default]
    PresenceOnly,
    /// Tokens are verified and settled by a remote facilitator.
    Facilitator,
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PresenceOnly => "presence-only",
            Self::Facilitator => "facilitator",
        })
    }
}

/// Decides whether a proof token pays for a resource.
///
/// Implementations must be side-effect free apart from the payment itself:
/// the gate may abandon the returned future at its timeout or when the
/// client disconnects.
pub trait PaymentVerifier: Send + Sync {
    /// Checks `token` against `requirements`.
    fn verify<'a>(
        &'a self,
        token: &'a ProofToken,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Verdict, VerifierError>>;

    /// The strategy this verifier implements.
    fn policy(&self) -> VerificationPolicy;
}

impl<T: PaymentVerifier + ?Sized> PaymentVerifier for Arc<T> {
    fn verify<'a>(
        &'a self,
        token: &'a ProofToken,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Verdict, VerifierError>> {
        (**self).verify(token, requirements)
    }

    fn policy(&self) -> VerificationPolicy {
        (**self).policy()
    }
}

/// Accepts any proof token. No payer identity is established.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceOnly;

impl PaymentVerifier for PresenceOnly {
    fn verify<'a>(
        &'a self,
        _token: &'a ProofToken,
        _requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Verdict, VerifierError>> {
        Box::pin(async { Ok(Verdict::Valid(Admission::unverified())) })
    }

    fn policy(&self) -> VerificationPolicy {
        VerificationPolicy::PresenceOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::MinorUnits;
    use crate::challenge::PaymentRequirements;
    use crate::contract::{InputContract, OutputContract};
    use crate::network::ChainNetwork;
    use crate::price::PriceEntry;

    #[test]
    fn test_blank_tokens_are_not_tokens() {
        assert!(ProofToken::new("").is_none());
        assert!(ProofToken::new("   ").is_none());
        assert_eq!(ProofToken::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_debug_hides_token() {
        let token = ProofToken::new("secret-proof").unwrap();
        assert_eq!(format!("{token:?}"), "ProofToken(<12 bytes>)");
    }

    #[test]
    fn test_policy_names() {
        let policy: VerificationPolicy = serde_json::from_str("\"presence-only\"").unwrap();
        assert_eq!(policy, VerificationPolicy::PresenceOnly);
        assert_eq!(VerificationPolicy::Facilitator.to_string(), "facilitator");
    }

    #[tokio::test]
    async fn test_presence_only_accepts_any_token() {
        let entry = PriceEntry::new("x", MinorUnits::new(1), ChainNetwork::Base, "0xPAYEE");
        let requirements = PaymentRequirements::for_entry(
            &entry,
            "https://h/x",
            &InputContract::new(),
            &OutputContract::new(),
        );
        let token = ProofToken::new("anything").unwrap();
        let verdict = PresenceOnly.verify(&token, &requirements).await.unwrap();
        assert_eq!(verdict, Verdict::Valid(Admission::unverified()));
        assert_eq!(PresenceOnly.policy(), VerificationPolicy::PresenceOnly);
    }
}
