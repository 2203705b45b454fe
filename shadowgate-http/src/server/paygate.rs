//! The payment gate: admit a request or answer it with a 402 challenge.
//!
//! [`Paygate`] is stateless. For each request it looks at the operation's
//! price and the proof headers, and delegates the actual payment check to
//! the injected [`PaymentVerifier`] under a timeout. Whatever goes wrong
//! during verification (a missing or malformed proof, a rejected payment, an
//! unreachable or slow verifier) the client sees the same challenge body it
//! would have received without any proof.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::header::HOST;
use http::{HeaderMap, Uri};
use shadowgate::{
    Admission, InputContract, OutputContract, PaymentRequired, PaymentRequirements,
    PaymentVerifier, PresenceOnly, PriceEntry, VerificationPolicy, Verdict, encode,
};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::error::VerificationError;
use crate::constants::{DEFAULT_RESOURCE_SCHEME, X_FORWARDED_PROTO_HEADER};
use crate::headers::extract_proof_token;

/// What a gate needs to know about the operation being called.
#[derive(Debug, Clone, Copy)]
pub struct Offer<'a> {
    /// Price of the operation.
    pub price: &'a PriceEntry,
    /// Accepted request shape, advertised in challenges.
    pub input: &'a InputContract,
    /// Response shape, advertised in challenges.
    pub output: &'a OutputContract,
}

impl Offer<'_> {
    /// The challenge for this offer at `resource`.
    #[must_use]
    pub fn challenge(&self, resource: &str) -> PaymentRequired {
        encode(self.price, resource, self.input, self.output)
    }

    fn requirements(&self, resource: &str) -> PaymentRequirements {
        PaymentRequirements::for_entry(self.price, resource, self.input, self.output)
    }
}

/// Outcome of [`Paygate::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The request may proceed to its handler.
    Admitted(Admission),
    /// The request must be answered with this 402 body.
    Challenged(PaymentRequired),
}

/// Decides whether a request has paid for the operation it calls.
#[derive(Clone)]
pub struct Paygate {
    verifier: Arc<dyn PaymentVerifier>,
    base_url: Option<Url>,
    verify_timeout: Option<Duration>,
}

impl fmt::Debug for Paygate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paygate")
            .field("policy", &self.verifier.policy())
            .field("base_url", &self.base_url)
            .field("verify_timeout", &self.verify_timeout)
            .finish()
    }
}

impl Default for Paygate {
    fn default() -> Self {
        Self::new(Arc::new(PresenceOnly))
    }
}

impl Paygate {
    /// A gate delegating to `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn PaymentVerifier>) -> Self {
        Self {
            verifier,
            base_url: None,
            verify_timeout: None,
        }
    }

    /// Uses `base_url` as the origin of every resource URL instead of the
    /// request's `Host` header.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Caps how long verification may take, regardless of the operation's
    /// payment window.
    #[must_use]
    pub const fn with_verify_timeout(mut self, cap: Duration) -> Self {
        self.verify_timeout = Some(cap);
        self
    }

    /// The verification strategy in force.
    #[must_use]
    pub fn policy(&self) -> VerificationPolicy {
        self.verifier.policy()
    }

    /// Absolute URL of the resource a request addresses: the configured base
    /// URL, or `{x-forwarded-proto or https}://{Host}`, joined with the
    /// request path. The query string is dropped, so every method and query
    /// probing a path sees the same resource.
    #[must_use]
    pub fn resource_url(&self, headers: &HeaderMap, uri: &Uri) -> String {
        let origin = self
            .base_url
            .clone()
            .or_else(|| request_origin(headers, uri));
        match origin {
            Some(mut url) => {
                url.set_path(uri.path());
                url.set_query(None);
                url.set_fragment(None);
                url.to_string()
            }
            None => format!("{DEFAULT_RESOURCE_SCHEME}://localhost{}", uri.path()),
        }
    }

    /// Whether the request will certainly be challenged: the operation is
    /// priced and no proof header is present. Needs no verifier call.
    #[must_use]
    pub fn must_challenge(&self, price: &PriceEntry, headers: &HeaderMap) -> bool {
        !price.is_free() && extract_proof_token(headers).is_none()
    }

    /// Decides whether the request is admitted.
    ///
    /// Free operations are admitted without looking at headers. Otherwise
    /// the proof token is checked by the verifier, bounded by the smaller of
    /// the operation's payment window and the configured cap.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "x402.paygate.evaluate",
            skip_all,
            fields(operation = %offer.price.operation_key)
        )
    )]
    pub async fn evaluate(&self, offer: &Offer<'_>, headers: &HeaderMap, uri: &Uri) -> GateDecision {
        if offer.price.is_free() {
            return GateDecision::Admitted(Admission::unverified());
        }
        let resource = self.resource_url(headers, uri);
        match self.evaluate_fallible(offer, &resource, headers).await {
            Ok(admission) => GateDecision::Admitted(admission),
            Err(err) => {
                log_rejection(&err);
                GateDecision::Challenged(offer.challenge(&resource))
            }
        }
    }

    /// Like [`evaluate`](Self::evaluate) for a priced operation, but returns
    /// the reason a request is not admitted instead of the challenge.
    ///
    /// # Errors
    ///
    /// Returns [`VerificationError`] when the request is not admitted.
    pub async fn evaluate_fallible(
        &self,
        offer: &Offer<'_>,
        resource: &str,
        headers: &HeaderMap,
    ) -> Result<Admission, VerificationError> {
        let token = extract_proof_token(headers).ok_or(VerificationError::ProofRequired)?;
        let requirements = offer.requirements(resource);
        let limit = self.timeout_for(offer.price);
        let verdict = tokio::time::timeout(limit, self.verifier.verify(&token, &requirements))
            .await
            .map_err(|_| VerificationError::Timeout(limit))??;
        match verdict {
            Verdict::Valid(admission) => Ok(admission),
            Verdict::Invalid { reason } => Err(VerificationError::Rejected(reason)),
        }
    }

    fn timeout_for(&self, price: &PriceEntry) -> Duration {
        let window = Duration::from_secs(price.max_timeout_seconds);
        self.verify_timeout.map_or(window, |cap| cap.min(window))
    }
}

fn request_origin(headers: &HeaderMap, uri: &Uri) -> Option<Url> {
    let scheme = headers
        .get(X_FORWARDED_PROTO_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_RESOURCE_SCHEME);
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| uri.authority().map(http::uri::Authority::as_str))?;
    Url::parse(&format!("{scheme}://{host}")).ok()
}

#[cfg(feature = "telemetry")]
fn log_rejection(err: &VerificationError) {
    if err.is_degradation() {
        tracing::warn!(error = %err, "payment verification degraded; challenging request");
    } else {
        tracing::debug!(reason = %err, "payment required");
    }
}

#[cfg(not(feature = "telemetry"))]
const fn log_rejection(_err: &VerificationError) {}
