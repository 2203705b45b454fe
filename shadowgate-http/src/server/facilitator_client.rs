//! A [`PaymentVerifier`] backed by a _remote_ x402 facilitator over HTTP.
//!
//! The proof token is expected to be an x402 v1 `X-PAYMENT` payload (Base64
//! of a JSON object). [`FacilitatorClient`] posts it together with the exact
//! payment requirements to the facilitator's `/verify` endpoint and, when the
//! payment is valid, to `/settle`, before the operation runs. A token that has
//! already been settled is rejected by the facilitator at settlement, so a
//! replayed proof never reaches a handler.
//!
//! ## Error Handling
//!
//! Transport failures, unexpected statuses and undecodable responses are
//! reported as [`VerifierError::Transport`]; the gate turns them into a 402.

use std::fmt::Display;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shadowgate::version::X402Version1;
use shadowgate::{
    Admission, BoxFuture, PaymentRequirements, PaymentVerifier, ProofToken, SettlementRef,
    VerificationPolicy, Verdict, VerifierError,
};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::headers::decode_payment_payload;

/// Body of `POST /verify` and `POST /settle`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest<'a> {
    /// Always `1`.
    pub x402_version: X402Version1,
    /// Decoded `X-PAYMENT` payload.
    pub payment_payload: &'a Map<String, Value>,
    /// Requirements the payment must satisfy.
    pub payment_requirements: &'a PaymentRequirements,
}

/// Response of `POST /verify`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the payment satisfies the requirements.
    pub is_valid: bool,
    /// Paying address.
    #[serde(default)]
    pub payer: Option<String>,
    /// Why the payment is invalid.
    #[serde(default)]
    pub invalid_reason: Option<String>,
}

/// Response of `POST /settle`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether the payment settled.
    pub success: bool,
    /// Transaction hash or signature.
    #[serde(default)]
    pub transaction: Option<String>,
    /// Network the transaction landed on.
    #[serde(default)]
    pub network: Option<String>,
    /// Paying address.
    #[serde(default)]
    pub payer: Option<String>,
    /// Why settlement failed.
    #[serde(default)]
    pub error_reason: Option<String>,
}

/// Errors that can occur while talking to a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error, including timeouts.
    #[error("HTTP error: {context}: {source}")]
    Http {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

impl From<FacilitatorClientError> for VerifierError {
    fn from(err: FacilitatorClientError) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A client for a remote x402 facilitator.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator (e.g. `https://facilitator.example/`)
    base_url: Url,
    /// Full URL of `POST /verify`
    verify_url: Url,
    /// Full URL of `POST /settle`
    settle_url: Url,
    /// Shared Reqwest HTTP client
    client: Client,
    /// Custom headers sent with each request
    headers: HeaderMap,
    /// Per-request timeout
    timeout: Option<Duration>,
}

impl FacilitatorClient {
    /// Returns the base URL used by this client.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./verify` URL.
    #[must_use]
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL.
    #[must_use]
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Constructs a client whose `./verify` and `./settle` URLs are relative
    /// to `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if URL construction fails.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        let join = |path: &str, context: &'static str| {
            base_url
                .join(path)
                .map_err(|source| FacilitatorClientError::UrlParse { context, source })
        };
        let verify_url = join("./verify", "Failed to construct ./verify URL")?;
        let settle_url = join("./settle", "Failed to construct ./settle URL")?;
        Ok(Self {
            client: Client::new(),
            base_url,
            verify_url,
            settle_url,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Attaches custom headers to all future requests.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends `POST /verify`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.verify", skip_all, err)
    )]
    pub async fn verify_payment(
        &self,
        request: &FacilitatorRequest<'_>,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(&self.verify_url, "POST /verify", request)
            .await
    }

    /// Sends `POST /settle`.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.settle", skip_all, err)
    )]
    pub async fn settle_payment(
        &self,
        request: &FacilitatorRequest<'_>,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(&self.settle_url, "POST /settle", request)
            .await
    }

    async fn verify_and_settle(
        &self,
        token: &ProofToken,
        requirements: &PaymentRequirements,
    ) -> Result<Verdict, VerifierError> {
        let payload = decode_payment_payload(token)
            .map_err(|e| VerifierError::MalformedProof(e.to_string()))?;
        let request = FacilitatorRequest {
            x402_version: X402Version1::default(),
            payment_payload: &payload,
            payment_requirements: requirements,
        };

        let verified = self.verify_payment(&request).await?;
        if !verified.is_valid {
            return Ok(Verdict::Invalid {
                reason: verified
                    .invalid_reason
                    .unwrap_or_else(|| "payment is not valid".to_owned()),
            });
        }

        let settled = self.settle_payment(&request).await?;
        if !settled.success {
            return Ok(Verdict::Invalid {
                reason: settled
                    .error_reason
                    .unwrap_or_else(|| "settlement failed".to_owned()),
            });
        }

        let payer = settled.payer.or(verified.payer);
        Ok(Verdict::Valid(Admission {
            payer: payer.clone(),
            settlement: Some(SettlementRef {
                success: true,
                transaction: settled.transaction.unwrap_or_default(),
                network: settled
                    .network
                    .unwrap_or_else(|| requirements.network.to_string()),
                payer,
            }),
        }))
    }

    /// POST helper that handles JSON serialization, error mapping and the
    /// request timeout.
    ///
    /// `context` names the call in errors (e.g. `"POST /verify"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let mut req = self.client.post(url.clone()).json(payload);
        for (key, value) in &self.headers {
            req = req.header(key, value);
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let http_response = req
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Http { context, source: e })?;

        let result = if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        };

        log_failure(&result);
        result
    }
}

impl PaymentVerifier for FacilitatorClient {
    fn verify<'a>(
        &'a self,
        token: &'a ProofToken,
        requirements: &'a PaymentRequirements,
    ) -> BoxFuture<'a, Result<Verdict, VerifierError>> {
        Box::pin(self.verify_and_settle(token, requirements))
    }

    fn policy(&self) -> VerificationPolicy {
        VerificationPolicy::Facilitator
    }
}

/// Parses a base URL, normalizing it to a single trailing slash.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut normalized = value.trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

#[cfg(feature = "telemetry")]
fn log_failure<R, E: Display>(result: &Result<R, E>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, "request to facilitator failed");
    }
}

#[cfg(not(feature = "telemetry"))]
fn log_failure<R, E: Display>(_result: &Result<R, E>) {}
