//! Reading and writing payment headers.
//!
//! Proof tokens arrive in `x-payment-proof`, or in the x402 v1 `X-PAYMENT`
//! header as a fallback. Settlement results leave in `X-PAYMENT-RESPONSE` as
//! Base64-encoded JSON. Header lookups are case-insensitive, as `HeaderMap`
//! normalizes names.

use base64::prelude::*;
use http::{HeaderMap, HeaderValue};
use serde_json::{Map, Value};
use shadowgate::{ProofToken, SettlementRef};

use crate::constants::{PAYMENT_PAYER_HEADER, PAYMENT_PROOF_HEADER, X_PAYMENT_HEADER};
use crate::error::HttpError;

/// Finds the proof token in request headers.
///
/// The primary header wins when it holds a non-blank value; an absent, blank
/// or non-text primary header falls through to the `X-PAYMENT` header.
#[must_use]
pub fn extract_proof_token(headers: &HeaderMap) -> Option<ProofToken> {
    [PAYMENT_PROOF_HEADER, X_PAYMENT_HEADER]
        .into_iter()
        .find_map(|name| header_text(headers, name).and_then(ProofToken::new))
}

/// The identity named in `x-payment-payer`, if any.
#[must_use]
pub fn extract_payer(headers: &HeaderMap) -> Option<String> {
    header_text(headers, PAYMENT_PAYER_HEADER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Decodes an `X-PAYMENT` style token: Base64 of a JSON object.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure, or when the JSON
/// is not an object.
pub fn decode_payment_payload(token: &ProofToken) -> Result<Map<String, Value>, HttpError> {
    let bytes = BASE64_STANDARD.decode(token.as_str())?;
    let value: Value = serde_json::from_slice(&bytes)?;
    match value {
        Value::Object(object) => Ok(object),
        _ => Err(HttpError::NotAnObject),
    }
}

/// Encodes a JSON payment payload as an `X-PAYMENT` token.
///
/// # Errors
///
/// Returns [`HttpError::Serialize`] if JSON serialization fails.
pub fn encode_payment_payload(payload: &Value) -> Result<String, HttpError> {
    let json = serde_json::to_vec(payload)?;
    Ok(BASE64_STANDARD.encode(json))
}

/// Encodes a settlement reference for the `X-PAYMENT-RESPONSE` header.
///
/// # Errors
///
/// Returns [`HttpError`] if serialization fails.
pub fn encode_payment_response(settlement: &SettlementRef) -> Result<HeaderValue, HttpError> {
    let json = serde_json::to_vec(settlement)?;
    Ok(HeaderValue::from_str(&BASE64_STANDARD.encode(json))?)
}

/// Decodes an `X-PAYMENT-RESPONSE` header value.
///
/// # Errors
///
/// Returns [`HttpError`] on Base64 or JSON decode failure.
pub fn decode_payment_response(header_value: &str) -> Result<SettlementRef, HttpError> {
    let bytes = BASE64_STANDARD.decode(header_value.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
