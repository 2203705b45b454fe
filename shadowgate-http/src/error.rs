//! Error types for the HTTP transport layer.

/// Errors that can occur while encoding or decoding payment headers.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Base64 decoding failed.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decoded JSON is not an object.
    #[error("payment payload must be a JSON object")]
    NotAnObject,

    /// Encoded value is not a legal header value.
    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),
}
