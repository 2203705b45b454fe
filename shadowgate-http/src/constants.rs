//! HTTP header names and defaults.

/// Primary header carrying the proof of payment (client → server).
pub const PAYMENT_PROOF_HEADER: &str = "x-payment-proof";

/// Fallback proof header; the x402 v1 `X-PAYMENT` payload header.
pub const X_PAYMENT_HEADER: &str = "x-payment";

/// Header a client may use to name the paying identity.
pub const PAYMENT_PAYER_HEADER: &str = "x-payment-payer";

/// Settlement reference of a paid call (server → client).
pub const X_PAYMENT_RESPONSE_HEADER: &str = "x-payment-response";

/// Scheme reported by a TLS-terminating proxy.
pub const X_FORWARDED_PROTO_HEADER: &str = "x-forwarded-proto";

/// Scheme assumed for resource URLs when no proxy header is present.
pub const DEFAULT_RESOURCE_SCHEME: &str = "https";

/// Public x402 facilitator.
pub const DEFAULT_FACILITATOR_URL: &str = "https://facilitator.x402.rs";

/// Payer recorded when a request names none.
pub const ANONYMOUS_PAYER: &str = "anon";
