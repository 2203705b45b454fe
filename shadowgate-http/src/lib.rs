#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the payment-gated operation API.
//!
//! Provides the payment header codec and constants, and (feature-gated) the
//! payment gate, operation registry, facilitator client and axum routes.
//!
//! # Modules
//!
//! - [`constants`] - Header names and default URLs
//! - [`headers`] - Proof token extraction and Base64 payment headers
//! - [`error`] - Header codec errors
//! - [`server`] - Gate, registry, facilitator client and routes (feature: `server`)
//!
//! # Feature Flags
//!
//! - `server` (default) - The axum server side
//! - `telemetry` - `tracing` spans and events for verification and dispatch

pub mod constants;
pub mod error;
pub mod headers;

#[cfg(feature = "server")]
pub mod server;
