//! The shadowgate pay-per-call service.
//!
//! Ten operations (proxy streams, dead drops, bounties, AI deck queries and
//! system information) are priced in USDC and exposed behind an x402 gate
//! built from [`shadowgate`] and [`shadowgate_http`].
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment variable expansion
//! - [`bootstrap`] - Builds the router from configuration
//! - [`operations`] - The operation catalog and handlers
//! - [`ledger`] - Entity storage contract and the in-memory ledger
//! - [`engine`] - AI deck query backends
//! - [`handlers`] - Manifest and health endpoints
//! - [`error`] - Startup errors
//! - [`util`] - Signal handling

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod operations;
pub mod util;

pub use bootstrap::app;
pub use config::ServiceConfig;
pub use error::BootstrapError;
