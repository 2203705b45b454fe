//! shadowgate HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p shadowgate-server --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/config.toml cargo run -p shadowgate-server
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p shadowgate-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `config.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `3000`)
//! - `RUST_LOG` - Log level filter (default: `info`)
//!
//! A `.env` file in the working directory is loaded first.

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::{HeaderName, Method};
use clap::Parser;
use shadowgate_http::constants::X_PAYMENT_RESPONSE_HEADER;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use shadowgate_server::config::ServiceConfig;
use shadowgate_server::util::SigDown;

/// Pay-per-call API gated by x402 payments.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file.
    #[arg(long, env = "CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Bind address, overriding the file and `HOST`.
    #[arg(long)]
    host: Option<std::net::IpAddr>,

    /// Port, overriding the file and `PORT`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("shadowgate failed: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServiceConfig::load_from(&args.config)?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    tracing::info!(
        config = %args.config.display(),
        host = %config.host,
        port = config.port,
        node_mode = %config.node.mode,
        "Loaded configuration"
    );

    let app = shadowgate_server::app(&config)?
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers(cors::Any)
                .expose_headers([HeaderName::from_static(X_PAYMENT_RESPONSE_HEADER)]),
        );

    let sig_down = SigDown::try_new()?;
    let token = sig_down.cancellation_token();

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("shadowgate listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await?;

    sig_down.recv().await;
    tracing::info!("shadowgate shut down gracefully");
    Ok(())
}
