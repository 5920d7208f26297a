//! KQSP relay binary.
//!
//! # Usage
//!
//! ```bash
//! kqsp-relay --bind 0.0.0.0:9000
//! RUST_LOG=kqsp_relay=debug kqsp-relay --max-sessions 64
//! ```

use clap::Parser;
use kqsp_relay::{RelayConfig, RelayServer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// KQSP relay
#[derive(Parser, Debug)]
#[command(name = "kqsp-relay")]
#[command(about = "Peer id registry and link relay for KQSP group chat")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:9000")]
    bind: String,

    /// Maximum concurrent client sessions
    #[arg(long, default_value = "1024")]
    max_sessions: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!(bind = %args.bind, max_sessions = args.max_sessions, "KQSP relay starting");

    let config = RelayConfig { bind_address: args.bind, max_sessions: args.max_sessions };
    let server = RelayServer::bind(config).await?;

    tracing::info!("Relay listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
