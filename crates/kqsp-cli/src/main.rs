//! KQSP terminal chat client.
//!
//! # Usage
//!
//! ```bash
//! kqsp-cli --relay 127.0.0.1:9000
//! kqsp-cli --relay 127.0.0.1:9000 --connect 'K(kqsp-cli-10-1-2-3-abcd)'
//! RUST_LOG=kqsp_client=debug kqsp-cli --download-dir ./inbox 2>kqsp.log
//! ```

use std::path::PathBuf;

use clap::Parser;
use kqsp_app::{App, Bridge, Runtime};
use kqsp_cli::{ClientConfig, SystemEnv, TerminalDriver};
use kqsp_client::{PeerId, transport};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// KQSP terminal chat client
#[derive(Parser, Debug)]
#[command(name = "kqsp-cli")]
#[command(about = "Peer-to-peer group chat over a KQSP relay")]
#[command(version)]
struct Args {
    /// Relay address
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    relay: String,

    /// Peer to connect to once registered (a `K(...)` wrapper is accepted)
    #[arg(short, long)]
    connect: Option<String>,

    /// Register this peer id instead of a generated one
    #[arg(long)]
    peer_id: Option<String>,

    /// Directory for received files and audio clips
    #[arg(long, default_value = ".")]
    download_dir: PathBuf,

    /// Send files and audio as JSON text instead of binary frames
    #[arg(long)]
    text_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ClientConfig, Box<dyn std::error::Error>> {
        let connect = self.connect.as_deref().map(PeerId::parse_target).transpose()?;
        let peer_id = self.peer_id.as_deref().map(PeerId::parse_target).transpose()?;
        Ok(ClientConfig {
            relay_addr: self.relay,
            connect,
            peer_id,
            download_dir: self.download_dir,
            binary_payloads: !self.text_only,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = args.into_config()?;
    let (address, peer_id) = config.identity(&SystemEnv::new());

    tracing::info!(relay = %config.relay_addr, %address, %peer_id, "KQSP client starting");

    let connection = transport::connect(&config.relay_addr, peer_id).await?;
    let driver = TerminalDriver::new(connection, config.download_dir.clone());

    let app = match config.connect.clone() {
        Some(peer) => App::new().with_auto_connect(peer),
        None => App::new(),
    };
    let bridge = Bridge::new(address, config.session_config());

    Runtime::new(driver, app, bridge).run().await?;

    Ok(())
}
