//! PeerPay node daemon.
//!
//! Opens the wallet store under the data dir, picks the model backend and
//! serves the dashboard API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use peerpay_common::store::FileStore;
use peerpay_node::{build_router, Advisor, AppState, NodeConfig};

#[derive(Parser)]
#[command(name = "peerpay-node", about = "PeerPay wallet node")]
struct Cli {
    /// TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP port to listen on (default: 3020).
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind (default: 127.0.0.1).
    #[arg(long)]
    bind: Option<String>,

    /// Directory holding the wallet store.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g. "info,peerpay_common=debug").
    #[arg(long)]
    log_filter: Option<String>,
}

impl Cli {
    fn apply(self, mut config: NodeConfig) -> NodeConfig {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(filter) = self.log_filter {
            config.log_filter = filter;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;
    let config = cli.apply(config);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let data_dir = config.data_dir();
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("Failed to open wallet store in {}", data_dir.display()))?;
    tracing::info!(path = %store.path().display(), "wallet store opened");

    let advisor = Advisor::from_config(&config.ai);
    let state = Arc::new(AppState::new(Arc::new(store), advisor));
    let app = build_router(state);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("PeerPay node listening on {addr}");

    axum::serve(listener, app).await.context("Server failed")
}
