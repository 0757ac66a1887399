//! fling - fetch files from a fling daemon, one connection per file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use fling::config::Config;
use fling::{client, overlay};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "fling - concurrent peer file fetcher over a framed TCP transport"
)]
struct Args {
    /// Server address (host:port) used for the initial INFO exchange
    server: String,

    /// Files to download, one independent connection each
    #[arg(required = true)]
    files: Vec<String>,

    /// Directory where received files are written
    #[arg(long, default_value = "recv")]
    recv_root: PathBuf,

    /// ZeroTier network to join before fetching
    #[arg(long)]
    network: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(Config {
        received_root: args.recv_root.clone(),
        ..Config::default()
    });

    if let Some(network) = &args.network {
        let addr = overlay::join_network(network)
            .await
            .context("join overlay network")?;
        println!("overlay address: {}", addr);
    }

    let server = client::resolve_server(&args.server, &config)
        .await
        .with_context(|| format!("resolve server via {}", args.server))?;
    println!("server reachable at {}:{}", server.0, server.1);

    let outcomes = client::fetch(Arc::clone(&config), server, args.files).await;

    if let Some(network) = &args.network {
        if let Err(e) = overlay::leave_network(network).await {
            eprintln!("leaving overlay network failed: {}", e);
        }
    }

    let failed = outcomes.iter().filter(|o| !o.succeeded()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} downloads failed", failed, outcomes.len());
    }
    Ok(())
}
