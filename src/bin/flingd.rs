//! flingd - the fling daemon: serve files until interrupted

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use fling::cli::DaemonOpts;
use fling::config::Config;
use fling::{overlay, server};

#[tokio::main]
async fn main() -> Result<()> {
    let opts = DaemonOpts::parse();

    if !opts.root.is_dir() {
        anyhow::bail!("served-files root is not a directory: {}", opts.root.display());
    }
    let root = std::fs::canonicalize(&opts.root)
        .with_context(|| format!("canonicalize {}", opts.root.display()))?;

    // The address reported in INFO replies: the overlay assignment when a
    // network is joined, otherwise the default-route local address.
    let overlay_addr = match &opts.network {
        Some(network) => overlay::join_network(network)
            .await
            .context("join overlay network")?,
        None => overlay::local_ip().context("resolve local address")?,
    };

    let config = Arc::new(Config {
        port: opts.port,
        served_root: root.clone(),
        ..Config::default()
    });

    println!("starting fling daemon:");
    println!("  root: {}", root.display());
    println!("  port: {}", opts.port);
    println!("  address: {}", overlay_addr);

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("stop requested, shutting down");
            stop.cancel();
        }
    });

    let result = server::serve(Arc::clone(&config), overlay_addr, cancel).await;

    if let Some(network) = &opts.network {
        if let Err(e) = overlay::leave_network(network).await {
            eprintln!("leaving overlay network failed: {}", e);
        }
    }

    result.context("serve")?;
    Ok(())
}
