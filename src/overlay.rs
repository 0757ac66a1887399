//! Overlay-network membership, an external collaborator around the core.
//!
//! Peers obtain routable addresses from a ZeroTier virtual network; this
//! module shells out to `zerotier-cli` for join/leave and reads the address
//! assignment out of `listnetworks`.

use std::net::UdpSocket;

use tokio::process::Command;
use tokio::time::{sleep, Duration};

use crate::error::{NetError, Result};

/// Join the overlay and block until an address assignment is confirmed.
/// Registration lags the join, so `listnetworks` is polled until the
/// network shows a routable address.
pub async fn join_network(network_id: &str) -> Result<String> {
    run_cli(&["join", network_id]).await?;
    loop {
        if let Some(addr) = query_address(network_id).await? {
            println!("obtained {} from the overlay network", addr);
            return Ok(addr);
        }
        sleep(Duration::from_millis(500)).await;
    }
}

pub async fn leave_network(network_id: &str) -> Result<()> {
    run_cli(&["leave", network_id]).await.map(|_| ())
}

async fn query_address(network_id: &str) -> Result<Option<String>> {
    let out = run_cli(&["listnetworks"]).await?;
    for line in out.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.first() == Some(&"200") && fields.get(2) == Some(&network_id) {
            // The assigned address is the last field, CIDR-suffixed; "-"
            // means no assignment yet.
            if let Some(assigned) = fields.last() {
                let addr = assigned.split('/').next().unwrap_or("");
                if !addr.is_empty() && addr != "-" {
                    return Ok(Some(addr.to_string()));
                }
            }
        }
    }
    Ok(None)
}

async fn run_cli(args: &[&str]) -> Result<String> {
    let output = Command::new("zerotier-cli")
        .args(args)
        .output()
        .await
        .map_err(|e| NetError::Overlay(format!("zerotier-cli not runnable: {}", e)))?;
    if !output.status.success() {
        return Err(NetError::Overlay(format!(
            "zerotier-cli {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Local IP as seen on the default route. Connecting a UDP socket never
/// sends a packet; it only fixes the source address.
pub fn local_ip() -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect("8.8.8.8:1")?;
    Ok(socket.local_addr()?.ip().to_string())
}
