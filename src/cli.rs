//! Shared CLI helpers and small reusable Clap fragments

use clap::Parser;
use std::path::PathBuf;

/// Common daemon options used by flingd
#[derive(Clone, Debug, Parser)]
pub struct DaemonOpts {
    /// Port to listen on
    #[arg(long, default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,

    /// Directory of served files
    #[arg(long, default_value = "files")]
    pub root: PathBuf,

    /// ZeroTier network to join for routable peer addresses
    #[arg(long)]
    pub network: Option<String>,
}
