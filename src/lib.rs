//! fling - minimal peer file distribution over a framed TCP transport
//!
//! One daemon serves files out of a root directory; clients request them by
//! name and download concurrently, one connection per file.

pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod log;
pub mod overlay;
pub mod protocol;
pub mod server;
pub mod transfer;

pub use config::Config;
pub use error::{NetError, Result};
