//! Binary entry-point flags (CLI), grounded on
//! `examples/axum-resilient-kv-store`'s `clap` dependency.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "admission-gate", about = "Admission pipeline ingress")]
pub struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// Optional JSON config file overriding the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}
