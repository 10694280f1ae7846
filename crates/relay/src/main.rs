// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! fw-relay: WebSocket relay for fieldwatch.
//!
//! Fans position and roll-call events out per topic and answers the store
//! RPCs against a SQLite database in the data directory.

mod server;
mod state;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// fw-relay: fieldwatch relay server
#[derive(Parser, Debug)]
#[command(name = "fw-relay")]
#[command(about = "WebSocket relay for fieldwatch positions and roll calls")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Directory for the relay database
    #[arg(short, long, default_value = ".")]
    data: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    info!("Starting fw-relay");
    info!("  Bind address: {}", args.bind);
    info!("  Data directory: {}", args.data.display());

    let state = state::ServerState::new(&args.data)?;
    server::run(args.bind, state).await?;

    Ok(())
}
