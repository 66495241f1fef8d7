//! Join command - connect to a lobby over UDP

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use skirmish_core::net::{DEFAULT_PORT, NetSession, UdpTransport};

use crate::lobby::{self, HeadlessGame};

/// Arguments for the join command
#[derive(Args)]
pub struct JoinArgs {
    /// Host address, e.g. 192.168.1.20:2100 (port defaults to 2100)
    pub address: String,

    /// Display name
    #[arg(short, long, default_value = "Player")]
    pub name: String,

    /// Seconds to wait for the host to answer
    #[arg(long, default_value = "5")]
    pub connect_timeout: u64,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Execute the join command
pub fn execute(args: JoinArgs) -> Result<()> {
    let net = lobby::load_config(args.config.as_deref())?;

    let address = if args.address.contains(':') {
        args.address.clone()
    } else {
        format!("{}:{DEFAULT_PORT}", args.address)
    };

    println!("Connecting to {address}...");
    let transport = UdpTransport::connect_as_client(
        &address,
        &args.name,
        Duration::from_secs(args.connect_timeout),
    )
    .with_context(|| format!("Failed to connect to {address}"))?;

    let session =
        NetSession::join(transport, HeadlessGame, &net, &args.name).context("Failed to join session")?;

    lobby::run(session)
}
