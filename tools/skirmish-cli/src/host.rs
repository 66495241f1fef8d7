//! Host command - open a lobby over UDP

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use skirmish_core::net::{DEFAULT_PORT, NetSession, SessionConfig, UdpTransport};

use crate::lobby::{self, HeadlessGame};

/// Arguments for the host command
#[derive(Args)]
pub struct HostArgs {
    /// Address to listen on
    #[arg(short, long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
    pub bind: String,

    /// Display name
    #[arg(short, long, default_value = "Host")]
    pub name: String,

    /// Map to play
    #[arg(short, long, default_value = "Rush")]
    pub map: String,

    /// Player cap for the game type (2-8)
    #[arg(long, default_value = "4", value_parser = clap::value_parser!(u8).range(2..=8))]
    pub max_players: u8,

    /// Session name shown to joiners
    #[arg(long, default_value = "Skirmish")]
    pub session: String,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Execute the host command
pub fn execute(args: HostArgs) -> Result<()> {
    let net = lobby::load_config(args.config.as_deref())?;

    let transport = UdpTransport::connect_as_host(&args.bind, net.session.udp_timeout())
        .with_context(|| format!("Failed to listen on {}", args.bind))?;
    println!("Hosting on port {}", transport.port());

    let config = SessionConfig {
        session_name: args.session,
        map_name: args.map,
        max_players: args.max_players,
        ..SessionConfig::default()
    };
    let session = NetSession::host(transport, HeadlessGame, config, &net, &args.name)
        .context("Failed to open session")?;

    lobby::run(session)
}
