//! Skirmish CLI - terminal lobby for Skirmish sessions
//!
//! # Commands
//!
//! - `skirmish host` - Open a lobby and wait for players
//! - `skirmish join <ADDR>` - Join a lobby hosted elsewhere
//!
//! # Usage
//!
//! ```bash
//! # Host a four-player game of Rush on the default port
//! skirmish host --name Ada --map Rush --max-players 4
//!
//! # Join it from another terminal
//! skirmish join 127.0.0.1:2100 --name Grace
//! ```
//!
//! Inside the lobby every line typed is sent as chat (`1hi` whispers to
//! slot 1, `.hi` also reaches teammates). Commands start with `/`:
//!
//! - `/ready` - toggle ready
//! - `/start` - start the game (host)
//! - `/kick N` - remove the player in slot N (host)
//! - `/quit` - leave

mod host;
mod join;
mod lobby;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Skirmish CLI - terminal lobby for Skirmish sessions
#[derive(Parser)]
#[command(name = "skirmish")]
#[command(about = "Host or join a Skirmish lobby from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a lobby and wait for players
    Host(host::HostArgs),

    /// Join a lobby hosted elsewhere
    Join(join::JoinArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Host(args) => host::execute(args),
        Commands::Join(args) => join::execute(args),
    }
}
