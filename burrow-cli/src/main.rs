//! Burrow command-line client
//!
//! Forward local ports to instances on a private network.

// Use mimalloc as the global allocator for better performance
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "burrow",
    author,
    version,
    about = "Forward local ports to private instances",
    long_about = "Burrow forwards local TCP ports to services on a private network.\n\n\
                  It launches a short-lived TLS proxy instance next to the targets, relays \
                  every local connection through it and deletes it when the session ends.",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a tunnel session
    Tunnel(commands::tunnel::TunnelArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tunnel(args) => commands::tunnel::run(args).await,
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
    }
}
