//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

// Re-export command types for convenience
pub use crate::commands::client::ClientArgs;
pub use crate::commands::server::ServerArgs;

/// Codesync - copy VS Code settings between machines on the local network
#[derive(Parser, Debug)]
#[command(name = "codesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a codesync config file (default: ~/.codesync/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Port to serve on or connect to [default: 8080]
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve this machine's settings to clients on the network
    Server(ServerArgs),

    /// Replace this machine's settings with those of a server
    Client(ClientArgs),
}
