use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Huddle: session manager for shared voice rooms.
#[derive(Parser, Debug)]
#[command(name = "huddle", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. `huddle=debug`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a fresh access key.
    Keygen,

    /// Issue a local development token and print its claims.
    Token {
        /// Access key to sign with.
        #[arg(long)]
        key: String,

        /// Room name; blank uses the configured default.
        #[arg(long, default_value = "")]
        room: String,

        /// Display name of the joining user.
        #[arg(long)]
        user: String,
    },

    /// Join a simulated room and walk through a short session.
    Demo(DemoArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DemoArgs {
    /// Room name; blank uses the configured default.
    #[arg(long, default_value = "")]
    pub room: String,

    /// Display name of the local user.
    #[arg(long, default_value = "alice")]
    pub user: String,

    /// Peers already in the room.
    #[arg(long, value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Access key; a fresh one is generated when omitted.
    #[arg(long)]
    pub key: Option<String>,

    /// Simulate a missing microphone.
    #[arg(long)]
    pub no_mic: bool,
}

pub fn parse() -> Args {
    Args::parse()
}
