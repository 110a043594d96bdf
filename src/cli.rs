use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tagmill")]
#[command(about = "Tagmill image metadata service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP/WebSocket server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Configuration file (default: config/tagmill.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the configured bind address
    #[arg(long)]
    pub address: Option<SocketAddr>,
}
