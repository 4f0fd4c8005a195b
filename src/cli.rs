use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "baidupcs-leecher")]
#[command(about = "Leech files shared on Baidu Pan", long_about = None)]
pub struct Cli {
    /// JSON configuration file; environment variables override it
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the REST API server
    Serve(ServeArgs),
    /// Save shared links of new tasks into the remote directory
    Transfer(PollerArgs),
    /// Download samples of transferred tasks
    Sampling(PollerArgs),
    /// Download every file of permitted tasks
    Leech(PollerArgs),
    /// Resume recoverable failed tasks
    Resume(PollerArgs),
    /// Remove local task directories that belong to no task
    Purge(PurgeArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (default: `api.bind_address`)
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Also run the four pollers in this process
    #[arg(long)]
    pub with_pollers: bool,
}

#[derive(clap::Args, Debug)]
pub struct PollerArgs {
    /// Process the current batch and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(clap::Args, Debug)]
pub struct PurgeArgs {
    /// Delete orphan directories instead of moving them into the trash
    #[arg(long)]
    pub no_trash: bool,
}
