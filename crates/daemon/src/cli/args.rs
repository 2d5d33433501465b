pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "vertex")]
#[command(about = "Keeps a local IPFS node running and your Teia pins pinned")]
pub struct Args {
    /// Kubo RPC API URL (defaults to api_url from the config)
    #[arg(long, global = true)]
    pub api_url: Option<Url>,

    /// Path to the tz-vertex config directory (defaults to ~/.tz-vertex)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
