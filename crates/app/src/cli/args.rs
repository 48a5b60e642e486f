pub use clap::Parser;

use std::path::PathBuf;

use common::identity::Identity;

#[derive(Parser, Debug)]
#[command(name = "sealbox")]
#[command(about = "Encrypt files client-side and share them with revocable access")]
pub struct Args {
    /// Path to the sealbox config directory (defaults to ~/.sealbox)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Act as this identity instead of the configured default
    #[arg(long = "as", global = true, value_name = "IDENTITY")]
    pub identity: Option<Identity>,

    #[command(subcommand)]
    pub command: crate::Command,
}
