// CLI modules
mod cli;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Download, Grant, Grants, Info, Init, Ls, Revoke, Upload, Version,
};
use sealbox::logging::init_logging;
use sealbox::state::AppState;

command_enum! {
    (Init, Init),
    (Upload, Upload),
    (Download, Download),
    (Grant, Grant),
    (Revoke, Revoke),
    (Ls, Ls),
    (Grants, Grants),
    (Info, Info),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Log level comes from config when there is one; init runs before there is
    let level = AppState::load(args.config_path.clone())
        .map(|state| state.config.log_level())
        .unwrap_or(tracing::Level::WARN);
    let guard = init_logging(level);

    let ctx = cli::op::OpContext::new(args.config_path, args.identity);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
