//! Sage Control - CLI client for the Sage daemon

use clap::Parser;
use owo_colors::OwoColorize;
use sagectl::{cli::Cli, commands, errors};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = commands::run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), err);
        std::process::exit(errors::exit_code(&err));
    }
}
