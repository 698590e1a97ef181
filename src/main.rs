//! bookcheck - replays the listings of a book chapter against a real shell
//!
//! Extracts code listings, commands and expected output from an HTML book
//! and confirms the tutorial steps still work end-to-end.

use bookcheck::{cli, commands, common};
use clap::Parser;
use commands::Commands;

#[derive(Parser)]
#[command(name = "bookcheck", about = "Verify the listings of an HTML book chapter")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Test { verbose: true, .. });
    common::logging::init_cli(verbose);

    if let Err(e) = cli::dispatch(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
