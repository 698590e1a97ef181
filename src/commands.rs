//! CLI command definitions
//!
//! Defines the clap commands for the bookcheck CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Replay a chapter scenario defined in a YAML file
    Test {
        /// Path to the YAML scenario file
        path: PathBuf,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,

        /// Keep the temporary directory after the run
        #[arg(long)]
        keep_temp: bool,
    },

    /// Print the steps parsed from a chapter of the book
    Listings {
        /// Path to the HTML book
        book: PathBuf,

        /// Zero-based index of the chapter section
        #[arg(long, short, default_value = "1")]
        section: usize,

        /// Output the steps as JSON
        #[arg(long)]
        json: bool,
    },
}
