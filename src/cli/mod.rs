//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::listing::{Chapter, Step, StepKind};
use crate::testing::{self, RunOptions};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Test {
            path,
            verbose,
            keep_temp,
        } => {
            let config = Config::load()?;
            let options = RunOptions { verbose, keep_temp };
            let result = testing::run_scenario(&path, &config, &options).await?;

            if result.passed {
                Ok(())
            } else {
                Err(Error::TestAssertion(format!(
                    "'{}' failed after {}/{} actions: {}",
                    result.name,
                    result.actions_run,
                    result.actions_total,
                    result.error.unwrap_or_else(|| "unknown error".to_string())
                )))
            }
        }

        Commands::Listings {
            book,
            section,
            json,
        } => {
            let chapter = Chapter::load(&book, section)?;

            if json {
                println!("{}", serde_json::to_string_pretty(chapter.steps())?);
            } else if chapter.is_empty() {
                println!("No listings in section {}", section);
            } else {
                for (i, step) in chapter.steps().iter().enumerate() {
                    print_step(i, step);
                }
            }
            Ok(())
        }
    }
}

fn print_step(index: usize, step: &Step) {
    let header = format!("[{}] {} ({})", index, step.kind.name(), step.id);
    match &step.kind {
        StepKind::CodeListing { filename, contents } => {
            println!("{} {}", header.cyan().bold(), filename.white().bold());
            for line in contents.lines() {
                println!("    {}", line.dimmed());
            }
        }
        StepKind::Command { text } => {
            println!("{} $ {}", header.yellow().bold(), text);
        }
        StepKind::Output { text } => {
            println!("{}", header.green().bold());
            for line in text.lines() {
                println!("    {}", line);
            }
        }
    }
}
