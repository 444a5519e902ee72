mod bootstrap_helpers;
mod cli_args;
mod review_console;
mod scrape_command;
mod startup;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::{Cli, CliCommand};
use crate::scrape_command::{render_mode_listing, run_prompt, run_scrape};
use crate::startup::run_watch;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        CliCommand::Watch(args) => run_watch(args).await,
        CliCommand::Scrape(args) => run_scrape(args).await,
        CliCommand::Prompt(args) => run_prompt(args),
        CliCommand::Modes => {
            println!("{}", render_mode_listing());
            Ok(())
        }
    }
}
