//! CLI argument parsing for the kidroute-worker binary.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kidroute-worker", about = "Route capacity and assignment worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Print auto-match suggestions for a date's unassigned schedules and exit
    Suggest {
        /// Date to plan (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
}
