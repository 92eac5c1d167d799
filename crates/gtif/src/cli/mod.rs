//! Command-line interface for gtif.
//!
//! This module provides the CLI structure for the `gtif` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CalendarCommand, ConfigCommand, DraftCommand, DraftFields, EventCommand, RecordsCommand,
    RegisterCommand,
};

use crate::logging::Verbosity;

/// gtif - Register for the Ghana Trade & Investment Forum 2025
///
/// Fill in and submit a registration, keep a draft between runs, follow
/// the countdown to the forum and export it to your calendar.
#[derive(Debug, Parser)]
#[command(name = "gtif")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit a registration, starting from the saved draft
    Register(RegisterCommand),

    /// Inspect or edit the saved draft
    #[command(subcommand)]
    Draft(DraftCommand),

    /// List the industries to choose from
    Industries,

    /// Show event details and the countdown
    Event(EventCommand),

    /// Export the event as an iCalendar file
    Calendar(CalendarCommand),

    /// Inspect stored registrations
    #[command(subcommand)]
    Records(RecordsCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
