//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::draft::{DraftEdit, Industry, Role};

/// Draft field values given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct DraftFields {
    /// Full name
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Contact email
    #[arg(long)]
    pub email: Option<String>,

    /// Company or organisation
    #[arg(long)]
    pub company: Option<String>,

    /// Industry, by label or slug (see `gtif industries`)
    #[arg(long)]
    pub industry: Option<Industry>,

    /// Participant or Exhibitor
    #[arg(long)]
    pub role: Option<Role>,

    /// Message or special requirements
    #[arg(long)]
    pub message: Option<String>,
}

impl DraftFields {
    /// The edits these values make, in form order.
    #[must_use]
    pub fn edits(&self) -> Vec<DraftEdit> {
        let mut edits = Vec::new();
        if let Some(v) = &self.name {
            edits.push(DraftEdit::FullName(v.clone()));
        }
        if let Some(v) = &self.email {
            edits.push(DraftEdit::Email(v.clone()));
        }
        if let Some(v) = &self.company {
            edits.push(DraftEdit::Company(v.clone()));
        }
        if let Some(v) = self.industry {
            edits.push(DraftEdit::Industry(Some(v)));
        }
        if let Some(v) = self.role {
            edits.push(DraftEdit::Role(Some(v)));
        }
        if let Some(v) = &self.message {
            edits.push(DraftEdit::Message(v.clone()));
        }
        edits
    }
}

/// Register command arguments.
#[derive(Debug, Args)]
pub struct RegisterCommand {
    /// Values overriding the saved draft
    #[command(flatten)]
    pub fields: DraftFields,

    /// Badge photo (JPEG, PNG, WebP or GIF, at most 5 MB)
    #[arg(short, long, value_name = "FILE")]
    pub photo: Option<PathBuf>,
}

/// Draft commands.
#[derive(Debug, Subcommand)]
pub enum DraftCommand {
    /// Show the saved draft
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Change fields of the saved draft
    Set(DraftFields),

    /// Discard the saved draft
    Clear,
}

/// Event command arguments.
#[derive(Debug, Args)]
pub struct EventCommand {
    /// Keep updating the countdown every second
    #[arg(short, long)]
    pub watch: bool,

    /// Output as JSON
    #[arg(short, long, conflicts_with = "watch")]
    pub json: bool,
}

/// Calendar command arguments.
#[derive(Debug, Args)]
pub struct CalendarCommand {
    /// File or directory to write to (default: ./GTIF2025.ics)
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Print to stdout instead of writing a file
    #[arg(long, conflicts_with = "output")]
    pub stdout: bool,
}

/// Record inspection commands.
#[derive(Debug, Subcommand)]
pub enum RecordsCommand {
    /// List the most recent registrations
    List {
        /// Maximum number of records
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one registration
    Show {
        /// Record identifier
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show database statistics
    Stats,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
