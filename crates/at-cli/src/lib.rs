//! Automatic Transmission CLI
//!
//! One subcommand per pipeline stage, meant to be driven by cron or a
//! systemd timer, plus a handful of operator commands:
//!
//! - **Stages**: `at ingest`, `at collect`, ... `at cleanup`
//! - **Full pass**: `at run` executes all ten stages in order
//! - **Operator**: `at reset <hash>...`, `at migrate`, `at status`

pub mod commands;

use at_pipeline::Stage;
use clap::{Parser, Subcommand};

/// Automatic Transmission - staged media acquisition
#[derive(Parser, Debug)]
#[command(name = "at")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Read the configured RSS feeds into new rows
    Ingest,
    /// Adopt torrents added to the daemon by hand
    Collect,
    /// Extract title attributes from ingested rows
    Parse,
    /// Apply the per-media-type file rules
    FileFilter,
    /// Collect TMDB and OMDb metadata
    Metadata,
    /// Score movies with the recommendation service
    MediaFilter,
    /// Hand accepted rows to the torrent daemon
    Initiate,
    /// Reconcile downloads with the daemon
    Check,
    /// Copy finished payloads into the library
    Transfer,
    /// Remove finished and hung torrents
    Cleanup,

    /// Run every stage once, in order
    Run,

    /// Send rows back to ingested, clearing override
    Reset {
        /// Info-hashes to reset
        #[arg(required = true)]
        hashes: Vec<String>,
    },

    /// Apply database migrations
    Migrate,

    /// Show row counts per pipeline status
    Status,
}

impl Commands {
    /// The stage a subcommand runs, if it is a stage subcommand
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Commands::Ingest => Some(Stage::Ingest),
            Commands::Collect => Some(Stage::Collect),
            Commands::Parse => Some(Stage::Parse),
            Commands::FileFilter => Some(Stage::FileFilter),
            Commands::Metadata => Some(Stage::Metadata),
            Commands::MediaFilter => Some(Stage::MediaFilter),
            Commands::Initiate => Some(Stage::Initiate),
            Commands::Check => Some(Stage::DownloadCheck),
            Commands::Transfer => Some(Stage::Transfer),
            Commands::Cleanup => Some(Stage::Cleanup),
            Commands::Run | Commands::Reset { .. } | Commands::Migrate | Commands::Status => None,
        }
    }
}
