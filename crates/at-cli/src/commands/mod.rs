//! CLI command implementations
//!
//! Each command has its own module with a `run` function.

pub mod migrate;
pub mod reset;
pub mod stage;
pub mod status;

use crate::Commands;
use at_pipeline::Settings;

/// Dispatch a parsed command
pub async fn execute(command: &Commands, settings: Settings) -> anyhow::Result<()> {
    match command {
        Commands::Ingest
        | Commands::Collect
        | Commands::Parse
        | Commands::FileFilter
        | Commands::Metadata
        | Commands::MediaFilter
        | Commands::Initiate
        | Commands::Check
        | Commands::Transfer
        | Commands::Cleanup => match command.stage() {
            Some(stage) => stage::run(settings, stage).await,
            None => anyhow::bail!("{:?} has no pipeline stage", command),
        },
        Commands::Run => stage::run_all(settings).await,
        Commands::Reset { hashes } => reset::run(settings, hashes).await,
        Commands::Migrate => migrate::run(settings).await,
        Commands::Status => status::run(settings).await,
    }
}
