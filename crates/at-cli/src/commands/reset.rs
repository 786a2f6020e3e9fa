//! `at reset` command implementation
//!
//! The only way an override row leaves override.

use anyhow::Context;
use at_common::hash::normalize_hash;
use at_pipeline::db::{create_pool, MediaRepository, PgRepository};
use at_pipeline::Settings;

pub async fn run(settings: Settings, hashes: &[String]) -> anyhow::Result<()> {
    let hashes = hashes
        .iter()
        .map(|h| normalize_hash(h))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid hash")?;

    let pool = create_pool(&settings.database).await?;
    let repo = PgRepository::new(pool);
    let changed = repo.reset_items(&hashes).await?;

    tracing::info!(requested = hashes.len(), changed, "Operator reset");
    println!("Reset {} of {} rows to ingested", changed, hashes.len());
    if (changed as usize) < hashes.len() {
        println!("Hashes without a row were ignored");
    }
    Ok(())
}
