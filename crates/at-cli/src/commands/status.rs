//! `at status` command implementation
//!
//! Shows how many rows sit in each pipeline status.

use at_common::types::PipelineStatus;
use at_pipeline::db::{create_pool, MediaRepository, PgRepository};
use at_pipeline::Settings;

/// Render counts as an aligned two-column table
pub fn format_counts(counts: &[(PipelineStatus, i64)]) -> String {
    let width = counts
        .iter()
        .map(|(status, _)| status.as_str().len())
        .max()
        .unwrap_or(0);
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    let mut out = String::new();
    for (status, count) in counts {
        out.push_str(&format!("{:<width$}  {:>6}\n", status.as_str(), count, width = width));
    }
    out.push_str(&format!("{:<width$}  {:>6}\n", "total", total, width = width));
    out
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let pool = create_pool(&settings.database).await?;
    let counts = PgRepository::new(pool).count_by_status().await?;
    print!("{}", format_counts(&counts));
    Ok(())
}
