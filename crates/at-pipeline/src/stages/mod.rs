//! The ten pipeline stages
//!
//! Each stage reads the rows in its source status, processes them one at a
//! time against the external services, and writes back only the rows it
//! changed. Per-row failures become `error_condition` annotations; only
//! repository and configuration failures end a stage early.

use crate::error::PipelineResult;
use crate::pipeline::Pipeline;
use at_common::types::{MediaItem, PipelineStatus};

mod cleanup;
mod collect;
mod download_check;
mod file_filter;
mod ingest;
mod initiate;
mod media_filter;
mod metadata;
mod parse;
mod transfer;

pub use cleanup::{cleanup, cleanup_at, cleanup_delays, delay_multiplier, CleanupDelays};
pub use collect::collect;
pub use download_check::download_check;
pub use file_filter::file_filter;
pub use ingest::{ingest, EPISODE_SOURCE, YTS_SOURCE};
pub use initiate::initiate;
pub use media_filter::media_filter;
pub use metadata::metadata;
pub use parse::parse;
pub use transfer::transfer;

/// `"<status> - <hash>"`, with the reason appended for rejections
pub(crate) fn log_status(item: &MediaItem) {
    match (item.pipeline_status, item.rejection_reason.as_deref()) {
        (PipelineStatus::Rejected, Some(reason)) => {
            tracing::info!("rejected - {} - {}", item.hash, reason)
        }
        (status, _) => tracing::info!("{} - {}", status, item.hash),
    }
}

/// Record an error condition on the row and log it
pub(crate) fn annotate(item: &mut MediaItem, condition: impl Into<String>) {
    let condition = condition.into();
    tracing::error!(hash = %item.hash, "{}", condition);
    item.set_error(condition);
}

/// End-of-stage move for one row; an illegal move is annotated instead
pub(crate) fn settle(item: &mut MediaItem, next: PipelineStatus) {
    let before = item.pipeline_status;
    match item.settle(next) {
        Ok(after) if after != before => log_status(item),
        Ok(_) => {}
        Err(e) => annotate(item, e.to_string()),
    }
}

/// Move a row to `next` regardless of its rejection state
pub(crate) fn advance(item: &mut MediaItem, next: PipelineStatus) {
    match item.transition(next) {
        Ok(()) => log_status(item),
        Err(e) => annotate(item, e.to_string()),
    }
}

/// Clear the error flags of every row a stage picks up
pub(crate) fn clear_errors(items: &mut [MediaItem]) {
    for item in items {
        item.clear_error();
    }
}

/// Persist the rows that differ from their snapshot.
///
/// Unchanged rows are not rewritten so their `updated_at` keeps measuring
/// time spent in the current status.
pub(crate) async fn write_changed(
    pipeline: &Pipeline,
    items: &[MediaItem],
    snapshot: &[MediaItem],
) -> PipelineResult<usize> {
    let changed: Vec<MediaItem> = items
        .iter()
        .zip(snapshot)
        .filter(|(item, before)| item != before)
        .map(|(item, _)| item.clone())
        .collect();

    if changed.is_empty() {
        return Ok(0);
    }
    pipeline.repo.media_db_update(&changed).await?;
    Ok(changed.len())
}
