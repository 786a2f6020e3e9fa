use super::{advance, annotate, log_status, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::{MediaItem, PipelineStatus};
use std::collections::HashSet;

/// Daemon torrents whose row is still `media_accepted`: the daemon took the
/// link but the status write never happened
async fn orphans(pipeline: &Pipeline, known: &HashSet<String>) -> PipelineResult<Vec<MediaItem>> {
    let torrents = match pipeline.services.torrents.get_torrents().await {
        Ok(torrents) => torrents,
        Err(e) => {
            tracing::error!(error = %e, "Could not list daemon torrents, skipping orphan check");
            return Ok(Vec::new());
        }
    };

    let unknown: Vec<String> = torrents
        .into_iter()
        .map(|t| t.hash.to_ascii_lowercase())
        .filter(|hash| !known.contains(hash))
        .collect();
    if unknown.is_empty() {
        return Ok(Vec::new());
    }

    Ok(pipeline
        .repo
        .get_items_by_hash(&unknown)
        .await?
        .into_iter()
        .filter(|item| item.pipeline_status == PipelineStatus::MediaAccepted)
        .collect())
}

async fn check(pipeline: &Pipeline, item: &mut MediaItem) {
    item.clear_error();
    if item.pipeline_status == PipelineStatus::MediaAccepted {
        tracing::info!(hash = %item.hash, "Recovered orphaned torrent");
        advance(item, PipelineStatus::Downloading);
    }

    match pipeline.services.torrents.get_torrent(&item.hash).await {
        Ok(Some(torrent)) => {
            if torrent.progress < 100.0 {
                return;
            }
            let name = torrent.name.trim();
            if name.is_empty() {
                annotate(item, "torrent name is empty");
                return;
            }
            item.original_path = Some(name.to_string());
            advance(item, PipelineStatus::Downloaded);
        }
        Ok(None) => {
            tracing::warn!(hash = %item.hash, "Torrent no longer in daemon");
            item.reset_to_ingested();
            log_status(item);
        }
        Err(e) => {
            tracing::error!(hash = %item.hash, error = %e, "Torrent lookup failed");
            item.reset_to_ingested();
            log_status(item);
        }
    }
}

/// Stage 8: advance finished downloads and recover lost ones
pub async fn download_check(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::Downloading).await?;
    let known: HashSet<String> = items.iter().map(|i| i.hash.clone()).collect();
    items.extend(orphans(pipeline, &known).await?);

    let snapshot = items.clone();
    let mut report = StageReport::default();

    for item in items.iter_mut() {
        let before = item.pipeline_status;
        check(pipeline, item).await;
        if item.pipeline_status != before || item.error_status {
            report.tally(before, item);
        }
    }

    write_changed(pipeline, &items, &snapshot).await?;
    Ok(report)
}
