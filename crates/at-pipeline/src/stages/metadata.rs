use super::{annotate, clear_errors, settle, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::{
    dedup_by_imdb_id, MediaItem, MediaMetadata, MediaType, PipelineStatus, TrainingLabel,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};

fn pending(item: &MediaItem) -> bool {
    !item.error_status && !item.is_rejected()
}

/// Stored metadata younger than the staleness threshold, keyed by
/// `(tmdb_id, is_tv)` since movie and tv ids share one number space
fn fresh_metadata(
    stored: Vec<MediaMetadata>,
    now: DateTime<Utc>,
    threshold_secs: i64,
) -> HashMap<(i64, bool), MediaMetadata> {
    let cutoff = now - Duration::seconds(threshold_secs);
    stored
        .into_iter()
        .filter(|meta| meta.updated_at.is_some_and(|at| at > cutoff))
        .map(|meta| ((meta.tmdb_id, meta.media_type.is_tv()), meta))
        .collect()
}

async fn search(pipeline: &Pipeline, batch: &mut [MediaItem]) {
    for item in batch.iter_mut() {
        let Some(title) = item.media_title.clone() else {
            annotate(item, "media_title is null");
            continue;
        };

        match pipeline
            .services
            .metadata
            .search(item.media_type, &title, item.release_year)
            .await
        {
            Ok(Some(hit)) => {
                if hit.title != title {
                    tracing::info!(hash = %item.hash, from = %title, to = %hit.title, "Canonicalized media title");
                }
                item.tmdb_id = Some(hit.tmdb_id);
                item.media_title = Some(hit.title);
            }
            Ok(None) => {
                item.reject("media search failed");
            }
            Err(e) => annotate(item, format!("media search error - {}", e)),
        }
    }
}

/// Merge fresh stored metadata; returns the hashes that were served locally
async fn reuse_stored(pipeline: &Pipeline, batch: &mut [MediaItem]) -> PipelineResult<HashSet<String>> {
    let ids: Vec<i64> = batch
        .iter()
        .filter(|item| pending(item))
        .filter_map(|item| item.tmdb_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let mut reused = HashSet::new();
    if ids.is_empty() {
        return Ok(reused);
    }

    let stored = pipeline.repo.get_media_metadata(&ids).await?;
    let fresh = fresh_metadata(
        stored,
        pipeline.clock.now(),
        pipeline.settings.stale_metadata_threshold_secs,
    );

    for item in batch.iter_mut().filter(|item| pending(item)) {
        let Some(tmdb_id) = item.tmdb_id else { continue };
        if let Some(meta) = fresh.get(&(tmdb_id, item.media_type.is_tv())) {
            item.apply_metadata(meta);
            tracing::debug!(hash = %item.hash, tmdb_id, "Reused stored metadata");
            reused.insert(item.hash.clone());
        }
    }
    Ok(reused)
}

async fn details(pipeline: &Pipeline, item: &mut MediaItem) {
    let Some(tmdb_id) = item.tmdb_id else { return };

    match pipeline.services.metadata.details(item.media_type, tmdb_id).await {
        Ok(details) => details.apply_to(item),
        Err(e) => {
            annotate(item, format!("media details error - {}", e));
            return;
        }
    }

    if item.media_type == MediaType::Movie && item.release_year.is_none() {
        item.reject("no release_year in metadata");
    }
}

async fn ratings(pipeline: &Pipeline, item: &mut MediaItem) {
    let title = item.media_title.clone().unwrap_or_default();
    match pipeline
        .services
        .metadata
        .ratings(item.imdb_id.as_deref(), &title, item.release_year)
        .await
    {
        Ok(Some(ratings)) => ratings.apply_to(item),
        Ok(None) => tracing::debug!(hash = %item.hash, "No ratings available"),
        Err(e) => annotate(item, format!("media ratings error - {}", e)),
    }
}

async fn process_batch(pipeline: &Pipeline, batch: &mut [MediaItem]) -> PipelineResult<()> {
    clear_errors(batch);
    search(pipeline, batch).await;

    let reused = reuse_stored(pipeline, batch).await?;

    for item in batch.iter_mut() {
        if !pending(item) || reused.contains(&item.hash) {
            continue;
        }
        details(pipeline, item).await;
        if pending(item) {
            ratings(pipeline, item).await;
        }
    }

    for item in batch.iter_mut().filter(|item| pending(item)) {
        if item.imdb_id.is_none() && !item.reject("no imdb_id found") {
            tracing::debug!(hash = %item.hash, "Override row continues without imdb_id");
        }
    }

    let rows = dedup_by_imdb_id(
        batch
            .iter()
            .filter(|item| pending(item))
            .filter_map(TrainingLabel::unlabeled)
            .collect(),
    );
    if !rows.is_empty() {
        pipeline.repo.training_db_upsert(&rows).await?;
    }

    for item in batch.iter_mut() {
        settle(item, PipelineStatus::MetadataCollected);
    }
    Ok(())
}

/// Stage 5: search, details and ratings in batches of `BATCH_SIZE`
pub async fn metadata(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::FileAccepted).await?;
    let mut report = StageReport::default();

    for batch in items.chunks_mut(pipeline.settings.batch_size) {
        let snapshot = batch.to_vec();
        if let Err(e) = process_batch(pipeline, batch).await {
            tracing::error!(error = %e, size = batch.len(), "Metadata batch failed");
            continue;
        }
        for item in batch.iter() {
            report.tally(PipelineStatus::FileAccepted, item);
        }
        write_changed(pipeline, batch, &snapshot).await?;
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_metadata_is_dropped() {
        let now = Utc::now();
        let fresh = MediaMetadata {
            tmdb_id: 36557,
            media_type: MediaType::Movie,
            imdb_id: Some("tt1536044".into()),
            updated_at: Some(now - Duration::days(1)),
            ..Default::default()
        };
        let stale = MediaMetadata {
            tmdb_id: 1399,
            media_type: MediaType::TvShow,
            imdb_id: Some("tt0944947".into()),
            updated_at: Some(now - Duration::days(60)),
            ..Default::default()
        };

        let map = fresh_metadata(vec![fresh, stale], now, 30 * 86_400);
        assert!(map.contains_key(&(36557, false)));
        assert!(!map.contains_key(&(1399, true)));
        assert!(!map.contains_key(&(36557, true)));
    }
}
