use super::{annotate, log_status};
use crate::clients::TorrentInfo;
use crate::error::PipelineResult;
use crate::parser::TitleParser;
use crate::pipeline::{Pipeline, StageReport};
use at_common::hash::normalize_hash;
use at_common::types::{MediaItem, MediaType, PipelineStatus, RejectionStatus};
use std::collections::HashSet;

/// The daemon reports the hash as the name until it has the metainfo
fn has_title(torrent: &TorrentInfo) -> bool {
    let name = torrent.name.trim();
    !name.is_empty() && !name.eq_ignore_ascii_case(&torrent.hash)
}

fn adopt(parser: &TitleParser, hash: &str, torrent: &TorrentInfo) -> PipelineResult<MediaItem> {
    let mut item = MediaItem::new(hash, torrent.name.trim())?;
    item.rejection_status = RejectionStatus::Override;
    item.original_link = torrent.magnet_link.clone();
    item.media_type = parser.classify(&parser.preprocess(&item.original_title));
    if item.media_type == MediaType::Unknown {
        annotate(&mut item, "media_type is unknown");
    }
    Ok(item)
}

/// Rows the daemon holds that should flow through the pipeline again.
///
/// `rejected` is the repository's rejected subset of the daemon hashes; a
/// rejected pipeline status or a lost-then-re-added `ingested` row also
/// qualifies.
fn needs_readoption(item: &MediaItem, rejected: &HashSet<String>) -> bool {
    rejected.contains(&item.hash)
        || item.pipeline_status == PipelineStatus::Rejected
        || (item.pipeline_status == PipelineStatus::Ingested && !item.is_override())
}

/// Stage 2: adopt operator-added torrents as override rows
pub async fn collect(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let torrents = pipeline.services.torrents.get_torrents().await?;

    let mut by_hash = Vec::with_capacity(torrents.len());
    for torrent in &torrents {
        match normalize_hash(&torrent.hash) {
            Ok(hash) => by_hash.push((hash, torrent)),
            Err(e) => tracing::warn!(name = %torrent.name, error = %e, "Ignoring daemon torrent"),
        }
    }
    let hashes: Vec<String> = by_hash.iter().map(|(h, _)| h.clone()).collect();
    let unseen: HashSet<String> = pipeline.repo.compare_hashes(&hashes).await?.into_iter().collect();

    let mut new_items = Vec::new();
    for (hash, torrent) in &by_hash {
        if !unseen.contains(hash) {
            continue;
        }
        if !has_title(torrent) {
            tracing::debug!(hash = %hash, "Torrent has no name yet, adopting on a later run");
            continue;
        }
        match adopt(&pipeline.parser, hash, torrent) {
            Ok(item) => new_items.push(item),
            Err(e) => tracing::warn!(hash = %hash, error = %e, "Failed to adopt torrent"),
        }
    }

    if !new_items.is_empty() {
        pipeline.repo.insert_items(&new_items).await?;
    }
    for item in &new_items {
        tracing::info!("collected - {}", item.hash);
    }

    let known: Vec<String> = hashes.into_iter().filter(|h| !unseen.contains(h)).collect();
    let mut flipped = Vec::new();
    if !known.is_empty() {
        let rejected: HashSet<String> = pipeline
            .repo
            .return_rejected_hashes(&known)
            .await?
            .into_iter()
            .collect();
        for mut item in pipeline.repo.get_items_by_hash(&known).await? {
            if !needs_readoption(&item, &rejected) {
                continue;
            }
            item.rejection_status = RejectionStatus::Override;
            item.reset_to_ingested();
            tracing::info!(hash = %item.hash, "Re-adopting torrent as override");
            log_status(&item);
            flipped.push(item);
        }
        if !flipped.is_empty() {
            pipeline.repo.media_db_update(&flipped).await?;
        }
    }

    let total = new_items.len() + flipped.len();
    Ok(StageReport {
        processed: total,
        advanced: total,
        ..Default::default()
    })
}
