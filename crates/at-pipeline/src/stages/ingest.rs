use super::log_status;
use crate::clients::FeedEntry;
use crate::error::{PipelineError, PipelineResult};
use crate::parser::TitleParser;
use crate::pipeline::{Pipeline, StageReport};
use at_common::hash::{hash_from_magnet, hash_from_url_path};
use at_common::types::{MediaItem, MediaType};
use std::collections::HashSet;

/// Movie feed; the torrent URL is the entry's second link
pub const YTS_SOURCE: &str = "yts.mx";

/// TV feed; entries carry a magnet URI
pub const EPISODE_SOURCE: &str = "episodefeed.com";

fn entry_to_item(parser: &TitleParser, source: &str, entry: &FeedEntry) -> PipelineResult<MediaItem> {
    let missing = || PipelineError::not_found("torrent link in entry", &entry.title);

    let (link, hash, media_type, media_title) = match source {
        YTS_SOURCE => {
            let link = entry.links.get(1).ok_or_else(missing)?;
            (link, hash_from_url_path(link)?, MediaType::Movie, None)
        }
        EPISODE_SOURCE => {
            let link = entry
                .links
                .iter()
                .find(|l| l.starts_with("magnet:"))
                .ok_or_else(missing)?;
            let media_type = parser.classify(&parser.preprocess(&entry.title));
            (link, hash_from_magnet(link)?, media_type, entry.tv_show_name.clone())
        }
        other => return Err(PipelineError::not_found("RSS source", other)),
    };

    let mut item = MediaItem::new(&hash, entry.title.clone())?;
    item.original_link = Some(link.clone());
    item.rss_source = Some(source.to_string());
    item.media_type = media_type;
    item.media_title = media_title;
    Ok(item)
}

/// Stage 1: insert unseen feed entries as `ingested` rows
pub async fn ingest(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for feed in &pipeline.settings.feeds {
        if feed.source != YTS_SOURCE && feed.source != EPISODE_SOURCE {
            tracing::error!(source = %feed.source, "Unsupported RSS source, skipping feed");
            continue;
        }

        let entries = match pipeline.services.feeds.fetch_feed(&feed.url).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(source = %feed.source, url = %feed.url, error = %e, "Failed to fetch feed");
                continue;
            }
        };
        tracing::debug!(source = %feed.source, entries = entries.len(), "Fetched feed");

        for entry in &entries {
            match entry_to_item(&pipeline.parser, &feed.source, entry) {
                Ok(item) => {
                    if seen.insert(item.hash.clone()) {
                        items.push(item);
                    }
                }
                Err(e) => tracing::warn!(source = %feed.source, title = %entry.title, error = %e, "Skipping feed entry"),
            }
        }
    }

    if items.is_empty() {
        return Ok(StageReport::default());
    }

    let hashes: Vec<String> = items.iter().map(|i| i.hash.clone()).collect();
    let unseen: HashSet<String> = pipeline.repo.compare_hashes(&hashes).await?.into_iter().collect();
    items.retain(|item| unseen.contains(&item.hash));

    pipeline.repo.insert_items(&items).await?;
    for item in &items {
        log_status(item);
    }

    Ok(StageReport {
        processed: items.len(),
        advanced: items.len(),
        ..Default::default()
    })
}
