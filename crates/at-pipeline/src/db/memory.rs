//! In-memory repository with the same write semantics as Postgres

use super::MediaRepository;
use crate::clock::{Clock, SystemClock};
use crate::error::PipelineResult;
use async_trait::async_trait;
use at_common::types::{
    MediaItem, MediaMetadata, PipelineStatus, RejectionStatus, TrainingLabel,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    seq: u64,
    media: HashMap<String, (u64, MediaItem)>,
    training: BTreeMap<String, TrainingLabel>,
}

impl Tables {
    fn ordered(&self) -> Vec<&MediaItem> {
        let mut rows: Vec<&(u64, MediaItem)> = self.media.values().collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, item)| item).collect()
    }
}

/// Repository backed by process memory.
///
/// Mirrors the Postgres schema's behaviour: inserts ignore known hashes,
/// upserts keep override, moving a row back to `ingested` clears its
/// error and rejection state, and every write stamps `updated_at`.
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of one row
    pub fn get(&self, hash: &str) -> Option<MediaItem> {
        self.lock().media.get(hash).map(|(_, item)| item.clone())
    }

    /// Snapshot of every row in insertion order
    pub fn all(&self) -> Vec<MediaItem> {
        self.lock().ordered().into_iter().cloned().collect()
    }

    /// Snapshot of one training row
    pub fn training(&self, imdb_id: &str) -> Option<TrainingLabel> {
        self.lock().training.get(imdb_id).cloned()
    }

    /// Back-date a row, as if it had not been written since `at`
    pub fn set_updated_at(&self, hash: &str, at: DateTime<Utc>) {
        if let Some((_, item)) = self.lock().media.get_mut(hash) {
            item.updated_at = Some(at);
        }
    }

    /// Seed a training row verbatim, flags included
    pub fn seed_training(&self, row: TrainingLabel) {
        self.lock().training.insert(row.imdb_id.clone(), row);
    }
}

#[async_trait]
impl MediaRepository for MemoryRepository {
    async fn get_items_by_status(&self, status: PipelineStatus) -> PipelineResult<Vec<MediaItem>> {
        Ok(self
            .lock()
            .ordered()
            .into_iter()
            .filter(|item| item.pipeline_status == status)
            .cloned()
            .collect())
    }

    async fn get_items_by_hash(&self, hashes: &[String]) -> PipelineResult<Vec<MediaItem>> {
        let wanted: HashSet<&String> = hashes.iter().collect();
        Ok(self
            .lock()
            .ordered()
            .into_iter()
            .filter(|item| wanted.contains(&item.hash))
            .cloned()
            .collect())
    }

    async fn compare_hashes(&self, hashes: &[String]) -> PipelineResult<Vec<String>> {
        let tables = self.lock();
        Ok(hashes
            .iter()
            .filter(|hash| !tables.media.contains_key(*hash))
            .cloned()
            .collect())
    }

    async fn return_rejected_hashes(&self, hashes: &[String]) -> PipelineResult<Vec<String>> {
        let tables = self.lock();
        Ok(hashes
            .iter()
            .filter(|hash| {
                tables
                    .media
                    .get(*hash)
                    .is_some_and(|(_, item)| item.rejection_status == RejectionStatus::Rejected)
            })
            .cloned()
            .collect())
    }

    async fn insert_items(&self, items: &[MediaItem]) -> PipelineResult<()> {
        let now = self.clock.now();
        let mut tables = self.lock();
        for item in items {
            item.validate_invariants()?;
            if tables.media.contains_key(&item.hash) {
                continue;
            }
            tables.seq += 1;
            let seq = tables.seq;
            let mut row = item.clone();
            row.created_at = Some(now);
            row.updated_at = Some(now);
            tables.media.insert(row.hash.clone(), (seq, row));
        }
        Ok(())
    }

    async fn media_db_update(&self, items: &[MediaItem]) -> PipelineResult<()> {
        let now = self.clock.now();
        let mut tables = self.lock();
        for item in items {
            let mut row = item.clone();
            row.updated_at = Some(now);

            match tables.media.get(&item.hash) {
                Some((seq, existing)) => {
                    let seq = *seq;
                    row.created_at = existing.created_at;
                    if existing.rejection_status == RejectionStatus::Override {
                        row.rejection_status = RejectionStatus::Override;
                        row.rejection_reason = None;
                    }
                    if row.pipeline_status == PipelineStatus::Ingested
                        && existing.pipeline_status != PipelineStatus::Ingested
                    {
                        row.reset_to_ingested();
                    }
                    row.validate_invariants()?;
                    tables.media.insert(row.hash.clone(), (seq, row));
                }
                None => {
                    row.validate_invariants()?;
                    row.created_at = Some(now);
                    tables.seq += 1;
                    let seq = tables.seq;
                    tables.media.insert(row.hash.clone(), (seq, row));
                }
            }
        }
        Ok(())
    }

    async fn get_media_metadata(&self, tmdb_ids: &[i64]) -> PipelineResult<Vec<MediaMetadata>> {
        let wanted: HashSet<i64> = tmdb_ids.iter().copied().collect();
        let tables = self.lock();
        let mut latest: BTreeMap<(i64, &'static str), MediaMetadata> = BTreeMap::new();
        for (_, item) in tables.media.values() {
            let Some(tmdb_id) = item.tmdb_id else { continue };
            if !wanted.contains(&tmdb_id) || item.imdb_id.is_none() {
                continue;
            }
            let meta = MediaMetadata::from(item);
            let key = (tmdb_id, item.media_type.as_str());
            let newer = latest
                .get(&key)
                .map_or(true, |current| meta.updated_at > current.updated_at);
            if newer {
                latest.insert(key, meta);
            }
        }
        Ok(latest.into_values().collect())
    }

    async fn get_training_labels(&self, imdb_ids: &[String]) -> PipelineResult<Vec<TrainingLabel>> {
        let tables = self.lock();
        Ok(imdb_ids
            .iter()
            .filter_map(|id| tables.training.get(id).cloned())
            .collect())
    }

    async fn training_db_upsert(&self, rows: &[TrainingLabel]) -> PipelineResult<()> {
        let mut tables = self.lock();
        for row in rows {
            match tables.training.get_mut(&row.imdb_id) {
                Some(existing) => {
                    existing.tmdb_id = row.tmdb_id.or(existing.tmdb_id);
                    existing.media_title = existing.media_title.take().or(row.media_title.clone());
                    existing.release_year = existing.release_year.or(row.release_year);
                    existing.label = existing.label.or(row.label);
                }
                None => {
                    tables.training.insert(row.imdb_id.clone(), row.clone());
                }
            }
        }
        Ok(())
    }

    async fn reset_items(&self, hashes: &[String]) -> PipelineResult<u64> {
        let now = self.clock.now();
        let mut tables = self.lock();
        let mut changed = 0;
        for hash in hashes {
            if let Some((_, item)) = tables.media.get_mut(hash) {
                item.operator_reset();
                item.updated_at = Some(now);
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_by_status(&self) -> PipelineResult<Vec<(PipelineStatus, i64)>> {
        let tables = self.lock();
        Ok(PipelineStatus::ALL
            .into_iter()
            .map(|status| {
                let count = tables
                    .media
                    .values()
                    .filter(|(_, item)| item.pipeline_status == status)
                    .count() as i64;
                (status, count)
            })
            .collect())
    }
}
