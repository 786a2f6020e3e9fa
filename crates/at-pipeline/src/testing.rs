//! In-memory collaborators
//!
//! Scriptable stand-ins for the daemon, the metadata providers, the
//! recommendation service and RSS feeds. Together with
//! [`MemoryRepository`](crate::db::MemoryRepository) they let a whole
//! [`Pipeline`](crate::Pipeline) run without network or database.

use crate::clients::{
    FeedEntry, FeedSource, MediaDetails, MetadataProvider, PredictionInput, Ratings, Recommender,
    SearchHit, TorrentClient, TorrentInfo,
};
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use at_common::hash::{hash_from_magnet, hash_from_url_path};
use at_common::types::MediaType;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Torrent daemon
// ============================================================================

#[derive(Default)]
struct DaemonState {
    torrents: BTreeMap<String, TorrentInfo>,
    added: Vec<String>,
    removed: Vec<String>,
    failing_links: HashSet<String>,
    failing_lookups: HashSet<String>,
    failing_listing: bool,
}

/// A torrent daemon holding its queue in memory
#[derive(Default)]
pub struct FakeTorrentClient {
    state: Mutex<DaemonState>,
}

impl FakeTorrentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a torrent in the queue as if an operator had added it
    pub fn insert(&self, hash: &str, name: &str, progress: f64) {
        let hash = hash.to_ascii_lowercase();
        lock(&self.state).torrents.insert(
            hash.clone(),
            TorrentInfo {
                hash,
                name: name.to_string(),
                progress,
                status: 4,
                download_dir: Some("/downloads".to_string()),
                magnet_link: None,
            },
        );
    }

    /// Mark a torrent finished under its on-disk name
    pub fn complete(&self, hash: &str, name: &str) {
        if let Some(torrent) = lock(&self.state).torrents.get_mut(&hash.to_ascii_lowercase()) {
            torrent.progress = 100.0;
            torrent.name = name.to_string();
        }
    }

    /// Drop a torrent without going through `remove_torrent`
    pub fn lose(&self, hash: &str) {
        lock(&self.state).torrents.remove(&hash.to_ascii_lowercase());
    }

    pub fn fail_link(&self, link: &str) {
        lock(&self.state).failing_links.insert(link.to_string());
    }

    pub fn fail_lookup(&self, hash: &str) {
        lock(&self.state).failing_lookups.insert(hash.to_ascii_lowercase());
    }

    /// Make `get_torrents` fail until further notice
    pub fn fail_listing(&self) {
        lock(&self.state).failing_listing = true;
    }

    pub fn contains(&self, hash: &str) -> bool {
        lock(&self.state).torrents.contains_key(&hash.to_ascii_lowercase())
    }

    /// Links accepted by `add_torrent`, in call order
    pub fn added(&self) -> Vec<String> {
        lock(&self.state).added.clone()
    }

    /// Hashes passed to `remove_torrent`, in call order
    pub fn removed(&self) -> Vec<String> {
        lock(&self.state).removed.clone()
    }
}

#[async_trait]
impl TorrentClient for FakeTorrentClient {
    async fn add_torrent(&self, link: &str) -> PipelineResult<()> {
        let mut state = lock(&self.state);
        if state.failing_links.contains(link) {
            return Err(PipelineError::Rpc(format!("torrent-add: invalid or corrupt torrent {}", link)));
        }
        let hash = if link.starts_with("magnet:") {
            hash_from_magnet(link)?
        } else {
            hash_from_url_path(link)?
        };
        state.added.push(link.to_string());
        state.torrents.entry(hash.clone()).or_insert(TorrentInfo {
            name: hash.clone(),
            hash,
            progress: 0.0,
            status: 4,
            download_dir: Some("/downloads".to_string()),
            magnet_link: link.starts_with("magnet:").then(|| link.to_string()),
        });
        Ok(())
    }

    async fn get_torrents(&self) -> PipelineResult<Vec<TorrentInfo>> {
        let state = lock(&self.state);
        if state.failing_listing {
            return Err(PipelineError::Rpc("torrent-get failed".to_string()));
        }
        Ok(state.torrents.values().cloned().collect())
    }

    async fn get_torrent(&self, hash: &str) -> PipelineResult<Option<TorrentInfo>> {
        let state = lock(&self.state);
        let hash = hash.to_ascii_lowercase();
        if state.failing_lookups.contains(&hash) {
            return Err(PipelineError::Rpc(format!("torrent-get failed for {}", hash)));
        }
        Ok(state.torrents.get(&hash).cloned())
    }

    async fn remove_torrent(&self, hash: &str) -> PipelineResult<()> {
        let mut state = lock(&self.state);
        let hash = hash.to_ascii_lowercase();
        state.torrents.remove(&hash);
        state.removed.push(hash);
        Ok(())
    }
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Default)]
struct MetadataState {
    hits: HashMap<String, SearchHit>,
    details: HashMap<i64, MediaDetails>,
    ratings: HashMap<String, Ratings>,
    failing_searches: HashSet<String>,
    search_calls: usize,
    details_calls: usize,
    ratings_calls: usize,
}

/// Search, details and ratings served from maps.
///
/// Searches are keyed by title; ratings by imdb id, falling back to title.
#[derive(Default)]
pub struct FakeMetadataProvider {
    state: Mutex<MetadataState>,
}

impl FakeMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(self, title: &str, tmdb_id: i64, canonical: &str) -> Self {
        lock(&self.state).hits.insert(
            title.to_string(),
            SearchHit {
                tmdb_id,
                title: canonical.to_string(),
            },
        );
        self
    }

    pub fn with_details(self, tmdb_id: i64, details: MediaDetails) -> Self {
        lock(&self.state).details.insert(tmdb_id, details);
        self
    }

    pub fn with_ratings(self, key: &str, ratings: Ratings) -> Self {
        lock(&self.state).ratings.insert(key.to_string(), ratings);
        self
    }

    /// Make searches for `title` answer HTTP 503
    pub fn with_failing_search(self, title: &str) -> Self {
        lock(&self.state).failing_searches.insert(title.to_string());
        self
    }

    pub fn search_calls(&self) -> usize {
        lock(&self.state).search_calls
    }

    pub fn details_calls(&self) -> usize {
        lock(&self.state).details_calls
    }

    pub fn ratings_calls(&self) -> usize {
        lock(&self.state).ratings_calls
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadataProvider {
    async fn search(
        &self,
        _media_type: MediaType,
        title: &str,
        _year: Option<i32>,
    ) -> PipelineResult<Option<SearchHit>> {
        let mut state = lock(&self.state);
        state.search_calls += 1;
        if state.failing_searches.contains(title) {
            return Err(PipelineError::HttpStatus {
                service: "tmdb",
                status: 503,
            });
        }
        Ok(state.hits.get(title).cloned())
    }

    async fn details(&self, _media_type: MediaType, tmdb_id: i64) -> PipelineResult<MediaDetails> {
        let mut state = lock(&self.state);
        state.details_calls += 1;
        state.details.get(&tmdb_id).cloned().ok_or(PipelineError::HttpStatus {
            service: "tmdb",
            status: 404,
        })
    }

    async fn ratings(
        &self,
        imdb_id: Option<&str>,
        title: &str,
        _year: Option<i32>,
    ) -> PipelineResult<Option<Ratings>> {
        let mut state = lock(&self.state);
        state.ratings_calls += 1;
        let by_id = imdb_id.and_then(|id| state.ratings.get(id));
        Ok(by_id.or_else(|| state.ratings.get(title)).cloned())
    }
}

// ============================================================================
// Recommendation
// ============================================================================

#[derive(Default)]
struct RecommenderState {
    probabilities: HashMap<String, f64>,
    failing: HashSet<String>,
    batch_fails: bool,
    batch_calls: usize,
    predict_calls: usize,
}

/// Fixed probabilities per imdb id
#[derive(Default)]
pub struct FakeRecommender {
    state: Mutex<RecommenderState>,
}

impl FakeRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_probability(self, imdb_id: &str, probability: f64) -> Self {
        lock(&self.state)
            .probabilities
            .insert(imdb_id.to_string(), probability);
        self
    }

    /// Make single predictions for `imdb_id` fail
    pub fn with_failing(self, imdb_id: &str) -> Self {
        lock(&self.state).failing.insert(imdb_id.to_string());
        self
    }

    /// Make every batch call answer HTTP 500
    pub fn with_failing_batch(self) -> Self {
        lock(&self.state).batch_fails = true;
        self
    }

    pub fn batch_calls(&self) -> usize {
        lock(&self.state).batch_calls
    }

    pub fn predict_calls(&self) -> usize {
        lock(&self.state).predict_calls
    }
}

#[async_trait]
impl Recommender for FakeRecommender {
    async fn predict(&self, input: &PredictionInput) -> PipelineResult<f64> {
        let mut state = lock(&self.state);
        state.predict_calls += 1;
        if state.failing.contains(&input.imdb_id) {
            return Err(PipelineError::HttpStatus {
                service: "reel-driver",
                status: 500,
            });
        }
        state
            .probabilities
            .get(&input.imdb_id)
            .copied()
            .ok_or_else(|| PipelineError::not_found("prediction", &input.imdb_id))
    }

    async fn predict_batch(&self, inputs: &[PredictionInput]) -> PipelineResult<HashMap<String, f64>> {
        let mut state = lock(&self.state);
        state.batch_calls += 1;
        if state.batch_fails {
            return Err(PipelineError::HttpStatus {
                service: "reel-driver",
                status: 500,
            });
        }
        Ok(inputs
            .iter()
            .filter_map(|input| {
                state
                    .probabilities
                    .get(&input.imdb_id)
                    .map(|p| (input.imdb_id.clone(), *p))
            })
            .collect())
    }
}

// ============================================================================
// RSS
// ============================================================================

/// Feeds keyed by URL; unknown URLs answer HTTP 404
#[derive(Default)]
pub struct FakeFeedSource {
    feeds: Mutex<HashMap<String, Vec<FeedEntry>>>,
}

impl FakeFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(self, url: &str, entries: Vec<FeedEntry>) -> Self {
        lock(&self.feeds).insert(url.to_string(), entries);
        self
    }
}

#[async_trait]
impl FeedSource for FakeFeedSource {
    async fn fetch_feed(&self, url: &str) -> PipelineResult<Vec<FeedEntry>> {
        lock(&self.feeds)
            .get(url)
            .cloned()
            .ok_or(PipelineError::HttpStatus {
                service: "rss",
                status: 404,
            })
    }
}
