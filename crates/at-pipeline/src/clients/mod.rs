//! External collaborators
//!
//! Each service the stages depend on sits behind a trait so stages can be
//! driven by the in-memory fakes in [`crate::testing`]. The HTTP
//! implementations live in the submodules.

use crate::error::PipelineResult;
use async_trait::async_trait;
use at_common::types::{MediaItem, MediaType};
use serde::Serialize;
use std::collections::HashMap;

mod metadata;
mod omdb;
mod reel_driver;
mod rss;
mod tmdb;
mod transmission;

pub use metadata::HttpMetadataProvider;
pub use omdb::{digits_only, rating_value, OmdbClient};
pub use reel_driver::ReelDriverClient;
pub use rss::{parse_feed, RssClient};
pub use tmdb::TmdbClient;
pub use transmission::TransmissionClient;

// ============================================================================
// Torrent daemon
// ============================================================================

/// A torrent as reported by the daemon
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentInfo {
    /// Lowercase info-hash
    pub hash: String,
    /// On-disk name; equals the hash until metadata has been fetched
    pub name: String,
    /// Completion in percent, 0.0 to 100.0
    pub progress: f64,
    /// Daemon status code
    pub status: i64,
    pub download_dir: Option<String>,
    pub magnet_link: Option<String>,
}

#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Submit a `.torrent` URL or magnet URI
    async fn add_torrent(&self, link: &str) -> PipelineResult<()>;

    async fn get_torrents(&self) -> PipelineResult<Vec<TorrentInfo>>;

    /// `None` when the daemon does not know the hash
    async fn get_torrent(&self, hash: &str) -> PipelineResult<Option<TorrentInfo>>;

    /// Remove the torrent and its local data
    async fn remove_torrent(&self, hash: &str) -> PipelineResult<()>;
}

// ============================================================================
// Metadata
// ============================================================================

/// First search hit
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub tmdb_id: i64,
    /// Canonical title as the provider spells it
    pub title: String,
}

/// Detail fields fetched by tmdb id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaDetails {
    pub release_year: Option<i32>,
    pub imdb_id: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub runtime: Option<i32>,
    pub origin_country: Option<Vec<String>>,
    pub production_companies: Option<Vec<String>>,
    pub production_countries: Option<Vec<String>>,
    pub production_status: Option<String>,
    pub original_language: Option<String>,
    pub spoken_languages: Option<Vec<String>>,
    pub genre: Option<Vec<String>>,
    pub original_media_title: Option<String>,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub tmdb_rating: Option<f64>,
    pub tmdb_votes: Option<i64>,
}

impl MediaDetails {
    pub fn apply_to(&self, item: &mut MediaItem) {
        item.release_year = self.release_year.or(item.release_year);
        if item.imdb_id.is_none() {
            item.imdb_id = self.imdb_id.clone();
        }
        item.budget = self.budget;
        item.revenue = self.revenue;
        item.runtime = self.runtime;
        item.origin_country = self.origin_country.clone();
        item.production_companies = self.production_companies.clone();
        item.production_countries = self.production_countries.clone();
        item.production_status = self.production_status.clone();
        item.original_language = self.original_language.clone();
        item.spoken_languages = self.spoken_languages.clone();
        item.genre = self.genre.clone();
        item.original_media_title = self.original_media_title.clone();
        item.tagline = self.tagline.clone();
        item.overview = self.overview.clone();
        item.tmdb_rating = self.tmdb_rating;
        item.tmdb_votes = self.tmdb_votes;
    }
}

/// Ratings fetched by imdb id or title
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ratings {
    pub imdb_id: Option<String>,
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
    pub metascore: Option<i32>,
    pub rt_score: Option<i32>,
}

impl Ratings {
    /// Rotten Tomatoes scores are kept for movies only
    pub fn apply_to(&self, item: &mut MediaItem) {
        if item.imdb_id.is_none() {
            item.imdb_id = self.imdb_id.clone();
        }
        item.imdb_rating = self.imdb_rating;
        item.imdb_votes = self.imdb_votes;
        item.metascore = self.metascore;
        if item.media_type == MediaType::Movie {
            item.rt_score = self.rt_score;
        }
    }
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `None` when the provider has no match
    async fn search(
        &self,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<SearchHit>>;

    async fn details(&self, media_type: MediaType, tmdb_id: i64) -> PipelineResult<MediaDetails>;

    /// `None` when the provider has no ratings for the item
    async fn ratings(
        &self,
        imdb_id: Option<&str>,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<Ratings>>;
}

// ============================================================================
// Recommendation
// ============================================================================

/// Feature payload sent to the recommendation model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionInput {
    pub imdb_id: String,
    pub release_year: Option<i32>,
    pub genre: Option<Vec<String>>,
    pub spoken_languages: Option<Vec<String>>,
    pub original_language: Option<String>,
    pub origin_country: Option<Vec<String>>,
    pub production_countries: Option<Vec<String>>,
    pub production_status: Option<String>,
    pub tmdb_rating: Option<f64>,
    pub tmdb_votes: Option<i64>,
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
    pub rt_score: Option<i32>,
    pub metascore: Option<i32>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub runtime: Option<i32>,
    pub tagline: Option<String>,
    pub overview: Option<String>,
}

impl PredictionInput {
    /// `None` without an imdb id
    pub fn from_item(item: &MediaItem) -> Option<Self> {
        Some(Self {
            imdb_id: item.imdb_id.clone()?,
            release_year: item.release_year,
            genre: item.genre.clone(),
            spoken_languages: item.spoken_languages.clone(),
            original_language: item.original_language.clone(),
            origin_country: item.origin_country.clone(),
            production_countries: item.production_countries.clone(),
            production_status: item.production_status.clone(),
            tmdb_rating: item.tmdb_rating,
            tmdb_votes: item.tmdb_votes,
            imdb_rating: item.imdb_rating,
            imdb_votes: item.imdb_votes,
            rt_score: item.rt_score,
            metascore: item.metascore,
            budget: item.budget,
            revenue: item.revenue,
            runtime: item.runtime,
            tagline: item.tagline.clone(),
            overview: item.overview.clone(),
        })
    }
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn predict(&self, input: &PredictionInput) -> PipelineResult<f64>;

    /// Probabilities keyed by imdb id; ids the model could not score are absent
    async fn predict_batch(&self, inputs: &[PredictionInput]) -> PipelineResult<HashMap<String, f64>>;
}

// ============================================================================
// RSS
// ============================================================================

/// One `<item>` of a feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    /// `[link, enclosure urls...]`
    pub links: Vec<String>,
    pub tv_show_name: Option<String>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> PipelineResult<Vec<FeedEntry>>;
}
