use super::{MediaDetails, MetadataProvider, OmdbClient, Ratings, SearchHit, TmdbClient};
use crate::config::MetadataConfig;
use crate::error::PipelineResult;
use async_trait::async_trait;
use at_common::types::MediaType;
use reqwest::Client;
use std::time::Duration;

/// TMDB for search and details, OMDb for ratings
pub struct HttpMetadataProvider {
    tmdb: TmdbClient,
    omdb: OmdbClient,
}

impl HttpMetadataProvider {
    pub fn new(config: &MetadataConfig, timeout_secs: u64) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            tmdb: TmdbClient::new(client.clone(), config),
            omdb: OmdbClient::new(client, config),
        })
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn search(
        &self,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<SearchHit>> {
        self.tmdb.search(media_type, title, year).await
    }

    async fn details(&self, media_type: MediaType, tmdb_id: i64) -> PipelineResult<MediaDetails> {
        self.tmdb.details(media_type, tmdb_id).await
    }

    async fn ratings(
        &self,
        imdb_id: Option<&str>,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<Ratings>> {
        self.omdb.ratings(imdb_id, title, year).await
    }
}
