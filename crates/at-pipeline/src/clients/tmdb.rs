//! TMDB search and detail lookups

use super::{MediaDetails, SearchHit};
use crate::config::MetadataConfig;
use crate::error::{PipelineError, PipelineResult};
use at_common::types::MediaType;
use at_common::AtError;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: i64,
    title: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct Named {
    name: String,
}

#[derive(Deserialize)]
struct Country {
    iso_3166_1: String,
}

#[derive(Deserialize)]
struct Language {
    iso_639_1: String,
}

#[derive(Deserialize)]
struct ExternalIds {
    imdb_id: Option<String>,
}

/// Union of the movie and tv detail bodies
#[derive(Deserialize)]
struct DetailsResponse {
    imdb_id: Option<String>,
    external_ids: Option<ExternalIds>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    budget: Option<i64>,
    revenue: Option<i64>,
    runtime: Option<i32>,
    episode_run_time: Option<Vec<i32>>,
    origin_country: Option<Vec<String>>,
    production_companies: Option<Vec<Named>>,
    production_countries: Option<Vec<Country>>,
    status: Option<String>,
    original_language: Option<String>,
    spoken_languages: Option<Vec<Language>>,
    genres: Option<Vec<Named>>,
    original_title: Option<String>,
    original_name: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<i64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `2010-10-20` -> 2010
fn year_of(date: Option<&str>) -> Option<i32> {
    date.and_then(|d| d.get(..4)).and_then(|y| y.parse().ok())
}

impl From<DetailsResponse> for MediaDetails {
    fn from(body: DetailsResponse) -> Self {
        let release_year = year_of(body.release_date.as_deref().or(body.first_air_date.as_deref()));
        let imdb_id = non_empty(body.imdb_id).or_else(|| non_empty(body.external_ids.and_then(|e| e.imdb_id)));

        Self {
            release_year,
            imdb_id,
            budget: body.budget,
            revenue: body.revenue,
            runtime: body
                .runtime
                .or_else(|| body.episode_run_time.and_then(|r| r.first().copied())),
            origin_country: body.origin_country,
            production_companies: body
                .production_companies
                .map(|v| v.into_iter().map(|c| c.name).collect()),
            production_countries: body
                .production_countries
                .map(|v| v.into_iter().map(|c| c.iso_3166_1).collect()),
            production_status: non_empty(body.status),
            original_language: non_empty(body.original_language),
            spoken_languages: body
                .spoken_languages
                .map(|v| v.into_iter().map(|l| l.iso_639_1).collect()),
            genre: body.genres.map(|v| v.into_iter().map(|g| g.name).collect()),
            original_media_title: non_empty(body.original_title).or(non_empty(body.original_name)),
            tagline: non_empty(body.tagline),
            overview: non_empty(body.overview),
            tmdb_rating: body.vote_average,
            tmdb_votes: body.vote_count,
        }
    }
}

/// Path segment TMDB uses for a media type
fn kind(media_type: MediaType) -> PipelineResult<&'static str> {
    match media_type {
        MediaType::Movie => Ok("movie"),
        MediaType::TvShow | MediaType::TvSeason | MediaType::TvEpisodePack => Ok("tv"),
        MediaType::Unknown => Err(AtError::invalid_enum("media_type", "unknown").into()),
    }
}

pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(client: Client, config: &MetadataConfig) -> Self {
        Self {
            client,
            base_url: config.tmdb_base_url.trim_end_matches('/').to_string(),
            api_key: config.tmdb_api_key.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> PipelineResult<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path))?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    pub async fn search(
        &self,
        media_type: MediaType,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<SearchHit>> {
        let kind = kind(media_type)?;
        let mut url = self.endpoint(&format!("search/{}", kind))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("query", title);
            if let Some(year) = year {
                let key = if kind == "movie" { "year" } else { "first_air_date_year" };
                query.append_pair(key, &year.to_string());
            }
        }

        tracing::debug!(kind, title, ?year, "Searching TMDB");
        let response = self.client.get(url).send().await?;
        let body: SearchResponse = PipelineError::check_status("tmdb", response)?.json().await?;

        Ok(body.results.into_iter().next().map(|hit| SearchHit {
            tmdb_id: hit.id,
            title: hit.title.or(hit.name).unwrap_or_else(|| title.to_string()),
        }))
    }

    pub async fn details(&self, media_type: MediaType, tmdb_id: i64) -> PipelineResult<MediaDetails> {
        let kind = kind(media_type)?;
        let mut url = self.endpoint(&format!("{}/{}", kind, tmdb_id))?;
        if kind == "tv" {
            url.query_pairs_mut()
                .append_pair("append_to_response", "external_ids");
        }

        let response = self.client.get(url).send().await?;
        let body: DetailsResponse = PipelineError::check_status("tmdb", response)?.json().await?;
        Ok(body.into())
    }
}
