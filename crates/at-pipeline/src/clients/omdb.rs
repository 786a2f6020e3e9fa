//! OMDb ratings lookup

use super::Ratings;
use crate::config::MetadataConfig;
use crate::error::{PipelineError, PipelineResult};
use reqwest::Client;
use serde::Deserialize;
use url::Url;

const ROTTEN_TOMATOES: &str = "Rotten Tomatoes";

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbResponse {
    response: String,
    #[serde(rename = "imdbID")]
    imdb_id: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
    metascore: Option<String>,
    #[serde(default)]
    ratings: Vec<OmdbRating>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OmdbRating {
    source: String,
    value: String,
}

fn available(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty() && *v != "N/A")
}

/// Strip every non-digit: `"1,234"` -> 1234, `"45%"` -> 45
pub fn digits_only<T: std::str::FromStr>(value: Option<&str>) -> Option<T> {
    let digits: String = available(value)?.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Keep digits and the decimal point: `"6.3/10"` -> 6.3
pub fn rating_value(value: Option<&str>) -> Option<f64> {
    let raw = available(value)?;
    let head = raw.split('/').next().unwrap_or(raw);
    let cleaned: String = head
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().ok()
}

impl From<OmdbResponse> for Ratings {
    fn from(body: OmdbResponse) -> Self {
        let rt_score = body
            .ratings
            .iter()
            .find(|r| r.source == ROTTEN_TOMATOES)
            .and_then(|r| digits_only(Some(r.value.as_str())));

        Self {
            imdb_id: available(body.imdb_id.as_deref()).map(str::to_string),
            imdb_rating: rating_value(body.imdb_rating.as_deref()),
            imdb_votes: digits_only(body.imdb_votes.as_deref()),
            metascore: digits_only(body.metascore.as_deref()),
            rt_score,
        }
    }
}

pub struct OmdbClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OmdbClient {
    pub fn new(client: Client, config: &MetadataConfig) -> Self {
        Self {
            client,
            base_url: config.omdb_base_url.trim_end_matches('/').to_string(),
            api_key: config.omdb_api_key.clone(),
        }
    }

    /// Lookup by imdb id when known, otherwise by title and year
    pub async fn ratings(
        &self,
        imdb_id: Option<&str>,
        title: &str,
        year: Option<i32>,
    ) -> PipelineResult<Option<Ratings>> {
        let mut url = Url::parse(&format!("{}/", self.base_url))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("apikey", &self.api_key);
            match imdb_id {
                Some(id) => {
                    query.append_pair("i", id);
                }
                None => {
                    query.append_pair("t", title);
                    if let Some(year) = year {
                        query.append_pair("y", &year.to_string());
                    }
                }
            }
        }

        let response = self.client.get(url).send().await?;
        let body: OmdbResponse = PipelineError::check_status("omdb", response)?.json().await?;

        if !body.response.eq_ignore_ascii_case("true") {
            tracing::debug!(?imdb_id, title, "OMDb has no ratings");
            return Ok(None);
        }
        Ok(Some(body.into()))
    }
}
