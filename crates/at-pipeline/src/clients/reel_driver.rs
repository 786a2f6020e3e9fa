//! reel-driver recommendation client

use super::{PredictionInput, Recommender};
use crate::config::ReelDriverConfig;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Deserialize)]
struct PredictResponse {
    probability: f64,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    items: &'a [PredictionInput],
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Deserialize)]
struct BatchResult {
    imdb_id: String,
    probability: Option<f64>,
}

pub struct ReelDriverClient {
    client: Client,
    base_url: String,
}

impl ReelDriverClient {
    pub fn new(config: &ReelDriverConfig, timeout_secs: u64) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Recommender for ReelDriverClient {
    async fn predict(&self, input: &PredictionInput) -> PipelineResult<f64> {
        let url = format!("{}/api/predict", self.base_url);
        let response = self.client.post(&url).json(input).send().await?;
        let body: PredictResponse = PipelineError::check_status("reel-driver", response)?
            .json()
            .await?;
        Ok(body.probability)
    }

    async fn predict_batch(&self, inputs: &[PredictionInput]) -> PipelineResult<HashMap<String, f64>> {
        let url = format!("{}/api/predict_batch", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&BatchRequest { items: inputs })
            .send()
            .await?;
        let body: BatchResponse = PipelineError::check_status("reel-driver", response)?
            .json()
            .await?;

        Ok(body
            .results
            .into_iter()
            .filter_map(|r| r.probability.map(|p| (r.imdb_id, p)))
            .collect())
    }
}
