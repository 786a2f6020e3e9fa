//! Transmission JSON-RPC client

use super::{TorrentClient, TorrentInfo};
use crate::config::TransmissionConfig;
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::Mutex;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const TORRENT_FIELDS: [&str; 6] = [
    "hashString",
    "name",
    "percentDone",
    "status",
    "downloadDir",
    "magnetLink",
];

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: String,
    arguments: Option<T>,
}

#[derive(Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<RpcTorrent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTorrent {
    hash_string: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    status: i64,
    download_dir: Option<String>,
    magnet_link: Option<String>,
}

impl From<RpcTorrent> for TorrentInfo {
    fn from(t: RpcTorrent) -> Self {
        Self {
            hash: t.hash_string.to_ascii_lowercase(),
            name: t.name,
            progress: t.percent_done * 100.0,
            status: t.status,
            download_dir: t.download_dir,
            magnet_link: t.magnet_link,
        }
    }
}

/// Client for the daemon's `/transmission/rpc` endpoint
pub struct TransmissionClient {
    client: Client,
    rpc_url: String,
    username: Option<String>,
    password: Option<String>,
    session_id: Mutex<Option<String>>,
}

impl TransmissionClient {
    pub fn new(config: &TransmissionConfig, request_timeout_secs: u64) -> PipelineResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            session_id: Mutex::new(None),
        })
    }

    async fn send(&self, body: &RpcRequest<'_>) -> PipelineResult<reqwest::Response> {
        let mut request = self.client.post(&self.rpc_url).json(body);
        if let Some(ref user) = self.username {
            request = request.basic_auth(user, self.password.as_ref());
        }
        if let Some(ref id) = *self.session_id.lock().await {
            request = request.header(SESSION_HEADER, id);
        }
        Ok(request.send().await?)
    }

    /// Issue one RPC call, renewing the session id once on HTTP 409
    async fn call<T: DeserializeOwned>(&self, method: &str, arguments: Value) -> PipelineResult<T> {
        let body = RpcRequest { method, arguments };

        let mut response = self.send(&body).await?;
        if response.status() == StatusCode::CONFLICT {
            let id = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
                .ok_or_else(|| PipelineError::Rpc("409 without session id".to_string()))?;
            tracing::debug!("Renewed Transmission session id");
            *self.session_id.lock().await = Some(id);
            response = self.send(&body).await?;
        }

        let response = PipelineError::check_status("transmission", response)?;
        let parsed: RpcResponse<T> = response.json().await?;
        if parsed.result != "success" {
            return Err(PipelineError::Rpc(format!("{}: {}", method, parsed.result)));
        }
        parsed
            .arguments
            .ok_or_else(|| PipelineError::Rpc(format!("{}: response has no arguments", method)))
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    async fn add_torrent(&self, link: &str) -> PipelineResult<()> {
        // torrent-added and torrent-duplicate are both fine
        let _: Value = self.call("torrent-add", json!({ "filename": link })).await?;
        Ok(())
    }

    async fn get_torrents(&self) -> PipelineResult<Vec<TorrentInfo>> {
        let list: TorrentList = self
            .call("torrent-get", json!({ "fields": TORRENT_FIELDS }))
            .await?;
        Ok(list.torrents.into_iter().map(Into::into).collect())
    }

    async fn get_torrent(&self, hash: &str) -> PipelineResult<Option<TorrentInfo>> {
        let list: TorrentList = self
            .call(
                "torrent-get",
                json!({ "ids": [hash], "fields": TORRENT_FIELDS }),
            )
            .await?;
        Ok(list
            .torrents
            .into_iter()
            .map(TorrentInfo::from)
            .find(|t| t.hash.eq_ignore_ascii_case(hash)))
    }

    async fn remove_torrent(&self, hash: &str) -> PipelineResult<()> {
        let _: Value = self
            .call(
                "torrent-remove",
                json!({ "ids": [hash], "delete-local-data": true }),
            )
            .await?;
        Ok(())
    }
}
