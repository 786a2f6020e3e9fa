//! Configuration management
//!
//! Every variable is read once at process start into [`Settings`], which is
//! then passed explicitly to each component. Unparsable values and policy
//! violations are fatal: the stage exits before touching any row.

use crate::db::DbConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::filter::FilterConfig;
use crate::parser::ParserConfig;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default TMDB API base URL.
pub const DEFAULT_TMDB_API_BASE_URL: &str = "https://api.themoviedb.org/3";

/// Default OMDb API base URL.
pub const DEFAULT_OMDB_API_BASE_URL: &str = "https://www.omdbapi.com";

/// Default Transmission RPC endpoint.
pub const DEFAULT_TRANSMISSION_RPC_URL: &str = "http://localhost:9091/transmission/rpc";

/// Default reel-driver host.
pub const DEFAULT_REEL_DRIVER_HOST: &str = "localhost";

/// Default reel-driver port.
pub const DEFAULT_REEL_DRIVER_PORT: u16 = 8000;

/// Default reel-driver path prefix.
pub const DEFAULT_REEL_DRIVER_PREFIX: &str = "reel-driver";

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default minimum probability for a movie to be accepted.
pub const DEFAULT_REEL_DRIVER_THRESHOLD: f64 = 0.35;

/// Default delay before a transferred torrent is removed (1 day).
pub const DEFAULT_TRANSFERRED_ITEM_CLEANUP_DELAY_SECS: i64 = 86_400;

/// Default age after which a download is considered hung (3 days).
pub const DEFAULT_HUNG_ITEM_CLEANUP_DELAY_SECS: i64 = 259_200;

/// Default target for active torrents; 0 disables delay scaling.
pub const DEFAULT_TARGET_ACTIVE_ITEMS: i64 = 0;

/// Default age after which stored metadata is re-fetched (30 days).
pub const DEFAULT_STALE_METADATA_THRESHOLD_SECS: i64 = 2_592_000;

/// Default owner uid for transferred files.
pub const DEFAULT_UID: u32 = 1005;

/// Default owner gid for transferred files.
pub const DEFAULT_GID: u32 = 1001;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default Transmission connect timeout in seconds.
pub const DEFAULT_RPC_CONNECT_TIMEOUT_SECS: u64 = 10;

/// One RSS feed to ingest
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    /// Source tag, e.g. `yts.mx` or `episodefeed.com`
    pub source: String,
    pub url: String,
}

/// Transmission daemon connection settings
#[derive(Debug, Clone)]
pub struct TransmissionConfig {
    pub rpc_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
}

/// Metadata provider settings
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub tmdb_base_url: String,
    pub tmdb_api_key: String,
    pub omdb_base_url: String,
    pub omdb_api_key: String,
}

/// Recommendation service settings
#[derive(Debug, Clone)]
pub struct ReelDriverConfig {
    pub host: String,
    pub port: u16,
    pub prefix: String,
    pub threshold: f64,
}

impl ReelDriverConfig {
    /// `http://host:port/prefix`, prefix omitted when empty
    pub fn base_url(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("http://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}/{}", self.host, self.port, prefix)
        }
    }
}

/// Cleanup timing
#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    pub transferred_delay_secs: i64,
    pub hung_delay_secs: i64,
    pub target_active_items: i64,
}

/// Library layout and ownership for transfers
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub download_dir: PathBuf,
    pub movie_dir: PathBuf,
    pub tv_show_dir: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

/// Immutable settings for one stage invocation
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: DbConfig,
    pub feeds: Vec<FeedSpec>,
    pub transmission: TransmissionConfig,
    pub metadata: MetadataConfig,
    pub reel_driver: ReelDriverConfig,
    pub cleanup: CleanupConfig,
    pub transfer: TransferConfig,
    pub batch_size: usize,
    pub stale_metadata_threshold_secs: i64,
    pub http_timeout_secs: u64,
    pub parser: ParserConfig,
    pub filter: FilterConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DbConfig::default(),
            feeds: Vec::new(),
            transmission: TransmissionConfig {
                rpc_url: DEFAULT_TRANSMISSION_RPC_URL.to_string(),
                username: None,
                password: None,
                connect_timeout_secs: DEFAULT_RPC_CONNECT_TIMEOUT_SECS,
            },
            metadata: MetadataConfig {
                tmdb_base_url: DEFAULT_TMDB_API_BASE_URL.to_string(),
                tmdb_api_key: String::new(),
                omdb_base_url: DEFAULT_OMDB_API_BASE_URL.to_string(),
                omdb_api_key: String::new(),
            },
            reel_driver: ReelDriverConfig {
                host: DEFAULT_REEL_DRIVER_HOST.to_string(),
                port: DEFAULT_REEL_DRIVER_PORT,
                prefix: DEFAULT_REEL_DRIVER_PREFIX.to_string(),
                threshold: DEFAULT_REEL_DRIVER_THRESHOLD,
            },
            cleanup: CleanupConfig {
                transferred_delay_secs: DEFAULT_TRANSFERRED_ITEM_CLEANUP_DELAY_SECS,
                hung_delay_secs: DEFAULT_HUNG_ITEM_CLEANUP_DELAY_SECS,
                target_active_items: DEFAULT_TARGET_ACTIVE_ITEMS,
            },
            transfer: TransferConfig {
                download_dir: PathBuf::from("/downloads"),
                movie_dir: PathBuf::from("/movies"),
                tv_show_dir: PathBuf::from("/tv"),
                uid: DEFAULT_UID,
                gid: DEFAULT_GID,
            },
            batch_size: DEFAULT_BATCH_SIZE,
            stale_metadata_threshold_secs: DEFAULT_STALE_METADATA_THRESHOLD_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            parser: ParserConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

/// Parse an optional variable, falling back to `default` when unset or blank
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> PipelineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::config(format!("{} = '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn string_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

impl Settings {
    /// Load settings from the process environment (and `.env` when present)
    pub fn from_env() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let database = DbConfig {
            url: lookup("DATABASE_URL")
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PipelineError::config("DATABASE_URL not set"))?,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", crate::db::DEFAULT_MAX_CONNECTIONS)?,
            connect_timeout_secs: parse_or(
                &lookup,
                "DB_CONNECT_TIMEOUT",
                crate::db::DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        let sources = split_list(lookup("RSS_SOURCES"));
        let urls = split_list(lookup("RSS_URLS"));
        if sources.len() != urls.len() {
            return Err(PipelineError::config(format!(
                "RSS_SOURCES has {} entries but RSS_URLS has {}",
                sources.len(),
                urls.len()
            )));
        }
        let feeds = sources
            .into_iter()
            .zip(urls)
            .map(|(source, url)| FeedSpec { source, url })
            .collect();

        let parser = match lookup("PARSE_CONFIG").filter(|v| !v.trim().is_empty()) {
            Some(path) => ParserConfig::from_yaml_file(&path)?,
            None => ParserConfig::default(),
        };
        let filter = match lookup("FILE_FILTER_CONFIG").filter(|v| !v.trim().is_empty()) {
            Some(path) => FilterConfig::from_yaml_file(&path)?,
            None => FilterConfig::default(),
        };

        let settings = Self {
            database,
            feeds,
            transmission: TransmissionConfig {
                rpc_url: string_or(&lookup, "TRANSMISSION_RPC_URL", DEFAULT_TRANSMISSION_RPC_URL),
                username: lookup("TRANSMISSION_USERNAME").filter(|v| !v.is_empty()),
                password: lookup("TRANSMISSION_PASSWORD").filter(|v| !v.is_empty()),
                connect_timeout_secs: parse_or(
                    &lookup,
                    "RPC_CONNECT_TIMEOUT_SECS",
                    DEFAULT_RPC_CONNECT_TIMEOUT_SECS,
                )?,
            },
            metadata: MetadataConfig {
                tmdb_base_url: string_or(&lookup, "TMDB_API_BASE_URL", DEFAULT_TMDB_API_BASE_URL),
                tmdb_api_key: string_or(&lookup, "TMDB_API_KEY", ""),
                omdb_base_url: string_or(&lookup, "OMDB_API_BASE_URL", DEFAULT_OMDB_API_BASE_URL),
                omdb_api_key: string_or(&lookup, "OMDB_API_KEY", ""),
            },
            reel_driver: ReelDriverConfig {
                host: string_or(&lookup, "REEL_DRIVER_HOST", DEFAULT_REEL_DRIVER_HOST),
                port: parse_or(&lookup, "REEL_DRIVER_PORT", DEFAULT_REEL_DRIVER_PORT)?,
                prefix: lookup("REEL_DRIVER_PREFIX")
                    .unwrap_or_else(|| DEFAULT_REEL_DRIVER_PREFIX.to_string()),
                threshold: parse_or(&lookup, "REEL_DRIVER_THRESHOLD", DEFAULT_REEL_DRIVER_THRESHOLD)?,
            },
            cleanup: CleanupConfig {
                transferred_delay_secs: parse_or(
                    &lookup,
                    "TRANSFERRED_ITEM_CLEANUP_DELAY",
                    DEFAULT_TRANSFERRED_ITEM_CLEANUP_DELAY_SECS,
                )?,
                hung_delay_secs: parse_or(
                    &lookup,
                    "HUNG_ITEM_CLEANUP_DELAY",
                    DEFAULT_HUNG_ITEM_CLEANUP_DELAY_SECS,
                )?,
                target_active_items: parse_or(&lookup, "TARGET_ACTIVE_ITEMS", DEFAULT_TARGET_ACTIVE_ITEMS)?,
            },
            transfer: TransferConfig {
                download_dir: PathBuf::from(string_or(&lookup, "DOWNLOAD_DIR", "/downloads")),
                movie_dir: PathBuf::from(string_or(&lookup, "AT_MOVIE_DIR", "/movies")),
                tv_show_dir: PathBuf::from(string_or(&lookup, "AT_TV_SHOW_DIR", "/tv")),
                uid: parse_or(&lookup, "AT_UID", DEFAULT_UID)?,
                gid: parse_or(&lookup, "AT_GID", DEFAULT_GID)?,
            },
            batch_size: parse_or(&lookup, "BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            stale_metadata_threshold_secs: parse_or(
                &lookup,
                "STALE_METADATA_THRESHOLD",
                DEFAULT_STALE_METADATA_THRESHOLD_SECS,
            )?,
            http_timeout_secs: parse_or(&lookup, "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
            parser,
            filter,
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    pub fn validate(&self) -> PipelineResult<()> {
        if self.database.url.is_empty() {
            return Err(PipelineError::config("DATABASE_URL cannot be empty"));
        }

        if self.database.max_connections == 0 {
            return Err(PipelineError::config("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.batch_size == 0 {
            return Err(PipelineError::config("BATCH_SIZE must be greater than 0"));
        }

        let threshold = self.reel_driver.threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::config(format!(
                "REEL_DRIVER_THRESHOLD {} must be within [0, 1]",
                threshold
            )));
        }

        self.cleanup.validate()?;

        if self.stale_metadata_threshold_secs < 0 {
            return Err(PipelineError::config("STALE_METADATA_THRESHOLD cannot be negative"));
        }

        if self.metadata.tmdb_api_key.is_empty() {
            tracing::warn!("TMDB_API_KEY is not set - metadata search will fail");
        }

        Ok(())
    }
}

impl CleanupConfig {
    /// Negative delays and targets are configuration errors
    pub fn validate(&self) -> PipelineResult<()> {
        if self.target_active_items < 0 {
            return Err(PipelineError::config(format!(
                "TARGET_ACTIVE_ITEMS cannot be negative: {}",
                self.target_active_items
            )));
        }
        if self.transferred_delay_secs < 0 {
            return Err(PipelineError::config(format!(
                "TRANSFERRED_ITEM_CLEANUP_DELAY cannot be negative: {}",
                self.transferred_delay_secs
            )));
        }
        if self.hung_delay_secs < 0 {
            return Err(PipelineError::config(format!(
                "HUNG_ITEM_CLEANUP_DELAY cannot be negative: {}",
                self.hung_delay_secs
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_only_database_url() {
        let settings = Settings::from_lookup(lookup(&[("DATABASE_URL", "postgresql://localhost/at")])).unwrap();
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.reel_driver.threshold, 0.35);
        assert_eq!(settings.transfer.uid, 1005);
        assert_eq!(settings.transfer.gid, 1001);
        assert!(settings.feeds.is_empty());
        assert_eq!(
            settings.reel_driver.base_url(),
            "http://localhost:8000/reel-driver"
        );
    }

    #[test]
    fn test_missing_database_url_is_fatal() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_feed_vectors_are_zipped() {
        let settings = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/at"),
            ("RSS_SOURCES", "yts.mx, episodefeed.com"),
            ("RSS_URLS", "https://yts.mx/rss,https://episodefeed.com/rss"),
        ]))
        .unwrap();
        assert_eq!(settings.feeds.len(), 2);
        assert_eq!(settings.feeds[1].source, "episodefeed.com");
        assert_eq!(settings.feeds[1].url, "https://episodefeed.com/rss");
    }

    #[test]
    fn test_feed_length_mismatch_is_fatal() {
        let result = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/at"),
            ("RSS_SOURCES", "yts.mx,episodefeed.com"),
            ("RSS_URLS", "https://yts.mx/rss"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_numbers_and_ranges_are_fatal() {
        for (key, value) in [
            ("BATCH_SIZE", "fifty"),
            ("BATCH_SIZE", "0"),
            ("REEL_DRIVER_THRESHOLD", "1.5"),
            ("TARGET_ACTIVE_ITEMS", "-1"),
            ("TRANSFERRED_ITEM_CLEANUP_DELAY", "-60"),
            ("HUNG_ITEM_CLEANUP_DELAY", "-60"),
            ("AT_UID", "root"),
        ] {
            let result = Settings::from_lookup(lookup(&[
                ("DATABASE_URL", "postgresql://localhost/at"),
                (key, value),
            ]));
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_empty_reel_driver_prefix() {
        let settings = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgresql://localhost/at"),
            ("REEL_DRIVER_HOST", "reel"),
            ("REEL_DRIVER_PORT", "9000"),
            ("REEL_DRIVER_PREFIX", ""),
        ]))
        .unwrap();
        assert_eq!(settings.reel_driver.base_url(), "http://reel:9000");
    }
}
