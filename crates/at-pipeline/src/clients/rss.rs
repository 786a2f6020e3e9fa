//! RSS feed fetching and parsing

use super::{FeedEntry, FeedSource};
use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "enclosure", default)]
    enclosures: Vec<Enclosure>,
    #[serde(rename = "tv:show_name", alias = "show_name")]
    show_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: String,
}

/// Parse an RSS 2.0 document into entries; items without a title are skipped
pub fn parse_feed(xml: &str) -> PipelineResult<Vec<FeedEntry>> {
    let rss: Rss = quick_xml::de::from_str(xml)?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let title = item.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
            let links = item
                .link
                .into_iter()
                .chain(item.enclosures.into_iter().map(|e| e.url))
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            Some(FeedEntry {
                title,
                links,
                tv_show_name: item.show_name.filter(|s| !s.trim().is_empty()),
            })
        })
        .collect())
}

pub struct RssClient {
    client: Client,
}

impl RssClient {
    pub fn new(timeout_secs: u64) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for RssClient {
    async fn fetch_feed(&self, url: &str) -> PipelineResult<Vec<FeedEntry>> {
        let response = self.client.get(url).send().await?;
        let body = PipelineError::check_status("rss", response)?.text().await?;
        parse_feed(&body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const YTS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>YTS</title>
    <link>https://yts.mx</link>
    <item>
      <title>Paranormal Activity 2 (2010) [1080p]</title>
      <link>https://yts.mx/movies/paranormal-activity-2-2010</link>
      <enclosure url="https://yts.mx/torrent/download/08105069D7EF1D1E2D15D0A7B1E0D4D7C1BE6EB4" type="application/x-bittorrent" length="0"/>
    </item>
    <item>
      <title></title>
      <link>https://yts.mx/movies/empty</link>
    </item>
  </channel>
</rss>"#;

    const EPISODE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:tv="https://showrss.info">
  <channel>
    <title>episodes</title>
    <item>
      <title>Severance S02E05 1080p WEB H264-SuccessfulCrab</title>
      <link>magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&amp;dn=Severance</link>
      <tv:show_name>Severance</tv:show_name>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_yts_feed() {
        let entries = parse_feed(YTS_FEED).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Paranormal Activity 2 (2010) [1080p]");
        assert_eq!(entries[0].links.len(), 2);
        assert!(entries[0].links[1].ends_with("08105069D7EF1D1E2D15D0A7B1E0D4D7C1BE6EB4"));
        assert_eq!(entries[0].tv_show_name, None);
    }

    #[test]
    fn test_parse_episode_feed() {
        let entries = parse_feed(EPISODE_FEED).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].links[0].starts_with("magnet:?xt=urn:btih:"));
        assert_eq!(entries[0].tv_show_name.as_deref(), Some("Severance"));
    }

    #[test]
    fn test_malformed_feed_is_an_error() {
        assert!(parse_feed("<rss><channel><item>").is_err());
    }
}
