//! Release-title parsing
//!
//! Turns a free-form torrent title into the classification and file
//! attributes stored on a media row:
//!
//! 1. apply the configured string replacements to a working copy
//! 2. extract resolution, codecs, upload type and uploader
//! 3. classify: `SxxExx` → tv_show, season + episode range → tv_episode_pack,
//!    `Sxx`/`Season N` → tv_season, delimited year → movie, else unknown
//! 4. take the media title as the text before the classifying match
//!
//! ```
//! use at_pipeline::parser::{ParserConfig, TitleParser};
//! use at_common::types::MediaType;
//!
//! let parser = TitleParser::new(&ParserConfig::default())?;
//! let parsed = parser.parse("Paranormal Activity 2 (2010) [1080p] [BluRay] [5.1] [YTS.MX]");
//! assert_eq!(parsed.media_type, MediaType::Movie);
//! assert_eq!(parsed.media_title.as_deref(), Some("Paranormal Activity 2"));
//! assert_eq!(parsed.release_year, Some(2010));
//! # Ok::<(), at_pipeline::PipelineError>(())
//! ```

mod patterns;

use crate::error::{PipelineError, PipelineResult};
use at_common::types::{MediaItem, MediaType};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::Path;

/// Parser configuration document (`PARSE_CONFIG`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParserConfig {
    /// Ordered `(from, to)` replacements applied before matching
    #[serde(default = "patterns::default_replacements")]
    pub replacements: Vec<(String, String)>,

    /// Closed set of release groups recognised as a trailing token
    #[serde(default = "patterns::default_uploaders")]
    pub uploaders: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            replacements: patterns::default_replacements(),
            uploaders: patterns::default_uploaders(),
        }
    }
}

impl ParserConfig {
    pub fn from_yaml(text: &str) -> PipelineResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read parser config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }
}

/// Attributes extracted from one title
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTitle {
    pub media_type: MediaType,
    pub media_title: Option<String>,
    pub release_year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub upload_type: Option<String>,
    pub uploader: Option<String>,
}

/// Compiled title parser
#[derive(Debug, Clone)]
pub struct TitleParser {
    replacements: Vec<(String, String)>,
    uploaders: Vec<String>,
    resolution: Regex,
    video_codec: Regex,
    audio_codec: Regex,
    upload_type: Regex,
    uploader: Option<Regex>,
    tv_show: Regex,
    tv_episode_pack: Regex,
    tv_season: Regex,
    year: Regex,
}

/// Lowercase with separators removed, for comparing group names
fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Collapse internal whitespace and trim separator debris from the ends
fn clean_title(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed
        .trim_matches(|c: char| c.is_whitespace() || "-([{,_".contains(c))
        .to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Start offset and value of every delimited year in `cleaned`
fn year_spans<'a>(year: &'a Regex, cleaned: &'a str) -> impl Iterator<Item = (usize, i32)> + 'a {
    year.find_iter(cleaned).filter_map(move |m| {
        let opens = cleaned[..m.start()]
            .chars()
            .next_back()
            .is_none_or(|c| c.is_whitespace() || patterns::YEAR_OPEN.contains(c));
        let closes = cleaned[m.end()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace() || patterns::YEAR_CLOSE.contains(c));
        if opens && closes {
            m.as_str().parse().ok().map(|y| (m.start(), y))
        } else {
            None
        }
    })
}

fn first_number(caps: &Captures<'_>, groups: &[usize]) -> Option<i32> {
    groups
        .iter()
        .find_map(|&g| caps.get(g))
        .and_then(|m| m.as_str().parse().ok())
}

impl TitleParser {
    pub fn new(config: &ParserConfig) -> PipelineResult<Self> {
        let uploader = if config.uploaders.is_empty() {
            None
        } else {
            let names: Vec<String> = config
                .uploaders
                .iter()
                .map(|name| regex::escape(name).replace(r"\.", "[. ]"))
                .collect();
            Some(Regex::new(&format!(
                r"(?i)(?:^|[\s\-\[(])({})[\])]?\s*$",
                names.join("|")
            ))?)
        };

        Ok(Self {
            replacements: config.replacements.clone(),
            uploaders: config.uploaders.clone(),
            resolution: Regex::new(patterns::RESOLUTION)?,
            video_codec: Regex::new(patterns::VIDEO_CODEC)?,
            audio_codec: Regex::new(patterns::AUDIO_CODEC)?,
            upload_type: Regex::new(patterns::UPLOAD_TYPE)?,
            uploader,
            tv_show: Regex::new(patterns::TV_SHOW)?,
            tv_episode_pack: Regex::new(patterns::TV_EPISODE_PACK)?,
            tv_season: Regex::new(patterns::TV_SEASON)?,
            year: Regex::new(patterns::YEAR)?,
        })
    }

    /// Apply the configured replacements in order
    pub fn preprocess(&self, title: &str) -> String {
        self.replacements
            .iter()
            .fold(title.to_string(), |acc, (from, to)| acc.replace(from.as_str(), to))
    }

    pub fn extract_resolution(&self, cleaned: &str) -> Option<String> {
        self.resolution
            .captures(cleaned)
            .map(|c| c[1].to_lowercase())
    }

    pub fn extract_video_codec(&self, cleaned: &str) -> Option<String> {
        self.video_codec
            .captures(cleaned)
            .map(|c| c[1].replace(' ', "."))
    }

    pub fn extract_audio_codec(&self, cleaned: &str) -> Option<String> {
        self.audio_codec
            .captures(cleaned)
            .map(|c| c[1].replace(' ', "."))
    }

    pub fn extract_upload_type(&self, cleaned: &str) -> Option<String> {
        self.upload_type.captures(cleaned).map(|c| {
            let found = &c[1];
            patterns::UPLOAD_TYPE_CANONICAL
                .iter()
                .find(|canonical| canonical.eq_ignore_ascii_case(found))
                .map_or_else(|| found.to_string(), |canonical| canonical.to_string())
        })
    }

    /// Trailing release-group token, returned in its configured spelling
    pub fn extract_uploader(&self, cleaned: &str) -> Option<String> {
        let found = self.uploader.as_ref()?.captures(cleaned.trim_end())?;
        let key = squash(&found[1]);
        self.uploaders.iter().find(|name| squash(name) == key).cloned()
    }

    /// Classify a preprocessed title
    pub fn classify(&self, cleaned: &str) -> MediaType {
        if self.tv_show.is_match(cleaned) {
            MediaType::TvShow
        } else if self.tv_episode_pack.is_match(cleaned) {
            MediaType::TvEpisodePack
        } else if self.tv_season.is_match(cleaned) {
            MediaType::TvSeason
        } else if year_spans(&self.year, cleaned).next().is_some() {
            MediaType::Movie
        } else {
            MediaType::Unknown
        }
    }

    /// Title text and numbers implied by `media_type`
    fn extract_identity(
        &self,
        cleaned: &str,
        media_type: MediaType,
    ) -> (Option<String>, Option<i32>, Option<i32>, Option<i32>) {
        match media_type {
            MediaType::TvShow => match self.tv_show.captures(cleaned) {
                Some(caps) => (
                    caps.get(0).and_then(|m| clean_title(&cleaned[..m.start()])),
                    None,
                    first_number(&caps, &[1]),
                    first_number(&caps, &[2]),
                ),
                None => (None, None, None, None),
            },
            MediaType::TvSeason | MediaType::TvEpisodePack => {
                let caps = self
                    .tv_episode_pack
                    .captures(cleaned)
                    .or_else(|| self.tv_season.captures(cleaned));
                match caps {
                    Some(caps) => (
                        caps.get(0).and_then(|m| clean_title(&cleaned[..m.start()])),
                        None,
                        first_number(&caps, &[1, 2]),
                        None,
                    ),
                    None => (None, None, None, None),
                }
            }
            MediaType::Movie => match year_spans(&self.year, cleaned).last() {
                Some((start, year)) => (clean_title(&cleaned[..start]), Some(year), None, None),
                None => (None, None, None, None),
            },
            MediaType::Unknown => (None, None, None, None),
        }
    }

    /// Parse a title from scratch
    pub fn parse(&self, title: &str) -> ParsedTitle {
        let cleaned = self.preprocess(title);
        let media_type = self.classify(&cleaned);
        self.parse_as(&cleaned, media_type)
    }

    fn parse_as(&self, cleaned: &str, media_type: MediaType) -> ParsedTitle {
        let (media_title, release_year, season, episode) = self.extract_identity(cleaned, media_type);
        ParsedTitle {
            media_type,
            media_title,
            release_year,
            season,
            episode,
            resolution: self.extract_resolution(cleaned),
            video_codec: self.extract_video_codec(cleaned),
            audio_codec: self.extract_audio_codec(cleaned),
            upload_type: self.extract_upload_type(cleaned),
            uploader: self.extract_uploader(cleaned),
        }
    }

    /// Fill a row's parsed attributes from its `original_title`.
    ///
    /// A media type already set upstream (feed source, daemon adoption) is
    /// kept, as is a feed-provided media title.
    pub fn parse_item(&self, item: &mut MediaItem) {
        let cleaned = self.preprocess(&item.original_title);
        let media_type = match item.media_type {
            MediaType::Unknown => self.classify(&cleaned),
            known => known,
        };
        let parsed = self.parse_as(&cleaned, media_type);

        item.media_type = parsed.media_type;
        if item.media_title.is_none() {
            item.media_title = parsed.media_title;
        }
        item.release_year = parsed.release_year.or(item.release_year);
        item.season = parsed.season.or(item.season);
        item.episode = parsed.episode.or(item.episode);
        item.resolution = parsed.resolution;
        item.video_codec = parsed.video_codec;
        item.audio_codec = parsed.audio_codec;
        item.upload_type = parsed.upload_type;
        item.uploader = parsed.uploader;
    }

    /// Error conditions for a parsed row; empty when the row may advance
    pub fn verify(&self, item: &MediaItem) -> Vec<String> {
        if item.media_type == MediaType::Unknown {
            return vec!["media_type is unknown".to_string()];
        }
        item.missing_mandatory_fields()
            .into_iter()
            .map(|field| format!("{} is null", field))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parser() -> TitleParser {
        TitleParser::new(&ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_yts_movie() {
        let parsed = parser().parse("Paranormal Activity 2 (2010) [1080p] [BluRay] [5.1] [YTS.MX]");
        assert_eq!(parsed.media_type, MediaType::Movie);
        assert_eq!(parsed.media_title.as_deref(), Some("Paranormal Activity 2"));
        assert_eq!(parsed.release_year, Some(2010));
        assert_eq!(parsed.resolution.as_deref(), Some("1080p"));
        assert_eq!(parsed.upload_type.as_deref(), Some("BluRay"));
        assert_eq!(parsed.uploader.as_deref(), Some("YTS.MX"));
        assert_eq!(parsed.video_codec, None);
    }

    #[test]
    fn test_dotted_movie_uses_last_year() {
        let parsed = parser().parse("2001.A.Space.Odyssey.1968.2160p.UHD.BluRay.x265.DDP5.1-NTb");
        assert_eq!(parsed.media_type, MediaType::Movie);
        assert_eq!(parsed.media_title.as_deref(), Some("2001 A Space Odyssey"));
        assert_eq!(parsed.release_year, Some(1968));
        assert_eq!(parsed.resolution.as_deref(), Some("2160p"));
        assert_eq!(parsed.video_codec.as_deref(), Some("x265"));
        assert_eq!(parsed.audio_codec.as_deref(), Some("DDP5.1"));
        assert_eq!(parsed.uploader.as_deref(), Some("NTb"));
    }

    #[test]
    fn test_year_titled_movies_take_the_trailing_year() {
        let parser = parser();
        for (raw, title, year) in [
            ("1917.2019.1080p.BluRay.x264-YTS.MX", "1917", 2019),
            ("2012.2009.720p.BluRay.x264-YTS", "2012", 2009),
            ("Blade.Runner.2049.2017.2160p.x265", "Blade Runner 2049", 2017),
            ("1917 (2019) [1080p] [YTS.MX]", "1917", 2019),
        ] {
            let parsed = parser.parse(raw);
            assert_eq!(parsed.media_type, MediaType::Movie, "{}", raw);
            assert_eq!(parsed.media_title.as_deref(), Some(title), "{}", raw);
            assert_eq!(parsed.release_year, Some(year), "{}", raw);
        }
    }

    #[test]
    fn test_year_inside_a_number_is_ignored() {
        let parsed = parser().parse("Track.120199.1080p");
        assert_eq!(parsed.media_type, MediaType::Unknown);
        assert_eq!(parsed.release_year, None);
    }

    #[test]
    fn test_tv_episode() {
        let parsed = parser().parse("Severance.S02E05.1080p.WEB.H264-SuccessfulCrab[TGx]");
        assert_eq!(parsed.media_type, MediaType::TvShow);
        assert_eq!(parsed.media_title.as_deref(), Some("Severance"));
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
        assert_eq!(parsed.release_year, None);
        assert_eq!(parsed.upload_type.as_deref(), Some("WEB"));
        assert_eq!(parsed.uploader.as_deref(), Some("SuccessfulCrab"));
    }

    #[test]
    fn test_video_codec_restores_dot() {
        let parsed = parser().parse("The.Bear.S03E01.720p.HULU.WEB-DL.H.265-FLUX");
        assert_eq!(parsed.video_codec.as_deref(), Some("H.265"));
        assert_eq!(parsed.upload_type.as_deref(), Some("HULU"));
    }

    #[test]
    fn test_tv_season() {
        let parsed = parser().parse("The Office US S05 1080p BluRay x265-ELiTE");
        assert_eq!(parsed.media_type, MediaType::TvSeason);
        assert_eq!(parsed.media_title.as_deref(), Some("The Office US"));
        assert_eq!(parsed.season, Some(5));
        assert_eq!(parsed.episode, None);

        let spelled = parser().parse("Shogun Season 1 Complete 2160p");
        assert_eq!(spelled.media_type, MediaType::TvSeason);
        assert_eq!(spelled.season, Some(1));
        assert_eq!(spelled.media_title.as_deref(), Some("Shogun"));
    }

    #[test]
    fn test_tv_episode_pack() {
        let parsed = parser().parse("Slow.Horses.S04.E01-E03.1080p.ATVP.WEB-DL-FLUX");
        assert_eq!(parsed.media_type, MediaType::TvEpisodePack);
        assert_eq!(parsed.media_title.as_deref(), Some("Slow Horses"));
        assert_eq!(parsed.season, Some(4));

        let spelled = parser().parse("Slow Horses Season 4 Episodes 1-3 720p");
        assert_eq!(spelled.media_type, MediaType::TvEpisodePack);
        assert_eq!(spelled.season, Some(4));
    }

    #[test]
    fn test_unknown() {
        let parsed = parser().parse("Random.Unclassifiable.String.Without.Patterns.123");
        assert_eq!(parsed.media_type, MediaType::Unknown);
        assert_eq!(parsed.media_title, None);
    }

    #[test]
    fn test_parse_item_keeps_upstream_type_and_title() {
        let mut item = MediaItem::new(
            "08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4",
            "Dune.Part.Two.2024.1080p.WEBRip.x264.AAC5.1-YTS.MX",
        )
        .unwrap();
        item.media_type = MediaType::Movie;
        item.media_title = Some("Dune: Part Two".into());
        parser().parse_item(&mut item);

        assert_eq!(item.media_title.as_deref(), Some("Dune: Part Two"));
        assert_eq!(item.release_year, Some(2024));
        assert_eq!(item.audio_codec.as_deref(), Some("AAC5.1"));
        assert_eq!(item.upload_type.as_deref(), Some("WEBRip"));
        assert_eq!(item.uploader.as_deref(), Some("YTS.MX"));
        assert!(parser().verify(&item).is_empty());
    }

    #[test]
    fn test_verify_reports_missing_fields() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "Untitled 1080p").unwrap();
        item.media_type = MediaType::Movie;
        parser().parse_item(&mut item);
        assert_eq!(
            parser().verify(&item),
            vec!["media_title is null".to_string(), "release_year is null".to_string()]
        );

        let mut unknown = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "???").unwrap();
        parser().parse_item(&mut unknown);
        assert_eq!(parser().verify(&unknown), vec!["media_type is unknown".to_string()]);
    }

    #[test]
    fn test_config_from_yaml() {
        let config = ParserConfig::from_yaml(
            "replacements:\n  - [\"[HD]\", \"\"]\n  - [\".\", \" \"]\nuploaders: [GRP]\n",
        )
        .unwrap();
        let parser = TitleParser::new(&config).unwrap();
        let parsed = parser.parse("[HD]Heat.1995.1080p-GRP");
        assert_eq!(parsed.media_title.as_deref(), Some("Heat"));
        assert_eq!(parsed.uploader.as_deref(), Some("GRP"));
        assert!(ParserConfig::from_yaml("replacements: 7").is_err());
    }
}
