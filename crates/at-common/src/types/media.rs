//! The media row and its state helpers

use super::status::{MediaType, PipelineStatus, RejectionStatus};
use crate::error::{AtError, Result};
use crate::hash::{is_canonical_hash, normalize_hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One observed torrent.
///
/// Every attribute a stage can produce is optional so a row can be carried
/// through the whole pipeline as a single typed record. Stages fill in what
/// they produce and leave the rest untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaItem {
    // identity
    pub hash: String,
    pub original_title: String,
    pub original_link: Option<String>,
    pub rss_source: Option<String>,

    // classification
    pub media_type: MediaType,
    pub media_title: Option<String>,
    pub release_year: Option<i32>,
    pub season: Option<i32>,
    pub episode: Option<i32>,

    // parsed file attributes
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub upload_type: Option<String>,
    pub audio_codec: Option<String>,
    pub uploader: Option<String>,

    // enriched metadata
    pub tmdb_id: Option<i64>,
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
    pub rt_score: Option<i32>,
    pub metascore: Option<i32>,
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,

    // paths
    pub original_path: Option<String>,
    pub parent_path: Option<String>,
    pub target_path: Option<String>,

    // state flags
    pub pipeline_status: PipelineStatus,
    pub rejection_status: RejectionStatus,
    pub rejection_reason: Option<String>,
    pub error_status: bool,
    pub error_condition: Option<String>,

    // audit
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single attribute value as seen by the file filter
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl MediaItem {
    /// Create a freshly ingested row
    pub fn new(hash: &str, original_title: impl Into<String>) -> Result<Self> {
        Ok(Self {
            hash: normalize_hash(hash)?,
            original_title: original_title.into(),
            ..Default::default()
        })
    }

    pub fn is_override(&self) -> bool {
        self.rejection_status == RejectionStatus::Override
    }

    pub fn is_rejected(&self) -> bool {
        self.rejection_status == RejectionStatus::Rejected
    }

    /// Record a rejection. Override rows are exempt; returns whether the
    /// rejection was applied.
    pub fn reject(&mut self, reason: impl Into<String>) -> bool {
        if self.is_override() {
            return false;
        }
        self.rejection_status = RejectionStatus::Rejected;
        self.rejection_reason = Some(reason.into());
        true
    }

    /// Mark as accepted unless the row is an override
    pub fn accept(&mut self) {
        if !self.is_override() {
            self.rejection_status = RejectionStatus::Accepted;
            self.rejection_reason = None;
        }
    }

    /// Annotate an error; further conditions are appended with `"; "`
    pub fn set_error(&mut self, condition: impl Into<String>) {
        let condition = condition.into();
        self.error_status = true;
        self.error_condition = Some(match self.error_condition.take() {
            Some(existing) if !existing.is_empty() => format!("{}; {}", existing, condition),
            _ => condition,
        });
    }

    pub fn clear_error(&mut self) {
        self.error_status = false;
        self.error_condition = None;
    }

    /// Move to `next`, refusing moves the status table does not allow
    pub fn transition(&mut self, next: PipelineStatus) -> Result<()> {
        if !self.pipeline_status.can_transition_to(next) {
            return Err(AtError::InvalidTransition {
                from: self.pipeline_status.to_string(),
                to: next.to_string(),
            });
        }
        self.pipeline_status = next;
        Ok(())
    }

    /// Apply the common end-of-stage rule: errored rows stay put for retry,
    /// rejected rows go to `rejected`, everything else advances to `next`.
    /// Returns the resulting status.
    pub fn settle(&mut self, next: PipelineStatus) -> Result<PipelineStatus> {
        if self.error_status {
            return Ok(self.pipeline_status);
        }
        if self.is_rejected() {
            self.transition(PipelineStatus::Rejected)?;
        } else {
            self.transition(next)?;
        }
        Ok(self.pipeline_status)
    }

    /// Send the row back to `ingested` the way the repository trigger does:
    /// error and rejection fields are cleared, override survives.
    pub fn reset_to_ingested(&mut self) {
        self.pipeline_status = PipelineStatus::Ingested;
        self.clear_error();
        self.rejection_reason = None;
        if !self.is_override() {
            self.rejection_status = RejectionStatus::Unfiltered;
        }
    }

    /// Operator reset: like [`reset_to_ingested`](Self::reset_to_ingested)
    /// but also drops an override.
    pub fn operator_reset(&mut self) {
        self.rejection_status = RejectionStatus::Unfiltered;
        self.reset_to_ingested();
    }

    /// Look up an attribute by column name for rule evaluation
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        let int = |v: Option<i64>| v.map(|n| FieldValue::Number(n as f64));

        match name {
            "original_title" => Some(FieldValue::Text(self.original_title.clone())),
            "media_type" => Some(FieldValue::Text(self.media_type.to_string())),
            "media_title" => text(&self.media_title),
            "release_year" => int(self.release_year.map(i64::from)),
            "season" => int(self.season.map(i64::from)),
            "episode" => int(self.episode.map(i64::from)),
            "resolution" => text(&self.resolution),
            "video_codec" => text(&self.video_codec),
            "upload_type" => text(&self.upload_type),
            "audio_codec" => text(&self.audio_codec),
            "uploader" => text(&self.uploader),
            "rss_source" => text(&self.rss_source),
            "imdb_id" => text(&self.imdb_id),
            "tmdb_id" => int(self.tmdb_id),
            "budget" => int(self.budget),
            "revenue" => int(self.revenue),
            "runtime" => int(self.runtime.map(i64::from)),
            "production_status" => text(&self.production_status),
            "original_language" => text(&self.original_language),
            "tmdb_rating" => self.tmdb_rating.map(FieldValue::Number),
            "tmdb_votes" => int(self.tmdb_votes),
            "rt_score" => int(self.rt_score.map(i64::from)),
            "metascore" => int(self.metascore.map(i64::from)),
            "imdb_rating" => self.imdb_rating.map(FieldValue::Number),
            "imdb_votes" => int(self.imdb_votes),
            _ => None,
        }
    }

    /// Fields the row's media type requires before it may leave `parsed`
    pub fn missing_mandatory_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self.media_type {
            MediaType::Movie => {
                if self.media_title.is_none() {
                    missing.push("media_title");
                }
                if self.release_year.is_none() {
                    missing.push("release_year");
                }
            }
            MediaType::TvShow => {
                if self.media_title.is_none() {
                    missing.push("media_title");
                }
                if self.season.is_none() {
                    missing.push("season");
                }
                if self.episode.is_none() {
                    missing.push("episode");
                }
            }
            MediaType::TvSeason | MediaType::TvEpisodePack => {
                if self.media_title.is_none() {
                    missing.push("media_title");
                }
                if self.season.is_none() {
                    missing.push("season");
                }
            }
            MediaType::Unknown => {}
        }
        missing
    }

    /// Check the row-level invariants every write must respect
    pub fn validate_invariants(&self) -> Result<()> {
        if !is_canonical_hash(&self.hash) {
            return Err(AtError::InvalidHash(self.hash.clone()));
        }
        if self.is_rejected() != self.rejection_reason.is_some() {
            return Err(AtError::Parse(format!(
                "{}: rejection_status {} with rejection_reason {:?}",
                self.hash, self.rejection_status, self.rejection_reason
            )));
        }
        if self.error_status != self.error_condition.is_some() {
            return Err(AtError::Parse(format!(
                "{}: error_status {} with error_condition {:?}",
                self.hash, self.error_status, self.error_condition
            )));
        }
        Ok(())
    }

    /// Merge previously stored metadata onto the row
    pub fn apply_metadata(&mut self, meta: &MediaMetadata) {
        self.tmdb_id = Some(meta.tmdb_id);
        self.release_year = meta.release_year.or(self.release_year);
        self.imdb_id = meta.imdb_id.clone().or(self.imdb_id.take());
        self.budget = meta.budget;
        self.revenue = meta.revenue;
        self.runtime = meta.runtime;
        self.origin_country = meta.origin_country.clone();
        self.production_companies = meta.production_companies.clone();
        self.production_countries = meta.production_countries.clone();
        self.production_status = meta.production_status.clone();
        self.original_language = meta.original_language.clone();
        self.spoken_languages = meta.spoken_languages.clone();
        self.genre = meta.genre.clone();
        self.original_media_title = meta.original_media_title.clone();
        self.tagline = meta.tagline.clone();
        self.overview = meta.overview.clone();
        self.tmdb_rating = meta.tmdb_rating;
        self.tmdb_votes = meta.tmdb_votes;
        self.rt_score = meta.rt_score;
        self.metascore = meta.metascore;
        self.imdb_rating = meta.imdb_rating;
        self.imdb_votes = meta.imdb_votes;
    }
}

/// Enriched metadata previously stored for a tmdb id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MediaMetadata {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub imdb_id: Option<String>,
    pub release_year: Option<i32>,
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
    pub rt_score: Option<i32>,
    pub metascore: Option<i32>,
    pub imdb_rating: Option<f64>,
    pub imdb_votes: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&MediaItem> for MediaMetadata {
    fn from(item: &MediaItem) -> Self {
        Self {
            tmdb_id: item.tmdb_id.unwrap_or_default(),
            media_type: item.media_type,
            imdb_id: item.imdb_id.clone(),
            release_year: item.release_year,
            budget: item.budget,
            revenue: item.revenue,
            runtime: item.runtime,
            origin_country: item.origin_country.clone(),
            production_companies: item.production_companies.clone(),
            production_countries: item.production_countries.clone(),
            production_status: item.production_status.clone(),
            original_language: item.original_language.clone(),
            spoken_languages: item.spoken_languages.clone(),
            genre: item.genre.clone(),
            original_media_title: item.original_media_title.clone(),
            tagline: item.tagline.clone(),
            overview: item.overview.clone(),
            tmdb_rating: item.tmdb_rating,
            tmdb_votes: item.tmdb_votes,
            rt_score: item.rt_score,
            metascore: item.metascore,
            imdb_rating: item.imdb_rating,
            imdb_votes: item.imdb_votes,
            updated_at: item.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HASH: &str = "08105069D7EF1D1E2D15D0A7B1E0D4D7C1BE6EB4";

    fn item() -> MediaItem {
        MediaItem::new(HASH, "Paranormal Activity 2 (2010) [1080p] [BluRay] [5.1] [YTS.MX]").unwrap()
    }

    #[test]
    fn test_new_lowercases_hash() {
        let item = item();
        assert_eq!(item.hash, HASH.to_lowercase());
        assert_eq!(item.pipeline_status, PipelineStatus::Ingested);
        assert_eq!(item.rejection_status, RejectionStatus::Unfiltered);
        assert!(item.validate_invariants().is_ok());
        assert!(MediaItem::new("abc", "x").is_err());
    }

    #[test]
    fn test_override_is_never_rejected() {
        let mut item = item();
        item.rejection_status = RejectionStatus::Override;
        assert!(!item.reject("resolution 720p is not in allowed_values"));
        assert_eq!(item.rejection_status, RejectionStatus::Override);
        assert!(item.rejection_reason.is_none());

        item.accept();
        assert_eq!(item.rejection_status, RejectionStatus::Override);
        assert!(item.validate_invariants().is_ok());
    }

    #[test]
    fn test_errors_accumulate() {
        let mut item = item();
        item.set_error("media_title is null");
        item.set_error("release_year is null");
        assert_eq!(
            item.error_condition.as_deref(),
            Some("media_title is null; release_year is null")
        );
        item.clear_error();
        assert!(!item.error_status);
        assert!(item.error_condition.is_none());
    }

    #[test]
    fn test_settle_keeps_errored_rows_in_place() {
        let mut item = item();
        item.pipeline_status = PipelineStatus::FileAccepted;
        item.set_error("search returned 503");
        let status = item.settle(PipelineStatus::MetadataCollected).unwrap();
        assert_eq!(status, PipelineStatus::FileAccepted);
    }

    #[test]
    fn test_settle_routes_rejections() {
        let mut item = item();
        item.pipeline_status = PipelineStatus::Parsed;
        item.reject("resolution 720p is not in allowed_values");
        assert_eq!(
            item.settle(PipelineStatus::FileAccepted).unwrap(),
            PipelineStatus::Rejected
        );

        let mut accepted = self::item();
        accepted.pipeline_status = PipelineStatus::Parsed;
        accepted.accept();
        assert_eq!(
            accepted.settle(PipelineStatus::FileAccepted).unwrap(),
            PipelineStatus::FileAccepted
        );
    }

    #[test]
    fn test_illegal_transition_is_refused() {
        let mut item = item();
        let err = item.transition(PipelineStatus::Downloaded).unwrap_err();
        assert!(err.to_string().contains("ingested -> downloaded"));
        assert_eq!(item.pipeline_status, PipelineStatus::Ingested);
    }

    #[test]
    fn test_reset_preserves_override() {
        let mut item = item();
        item.pipeline_status = PipelineStatus::Downloading;
        item.rejection_status = RejectionStatus::Override;
        item.set_error("rpc failed");
        item.reset_to_ingested();
        assert_eq!(item.pipeline_status, PipelineStatus::Ingested);
        assert_eq!(item.rejection_status, RejectionStatus::Override);
        assert!(!item.error_status);

        item.operator_reset();
        assert_eq!(item.rejection_status, RejectionStatus::Unfiltered);
    }

    #[test]
    fn test_field_lookup() {
        let mut item = item();
        item.resolution = Some("1080p".into());
        item.release_year = Some(2010);
        assert_eq!(item.field("resolution"), Some(FieldValue::Text("1080p".into())));
        assert_eq!(item.field("release_year"), Some(FieldValue::Number(2010.0)));
        assert_eq!(item.field("video_codec"), None);
        assert_eq!(FieldValue::Number(2010.0).to_string(), "2010");
        assert_eq!(FieldValue::Number(6.3).to_string(), "6.3");
    }

    #[test]
    fn test_missing_mandatory_fields() {
        let mut item = item();
        item.media_type = MediaType::TvShow;
        item.media_title = Some("Severance".into());
        item.season = Some(2);
        assert_eq!(item.missing_mandatory_fields(), vec!["episode"]);

        item.media_type = MediaType::Unknown;
        assert!(item.missing_mandatory_fields().is_empty());
    }

    #[test]
    fn test_invariant_violations_are_reported() {
        let mut item = item();
        item.rejection_status = RejectionStatus::Rejected;
        assert!(item.validate_invariants().is_err());
        item.rejection_reason = Some("x".into());
        assert!(item.validate_invariants().is_ok());
        item.error_status = true;
        assert!(item.validate_invariants().is_err());
    }
}
