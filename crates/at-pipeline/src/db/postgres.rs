//! Postgres-backed repository

use super::MediaRepository;
use crate::error::PipelineResult;
use async_trait::async_trait;
use at_common::types::{
    Label, MediaItem, MediaMetadata, MediaType, PipelineStatus, TrainingLabel,
};
use at_common::AtError;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::{FromRow, Postgres};
use std::collections::{HashMap, HashSet};

/// Columns written by inserts and upserts, in bind order
const WRITE_COLUMNS: [&str; 43] = [
    "hash",
    "original_title",
    "original_link",
    "rss_source",
    "media_type",
    "media_title",
    "release_year",
    "season",
    "episode",
    "resolution",
    "video_codec",
    "upload_type",
    "audio_codec",
    "uploader",
    "tmdb_id",
    "imdb_id",
    "budget",
    "revenue",
    "runtime",
    "origin_country",
    "production_companies",
    "production_countries",
    "production_status",
    "original_language",
    "spoken_languages",
    "genre",
    "original_media_title",
    "tagline",
    "overview",
    "tmdb_rating",
    "tmdb_votes",
    "rt_score",
    "metascore",
    "imdb_rating",
    "imdb_votes",
    "original_path",
    "parent_path",
    "target_path",
    "pipeline_status",
    "rejection_status",
    "rejection_reason",
    "error_status",
    "error_condition",
];

const METADATA_COLUMNS: &str = "tmdb_id, media_type, imdb_id, release_year, budget, revenue, \
     runtime, origin_country, production_companies, production_countries, production_status, \
     original_language, spoken_languages, genre, original_media_title, tagline, overview, \
     tmdb_rating, tmdb_votes, rt_score, metascore, imdb_rating, imdb_votes, updated_at";

#[derive(Debug, FromRow)]
struct MediaRow {
    hash: String,
    original_title: String,
    original_link: Option<String>,
    rss_source: Option<String>,
    media_type: String,
    media_title: Option<String>,
    release_year: Option<i32>,
    season: Option<i32>,
    episode: Option<i32>,
    resolution: Option<String>,
    video_codec: Option<String>,
    upload_type: Option<String>,
    audio_codec: Option<String>,
    uploader: Option<String>,
    tmdb_id: Option<i64>,
    imdb_id: Option<String>,
    budget: Option<i64>,
    revenue: Option<i64>,
    runtime: Option<i32>,
    origin_country: Option<Vec<String>>,
    production_companies: Option<Vec<String>>,
    production_countries: Option<Vec<String>>,
    production_status: Option<String>,
    original_language: Option<String>,
    spoken_languages: Option<Vec<String>>,
    genre: Option<Vec<String>>,
    original_media_title: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    tmdb_rating: Option<f64>,
    tmdb_votes: Option<i64>,
    rt_score: Option<i32>,
    metascore: Option<i32>,
    imdb_rating: Option<f64>,
    imdb_votes: Option<i64>,
    original_path: Option<String>,
    parent_path: Option<String>,
    target_path: Option<String>,
    pipeline_status: String,
    rejection_status: String,
    rejection_reason: Option<String>,
    error_status: bool,
    error_condition: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MediaRow> for MediaItem {
    type Error = AtError;

    fn try_from(row: MediaRow) -> Result<Self, Self::Error> {
        Ok(MediaItem {
            hash: row.hash,
            original_title: row.original_title,
            original_link: row.original_link,
            rss_source: row.rss_source,
            media_type: row.media_type.parse()?,
            media_title: row.media_title,
            release_year: row.release_year,
            season: row.season,
            episode: row.episode,
            resolution: row.resolution,
            video_codec: row.video_codec,
            upload_type: row.upload_type,
            audio_codec: row.audio_codec,
            uploader: row.uploader,
            tmdb_id: row.tmdb_id,
            imdb_id: row.imdb_id,
            budget: row.budget,
            revenue: row.revenue,
            runtime: row.runtime,
            origin_country: row.origin_country,
            production_companies: row.production_companies,
            production_countries: row.production_countries,
            production_status: row.production_status,
            original_language: row.original_language,
            spoken_languages: row.spoken_languages,
            genre: row.genre,
            original_media_title: row.original_media_title,
            tagline: row.tagline,
            overview: row.overview,
            tmdb_rating: row.tmdb_rating,
            tmdb_votes: row.tmdb_votes,
            rt_score: row.rt_score,
            metascore: row.metascore,
            imdb_rating: row.imdb_rating,
            imdb_votes: row.imdb_votes,
            original_path: row.original_path,
            parent_path: row.parent_path,
            target_path: row.target_path,
            pipeline_status: row.pipeline_status.parse()?,
            rejection_status: row.rejection_status.parse()?,
            rejection_reason: row.rejection_reason,
            error_status: row.error_status,
            error_condition: row.error_condition,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct MetadataRow {
    tmdb_id: i64,
    media_type: String,
    imdb_id: Option<String>,
    release_year: Option<i32>,
    budget: Option<i64>,
    revenue: Option<i64>,
    runtime: Option<i32>,
    origin_country: Option<Vec<String>>,
    production_companies: Option<Vec<String>>,
    production_countries: Option<Vec<String>>,
    production_status: Option<String>,
    original_language: Option<String>,
    spoken_languages: Option<Vec<String>>,
    genre: Option<Vec<String>>,
    original_media_title: Option<String>,
    tagline: Option<String>,
    overview: Option<String>,
    tmdb_rating: Option<f64>,
    tmdb_votes: Option<i64>,
    rt_score: Option<i32>,
    metascore: Option<i32>,
    imdb_rating: Option<f64>,
    imdb_votes: Option<i64>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MetadataRow> for MediaMetadata {
    type Error = AtError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        Ok(MediaMetadata {
            tmdb_id: row.tmdb_id,
            media_type: row.media_type.parse()?,
            imdb_id: row.imdb_id,
            release_year: row.release_year,
            budget: row.budget,
            revenue: row.revenue,
            runtime: row.runtime,
            origin_country: row.origin_country,
            production_companies: row.production_companies,
            production_countries: row.production_countries,
            production_status: row.production_status,
            original_language: row.original_language,
            spoken_languages: row.spoken_languages,
            genre: row.genre,
            original_media_title: row.original_media_title,
            tagline: row.tagline,
            overview: row.overview,
            tmdb_rating: row.tmdb_rating,
            tmdb_votes: row.tmdb_votes,
            rt_score: row.rt_score,
            metascore: row.metascore,
            imdb_rating: row.imdb_rating,
            imdb_votes: row.imdb_votes,
            updated_at: Some(row.updated_at),
        })
    }
}

#[derive(Debug, FromRow)]
struct TrainingRow {
    imdb_id: String,
    tmdb_id: Option<i64>,
    media_type: String,
    media_title: Option<String>,
    release_year: Option<i32>,
    label: Option<String>,
    human_labeled: bool,
    anomalous: bool,
    reviewed: bool,
}

impl TryFrom<TrainingRow> for TrainingLabel {
    type Error = AtError;

    fn try_from(row: TrainingRow) -> Result<Self, Self::Error> {
        Ok(TrainingLabel {
            imdb_id: row.imdb_id,
            tmdb_id: row.tmdb_id,
            media_type: row.media_type.parse::<MediaType>()?,
            media_title: row.media_title,
            release_year: row.release_year,
            label: row.label.as_deref().map(str::parse::<Label>).transpose()?,
            human_labeled: row.human_labeled,
            anomalous: row.anomalous,
            reviewed: row.reviewed,
        })
    }
}

fn insert_sql(on_conflict: &str) -> String {
    let placeholders: Vec<String> = (1..=WRITE_COLUMNS.len()).map(|i| format!("${}", i)).collect();
    format!(
        "INSERT INTO media ({}) VALUES ({}) {}",
        WRITE_COLUMNS.join(", "),
        placeholders.join(", "),
        on_conflict
    )
}

/// Upsert keeping `override` (and therefore no rejection reason) on rows
/// that already carry it
fn upsert_sql() -> String {
    let assignments: Vec<String> = WRITE_COLUMNS
        .iter()
        .filter(|col| !matches!(**col, "hash" | "rejection_status" | "rejection_reason"))
        .map(|col| format!("{col} = EXCLUDED.{col}"))
        .chain([
            "rejection_status = CASE WHEN media.rejection_status = 'override' \
             THEN 'override' ELSE EXCLUDED.rejection_status END"
                .to_string(),
            "rejection_reason = CASE WHEN media.rejection_status = 'override' \
             THEN NULL ELSE EXCLUDED.rejection_reason END"
                .to_string(),
        ])
        .collect();
    insert_sql(&format!("ON CONFLICT (hash) DO UPDATE SET {}", assignments.join(", ")))
}

fn bind_item<'q>(
    query: Query<'q, Postgres, PgArguments>,
    item: &'q MediaItem,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(&item.hash)
        .bind(&item.original_title)
        .bind(&item.original_link)
        .bind(&item.rss_source)
        .bind(item.media_type.as_str())
        .bind(&item.media_title)
        .bind(item.release_year)
        .bind(item.season)
        .bind(item.episode)
        .bind(&item.resolution)
        .bind(&item.video_codec)
        .bind(&item.upload_type)
        .bind(&item.audio_codec)
        .bind(&item.uploader)
        .bind(item.tmdb_id)
        .bind(&item.imdb_id)
        .bind(item.budget)
        .bind(item.revenue)
        .bind(item.runtime)
        .bind(&item.origin_country)
        .bind(&item.production_companies)
        .bind(&item.production_countries)
        .bind(&item.production_status)
        .bind(&item.original_language)
        .bind(&item.spoken_languages)
        .bind(&item.genre)
        .bind(&item.original_media_title)
        .bind(&item.tagline)
        .bind(&item.overview)
        .bind(item.tmdb_rating)
        .bind(item.tmdb_votes)
        .bind(item.rt_score)
        .bind(item.metascore)
        .bind(item.imdb_rating)
        .bind(item.imdb_votes)
        .bind(&item.original_path)
        .bind(&item.parent_path)
        .bind(&item.target_path)
        .bind(item.pipeline_status.as_str())
        .bind(item.rejection_status.as_str())
        .bind(&item.rejection_reason)
        .bind(item.error_status)
        .bind(&item.error_condition)
}

fn into_items(rows: Vec<MediaRow>) -> PipelineResult<Vec<MediaItem>> {
    rows.into_iter()
        .map(|row| MediaItem::try_from(row).map_err(Into::into))
        .collect()
}

/// Repository over a Postgres pool
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn write_items(&self, sql: &str, items: &[MediaItem]) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            bind_item(sqlx::query(sql), item).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for PgRepository {
    async fn get_items_by_status(&self, status: PipelineStatus) -> PipelineResult<Vec<MediaItem>> {
        let rows: Vec<MediaRow> =
            sqlx::query_as("SELECT * FROM media WHERE pipeline_status = $1 ORDER BY created_at, hash")
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?;
        into_items(rows)
    }

    async fn get_items_by_hash(&self, hashes: &[String]) -> PipelineResult<Vec<MediaItem>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<MediaRow> =
            sqlx::query_as("SELECT * FROM media WHERE hash = ANY($1) ORDER BY created_at, hash")
                .bind(hashes)
                .fetch_all(&self.pool)
                .await?;
        into_items(rows)
    }

    async fn compare_hashes(&self, hashes: &[String]) -> PipelineResult<Vec<String>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let known: Vec<String> = sqlx::query_scalar("SELECT hash FROM media WHERE hash = ANY($1)")
            .bind(hashes)
            .fetch_all(&self.pool)
            .await?;
        let known: HashSet<String> = known.into_iter().collect();
        Ok(hashes.iter().filter(|h| !known.contains(*h)).cloned().collect())
    }

    async fn return_rejected_hashes(&self, hashes: &[String]) -> PipelineResult<Vec<String>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let rejected = sqlx::query_scalar(
            "SELECT hash FROM media WHERE hash = ANY($1) AND rejection_status = 'rejected'",
        )
        .bind(hashes)
        .fetch_all(&self.pool)
        .await?;
        Ok(rejected)
    }

    async fn insert_items(&self, items: &[MediaItem]) -> PipelineResult<()> {
        self.write_items(&insert_sql("ON CONFLICT (hash) DO NOTHING"), items)
            .await
    }

    async fn media_db_update(&self, items: &[MediaItem]) -> PipelineResult<()> {
        self.write_items(&upsert_sql(), items).await
    }

    async fn get_media_metadata(&self, tmdb_ids: &[i64]) -> PipelineResult<Vec<MediaMetadata>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT DISTINCT ON (tmdb_id, media_type) {} FROM media \
             WHERE tmdb_id = ANY($1) AND imdb_id IS NOT NULL \
             ORDER BY tmdb_id, media_type, updated_at DESC",
            METADATA_COLUMNS
        );
        let rows: Vec<MetadataRow> = sqlx::query_as(&sql)
            .bind(tmdb_ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| MediaMetadata::try_from(row).map_err(Into::into))
            .collect()
    }

    async fn get_training_labels(&self, imdb_ids: &[String]) -> PipelineResult<Vec<TrainingLabel>> {
        if imdb_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<TrainingRow> = sqlx::query_as(
            "SELECT imdb_id, tmdb_id, media_type, media_title, release_year, label, \
             human_labeled, anomalous, reviewed FROM training WHERE imdb_id = ANY($1)",
        )
        .bind(imdb_ids)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| TrainingLabel::try_from(row).map_err(Into::into))
            .collect()
    }

    async fn training_db_upsert(&self, rows: &[TrainingLabel]) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO training (imdb_id, tmdb_id, media_type, media_title, release_year, \
                 label, human_labeled, anomalous, reviewed) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (imdb_id) DO UPDATE SET \
                 tmdb_id = COALESCE(EXCLUDED.tmdb_id, training.tmdb_id), \
                 media_title = COALESCE(training.media_title, EXCLUDED.media_title), \
                 release_year = COALESCE(training.release_year, EXCLUDED.release_year), \
                 label = COALESCE(training.label, EXCLUDED.label)",
            )
            .bind(&row.imdb_id)
            .bind(row.tmdb_id)
            .bind(row.media_type.as_str())
            .bind(&row.media_title)
            .bind(row.release_year)
            .bind(row.label.map(|l| l.as_str()))
            .bind(row.human_labeled)
            .bind(row.anomalous)
            .bind(row.reviewed)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn reset_items(&self, hashes: &[String]) -> PipelineResult<u64> {
        if hashes.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE media SET pipeline_status = 'ingested', rejection_status = 'unfiltered', \
             rejection_reason = NULL, error_status = FALSE, error_condition = NULL \
             WHERE hash = ANY($1)",
        )
        .bind(hashes)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_by_status(&self) -> PipelineResult<Vec<(PipelineStatus, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT pipeline_status, COUNT(*) FROM media GROUP BY pipeline_status")
                .fetch_all(&self.pool)
                .await?;
        let counts: HashMap<String, i64> = rows.into_iter().collect();
        Ok(PipelineStatus::ALL
            .into_iter()
            .map(|status| (status, counts.get(status.as_str()).copied().unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_binds_every_column() {
        let sql = insert_sql("ON CONFLICT (hash) DO NOTHING");
        assert!(sql.contains("$43)"));
        assert!(!sql.contains("$44"));
    }

    #[test]
    fn test_upsert_preserves_override() {
        let sql = upsert_sql();
        assert!(sql.contains("WHEN media.rejection_status = 'override' THEN 'override'"));
        assert!(!sql.contains("hash = EXCLUDED.hash"));
        assert!(sql.contains("error_condition = EXCLUDED.error_condition"));
    }
}
