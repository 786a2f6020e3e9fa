//! `PgRepository` against a disposable PostgreSQL container
//!
//! Run with: cargo test -p at-pipeline --test repository_tests -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::{Context, Result};
use at_common::types::{Label, MediaItem, MediaType, PipelineStatus, RejectionStatus, TrainingLabel};
use at_pipeline::db::{run_migrations, MediaRepository, PgRepository};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;

struct TestDb {
    _container: ContainerAsync<Postgres>,
    repo: PgRepository,
}

impl TestDb {
    async fn start() -> Result<Self> {
        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;
        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432.tcp()).await?;
        let url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        run_migrations(&pool).await?;

        Ok(Self {
            _container: container,
            repo: PgRepository::new(pool),
        })
    }
}

fn row(hash: &str) -> MediaItem {
    let mut item = MediaItem::new(hash, "Heat.1995.1080p.BluRay.x264-YTS").unwrap();
    item.media_type = MediaType::Movie;
    item.media_title = Some("Heat".into());
    item.release_year = Some(1995);
    item.genre = Some(vec!["Crime".into(), "Thriller".into()]);
    item
}

const HEAT: &str = "4a2f0b1e5c6d7e8f90a1b2c3d4e5f60718293a4b";
const OTHER: &str = "08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4";

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_insert_and_compare_hashes() {
    let db = TestDb::start().await.unwrap();
    db.repo.insert_items(&[row(HEAT)]).await.unwrap();
    // a second insert of the same hash is ignored
    db.repo.insert_items(&[row(HEAT)]).await.unwrap();

    let unseen = db
        .repo
        .compare_hashes(&[HEAT.to_string(), OTHER.to_string()])
        .await
        .unwrap();
    assert_eq!(unseen, vec![OTHER.to_string()]);

    let stored = db.repo.get_items_by_hash(&[HEAT.to_string()]).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].genre, Some(vec!["Crime".to_string(), "Thriller".to_string()]));
    assert!(stored[0].created_at.is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_update_preserves_override() {
    let db = TestDb::start().await.unwrap();
    let mut item = row(HEAT);
    item.rejection_status = RejectionStatus::Override;
    db.repo.insert_items(&[item.clone()]).await.unwrap();

    item.rejection_status = RejectionStatus::Rejected;
    item.rejection_reason = Some("resolution 720p is not in allowed_values".into());
    item.pipeline_status = PipelineStatus::Rejected;
    db.repo.media_db_update(&[item]).await.unwrap();

    let stored = db.repo.get_items_by_hash(&[HEAT.to_string()]).await.unwrap();
    assert_eq!(stored[0].rejection_status, RejectionStatus::Override);
    assert_eq!(stored[0].rejection_reason, None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reset_trigger_clears_annotations() {
    let db = TestDb::start().await.unwrap();
    let mut item = row(HEAT);
    item.pipeline_status = PipelineStatus::Downloading;
    item.rejection_status = RejectionStatus::Accepted;
    db.repo.insert_items(&[item.clone()]).await.unwrap();

    // write ingested without clearing anything: the trigger does it
    item.pipeline_status = PipelineStatus::Ingested;
    item.set_error("torrent lost");
    db.repo.media_db_update(&[item]).await.unwrap();

    let stored = db.repo.get_items_by_status(PipelineStatus::Ingested).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(!stored[0].error_status);
    assert_eq!(stored[0].error_condition, None);
    assert_eq!(stored[0].rejection_status, RejectionStatus::Unfiltered);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_rejected_hashes_and_counts() {
    let db = TestDb::start().await.unwrap();
    let mut rejected = row(OTHER);
    rejected.reject("media search failed");
    rejected.pipeline_status = PipelineStatus::Rejected;
    db.repo.insert_items(&[row(HEAT), rejected]).await.unwrap();

    let hits = db
        .repo
        .return_rejected_hashes(&[HEAT.to_string(), OTHER.to_string()])
        .await
        .unwrap();
    assert_eq!(hits, vec![OTHER.to_string()]);

    let counts = db.repo.count_by_status().await.unwrap();
    let count = |status| counts.iter().find(|(s, _)| *s == status).map(|(_, n)| *n);
    assert_eq!(count(PipelineStatus::Ingested), Some(1));
    assert_eq!(count(PipelineStatus::Rejected), Some(1));
    assert_eq!(count(PipelineStatus::Complete), Some(0));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_training_upsert_keeps_existing_label() {
    let db = TestDb::start().await.unwrap();
    let mut item = row(HEAT);
    item.imdb_id = Some("tt0113277".into());
    item.tmdb_id = Some(949);

    let unlabeled = TrainingLabel::unlabeled(&item).unwrap();
    db.repo.training_db_upsert(&[unlabeled.clone()]).await.unwrap();
    let labeled = TrainingLabel::decided(&item, Label::WouldWatch).unwrap();
    db.repo.training_db_upsert(&[labeled]).await.unwrap();
    // a later unlabeled write does not erase the label
    db.repo.training_db_upsert(&[unlabeled]).await.unwrap();

    let rows = db
        .repo
        .get_training_labels(&["tt0113277".to_string()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label, Some(Label::WouldWatch));
    assert_eq!(rows[0].tmdb_id, Some(949));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_operator_reset_clears_override() {
    let db = TestDb::start().await.unwrap();
    let mut item = row(HEAT);
    item.rejection_status = RejectionStatus::Override;
    item.pipeline_status = PipelineStatus::Rejected;
    db.repo.insert_items(&[item]).await.unwrap();

    let changed = db
        .repo
        .reset_items(&[HEAT.to_string(), OTHER.to_string()])
        .await
        .unwrap();
    assert_eq!(changed, 1);
    let stored = db.repo.get_items_by_hash(&[HEAT.to_string()]).await.unwrap();
    assert_eq!(stored[0].pipeline_status, PipelineStatus::Ingested);
    assert_eq!(stored[0].rejection_status, RejectionStatus::Unfiltered);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_stored_metadata_lookup() {
    let db = TestDb::start().await.unwrap();
    let mut item = row(HEAT);
    item.tmdb_id = Some(949);
    item.imdb_id = Some("tt0113277".into());
    item.runtime = Some(170);
    let mut no_imdb = row(OTHER);
    no_imdb.tmdb_id = Some(41436);
    db.repo.insert_items(&[item, no_imdb]).await.unwrap();

    let stored = db.repo.get_media_metadata(&[949, 41436]).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].tmdb_id, 949);
    assert_eq!(stored[0].runtime, Some(170));
}
