//! Automatic Transmission pipeline
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! The staged media-acquisition engine: every stage reads rows of the
//! `media` table in one `pipeline_status`, works them against the external
//! services, and writes them back in the next status.
//!
//! # Overview
//!
//! - **Configuration**: [`Settings`], read once from the environment
//! - **Parsing and rules**: [`parser`] and [`filter`], both side-effect free
//! - **Collaborators**: the traits in [`clients`] with HTTP implementations
//!   for Transmission, TMDB, OMDb, reel-driver and RSS
//! - **Persistence**: [`db::MediaRepository`] over Postgres or memory
//! - **Stages**: [`stages`], driven through [`Pipeline`]
//!
//! # Example
//!
//! ```no_run
//! use at_pipeline::{Pipeline, PipelineResult, Settings, Stage};
//!
//! async fn check_downloads() -> PipelineResult<()> {
//!     let pipeline = Pipeline::connect(Settings::from_env()?).await?;
//!     let report = pipeline.run_stage(Stage::DownloadCheck).await?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod parser;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod transfer;

// Re-export commonly used types
pub use config::Settings;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, Services, Stage, StageReport};
