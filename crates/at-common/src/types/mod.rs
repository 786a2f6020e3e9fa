//! Data model shared by every stage
//!
//! A media row moves through [`PipelineStatus`] values one stage at a time.
//! Rows whose `rejection_status` is [`RejectionStatus::Override`] were adopted
//! by an operator and skip rule and model rejection.

mod media;
mod status;
mod training;

pub use media::{FieldValue, MediaItem, MediaMetadata};
pub use status::{Label, MediaType, PipelineStatus, RejectionStatus};
pub use training::{dedup_by_imdb_id, TrainingLabel};
