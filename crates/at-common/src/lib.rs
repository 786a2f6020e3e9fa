//! Automatic Transmission Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the Automatic Transmission
//! workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`AtError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber bootstrap driven by `LOG_*` variables
//! - **Types**: the media row (`MediaItem`), its status enums, and training labels
//!
//! # Example
//!
//! ```no_run
//! use at_common::{Result, types::MediaItem};
//!
//! fn adopt(hash: &str, title: &str) -> Result<MediaItem> {
//!     let item = MediaItem::new(hash, title)?;
//!     Ok(item)
//! }
//! ```

pub mod error;
pub mod hash;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{AtError, Result};
