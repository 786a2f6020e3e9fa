//! Library path synthesis
//!
//! All functions here are pure: the same row always maps to the same
//! destination.

use crate::config::TransferConfig;
use crate::error::{PipelineError, PipelineResult};
use at_common::types::{MediaItem, MediaType};
use std::path::{Path, PathBuf};

/// How an existing destination directory is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Remove a pre-existing target directory first
    Overwrite,
    /// Keep the target; files overwrite, subdirectories are replaced
    Merge,
}

/// Where one downloaded payload goes
#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub source: PathBuf,
    pub parent: PathBuf,
    pub target: PathBuf,
    pub mode: TransferMode,
}

/// Lowercase, non-alphanumerics to `-`, runs collapsed, ends stripped
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// `H.265`, `H 265`, `h-265` all become `h265`
pub fn normalize_codec(codec: &str) -> String {
    codec
        .chars()
        .filter(|c| !matches!(c, '.' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn season_tag(season: i32) -> String {
    format!("s{:02}", season)
}

fn show_dir(title: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{}-{}", slugify(title), year),
        None => slugify(title),
    }
}

/// Movie directory name: `<slug>-<year>[-<resolution>][-<codec>]`.
/// The codec is appended only for h265/x265.
pub fn generate_movie_target_path(
    title: &str,
    year: i32,
    resolution: Option<&str>,
    video_codec: Option<&str>,
) -> String {
    let mut leaf = format!("{}-{}", slugify(title), year);
    if let Some(resolution) = resolution.filter(|r| !r.is_empty()) {
        leaf.push('-');
        leaf.push_str(&resolution.to_lowercase());
    }
    if let Some(codec) = video_codec.map(normalize_codec) {
        if codec == "h265" || codec == "x265" {
            leaf.push('-');
            leaf.push_str(&codec);
        }
    }
    leaf
}

/// `(<show>-<year>/sNN, sNNeNN)` relative to the TV root
pub fn generate_tv_show_paths(
    title: &str,
    year: Option<i32>,
    season: i32,
    episode: i32,
) -> (PathBuf, String) {
    let parent = Path::new(&show_dir(title, year)).join(season_tag(season));
    let leaf = format!("{}e{:02}", season_tag(season), episode);
    (parent, leaf)
}

/// `(<show>-<year>, sNN)` relative to the TV root; shared by episode packs
pub fn generate_tv_season_paths(title: &str, year: Option<i32>, season: i32) -> (PathBuf, String) {
    (PathBuf::from(show_dir(title, year)), season_tag(season))
}

fn required<T: Clone>(value: &Option<T>, field: &str) -> PipelineResult<T> {
    value
        .clone()
        .ok_or_else(|| PipelineError::transfer(format!("cannot build target path: {} is null", field)))
}

/// Work out source and destination for a downloaded row
pub fn plan_transfer(item: &MediaItem, config: &TransferConfig) -> PipelineResult<TransferPlan> {
    let original = required(&item.original_path, "original_path")?;
    let source = config.download_dir.join(original);
    let title = required(&item.media_title, "media_title")?;

    let (parent, leaf, mode) = match item.media_type {
        MediaType::Movie => {
            let year = required(&item.release_year, "release_year")?;
            let leaf = generate_movie_target_path(
                &title,
                year,
                item.resolution.as_deref(),
                item.video_codec.as_deref(),
            );
            (config.movie_dir.clone(), leaf, TransferMode::Overwrite)
        }
        MediaType::TvShow => {
            let season = required(&item.season, "season")?;
            let episode = required(&item.episode, "episode")?;
            let (parent, leaf) = generate_tv_show_paths(&title, item.release_year, season, episode);
            (config.tv_show_dir.join(parent), leaf, TransferMode::Overwrite)
        }
        MediaType::TvSeason | MediaType::TvEpisodePack => {
            let season = required(&item.season, "season")?;
            let (parent, leaf) = generate_tv_season_paths(&title, item.release_year, season);
            let mode = if item.media_type == MediaType::TvEpisodePack {
                TransferMode::Merge
            } else {
                TransferMode::Overwrite
            };
            (config.tv_show_dir.join(parent), leaf, mode)
        }
        MediaType::Unknown => {
            return Err(PipelineError::transfer("cannot build target path: media_type is unknown"))
        }
    };

    Ok(TransferPlan {
        source,
        target: parent.join(leaf),
        parent,
        mode,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> TransferConfig {
        TransferConfig {
            download_dir: PathBuf::from("/downloads"),
            movie_dir: PathBuf::from("/movies"),
            tv_show_dir: PathBuf::from("/tv"),
            uid: 1005,
            gid: 1001,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Paranormal Activity 2"), "paranormal-activity-2");
        assert_eq!(slugify("  Mission: Impossible -- Fallout! "), "mission-impossible-fallout");
        assert_eq!(slugify("Amélie"), "am-lie");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_normalize_codec() {
        assert_eq!(normalize_codec("H.265"), "h265");
        assert_eq!(normalize_codec("H 265"), "h265");
        assert_eq!(normalize_codec("x265"), "x265");
        assert_eq!(normalize_codec("HEVC"), "hevc");
    }

    #[test]
    fn test_movie_leaf() {
        assert_eq!(
            generate_movie_target_path("Paranormal Activity 2", 2010, Some("1080p"), None),
            "paranormal-activity-2-2010-1080p"
        );
        assert_eq!(
            generate_movie_target_path("Dune Part Two", 2024, Some("2160p"), Some("H.265")),
            "dune-part-two-2024-2160p-h265"
        );
        assert_eq!(
            generate_movie_target_path("Heat", 1995, None, Some("x264")),
            "heat-1995"
        );
    }

    #[test]
    fn test_tv_paths() {
        let (parent, leaf) = generate_tv_show_paths("Severance", Some(2022), 2, 5);
        assert_eq!(parent, PathBuf::from("severance-2022/s02"));
        assert_eq!(leaf, "s02e05");

        let (parent, leaf) = generate_tv_show_paths("The Simpsons", Some(1989), 104, 1234);
        assert_eq!(parent, PathBuf::from("the-simpsons-1989/s104"));
        assert_eq!(leaf, "s104e1234");

        let (parent, leaf) = generate_tv_season_paths("The Office US", Some(2005), 5);
        assert_eq!(parent, PathBuf::from("the-office-us-2005"));
        assert_eq!(leaf, "s05");
    }

    #[test]
    fn test_plan_for_movie() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "x").unwrap();
        item.media_type = MediaType::Movie;
        item.media_title = Some("Paranormal Activity 2".into());
        item.release_year = Some(2010);
        item.resolution = Some("1080p".into());
        item.original_path = Some("Paranormal.Activity.2.2010.1080p.BluRay.x264.YIFY".into());

        let plan = plan_transfer(&item, &config()).unwrap();
        assert_eq!(
            plan.source,
            PathBuf::from("/downloads/Paranormal.Activity.2.2010.1080p.BluRay.x264.YIFY")
        );
        assert_eq!(plan.parent, PathBuf::from("/movies"));
        assert_eq!(plan.target, PathBuf::from("/movies/paranormal-activity-2-2010-1080p"));
        assert_eq!(plan.mode, TransferMode::Overwrite);
    }

    #[test]
    fn test_plan_for_episode_pack_merges() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "x").unwrap();
        item.media_type = MediaType::TvEpisodePack;
        item.media_title = Some("Slow Horses".into());
        item.release_year = Some(2022);
        item.season = Some(4);
        item.original_path = Some("Slow.Horses.S04.E01-E03".into());

        let plan = plan_transfer(&item, &config()).unwrap();
        assert_eq!(plan.target, PathBuf::from("/tv/slow-horses-2022/s04"));
        assert_eq!(plan.mode, TransferMode::Merge);
    }

    #[test]
    fn test_plan_requires_fields() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "x").unwrap();
        item.media_type = MediaType::Movie;
        item.original_path = Some("x".into());
        let err = plan_transfer(&item, &config()).unwrap_err();
        assert!(err.to_string().contains("media_title is null"));
    }
}
