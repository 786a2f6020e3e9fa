//! Property checks for title parsing and path synthesis

#![allow(clippy::unwrap_used, clippy::expect_used)]

use at_common::types::MediaType;
use at_pipeline::parser::{ParserConfig, TitleParser};
use at_pipeline::transfer::{generate_movie_target_path, generate_tv_show_paths, slugify};
use proptest::prelude::*;

fn parser() -> TitleParser {
    TitleParser::new(&ParserConfig::default()).unwrap()
}

fn show_title() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!["Severance", "Andor", "Fargo", "Slow", "Horses", "Bear", "Office"]),
        1..4,
    )
    .prop_map(|words| words.join("."))
}

/// Title words that include bare numbers and years, as in `1917` or `Blade Runner 2049`
fn movie_title_words() -> impl Strategy<Value = Vec<String>> {
    let word = prop_oneof![
        prop::sample::select(vec!["Blade", "Runner", "Space", "Odyssey", "Part", "Heat"])
            .prop_map(str::to_string),
        (1900i32..2100).prop_map(|y| y.to_string()),
        (1i32..100).prop_map(|n| n.to_string()),
    ];
    prop::collection::vec(word, 1..4)
}

proptest! {
    #[test]
    fn test_episode_tag_gives_tv_show(title in show_title(), season in 1i32..40, episode in 1i32..99) {
        let raw = format!("{}.S{:02}E{:02}.1080p.WEB.H264-GRP", title, season, episode);
        let parsed = parser().parse(&raw);
        prop_assert_eq!(parsed.media_type, MediaType::TvShow);
        prop_assert_eq!(parsed.season, Some(season));
        prop_assert_eq!(parsed.episode, Some(episode));
    }

    #[test]
    fn test_delimited_year_gives_movie(words in movie_title_words(), year in 1950i32..2030) {
        let raw = format!("{}.{}.1080p.BluRay.x264-GRP", words.join("."), year);
        let parsed = parser().parse(&raw);
        prop_assert_eq!(parsed.media_type, MediaType::Movie);
        prop_assert_eq!(parsed.release_year, Some(year));
        prop_assert_eq!(parsed.media_title, Some(words.join(" ")));
        prop_assert_eq!(parsed.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_slug_alphabet(value in "\\PC{0,40}") {
        let slug = slugify(&value);
        prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        prop_assert!(!slug.contains("--"));
    }

    #[test]
    fn test_target_paths_are_deterministic(
        title in "[A-Za-z0-9 :'-]{1,30}",
        year in 1900i32..2100,
        season in 0i32..200,
        episode in 0i32..2000,
    ) {
        prop_assert_eq!(
            generate_movie_target_path(&title, year, Some("1080p"), Some("x265")),
            generate_movie_target_path(&title, year, Some("1080p"), Some("x265"))
        );
        let (parent, leaf) = generate_tv_show_paths(&title, Some(year), season, episode);
        prop_assert_eq!((parent, leaf), generate_tv_show_paths(&title, Some(year), season, episode));
    }
}
