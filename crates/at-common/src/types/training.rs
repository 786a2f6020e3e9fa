//! Rows of the `training` table

use super::media::MediaItem;
use super::status::{Label, MediaType};
use serde::{Deserialize, Serialize};

/// Watch label keyed by imdb id.
///
/// Written unlabeled after metadata collection and labeled once the media
/// filter decides. `anomalous` labels override the model on later passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingLabel {
    pub imdb_id: String,
    pub tmdb_id: Option<i64>,
    pub media_type: MediaType,
    pub media_title: Option<String>,
    pub release_year: Option<i32>,
    pub label: Option<Label>,
    pub human_labeled: bool,
    pub anomalous: bool,
    pub reviewed: bool,
}

impl TrainingLabel {
    /// Unlabeled row for an item; `None` without an imdb id
    pub fn unlabeled(item: &MediaItem) -> Option<Self> {
        let imdb_id = item.imdb_id.clone()?;
        Some(Self {
            imdb_id,
            tmdb_id: item.tmdb_id,
            media_type: item.media_type,
            media_title: item.media_title.clone(),
            release_year: item.release_year,
            label: None,
            human_labeled: false,
            anomalous: false,
            reviewed: false,
        })
    }

    /// Labeled row recording a filter decision
    pub fn decided(item: &MediaItem, label: Label) -> Option<Self> {
        Self::unlabeled(item).map(|row| Self {
            label: Some(label),
            ..row
        })
    }
}

/// Keep the first row per imdb id, preserving order
pub fn dedup_by_imdb_id(rows: Vec<TrainingLabel>) -> Vec<TrainingLabel> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.imdb_id.clone()))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_imdb_id() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "t").unwrap();
        assert!(TrainingLabel::unlabeled(&item).is_none());

        item.imdb_id = Some("tt1536044".into());
        item.release_year = Some(2010);
        let row = TrainingLabel::decided(&item, Label::WouldWatch).unwrap();
        assert_eq!(row.imdb_id, "tt1536044");
        assert_eq!(row.label, Some(Label::WouldWatch));
        assert!(!row.anomalous);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "t").unwrap();
        item.imdb_id = Some("tt1".into());
        let rows = vec![
            TrainingLabel::decided(&item, Label::WouldWatch).unwrap(),
            TrainingLabel::decided(&item, Label::WouldNotWatch).unwrap(),
        ];
        let rows = dedup_by_imdb_id(rows);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, Some(Label::WouldWatch));
    }
}
