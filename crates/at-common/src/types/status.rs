//! Status enums stored on every media row

use crate::error::AtError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Position of a row in the acquisition pipeline.
///
/// Each stage reads rows in exactly one status and writes them in the next;
/// [`PipelineStatus::can_transition_to`] encodes which moves are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    #[default]
    Ingested,
    Parsed,
    FileAccepted,
    MetadataCollected,
    MediaAccepted,
    Downloading,
    Downloaded,
    Transferred,
    Complete,
    Rejected,
}

impl PipelineStatus {
    /// All statuses in pipeline order
    pub const ALL: [PipelineStatus; 10] = [
        PipelineStatus::Ingested,
        PipelineStatus::Parsed,
        PipelineStatus::FileAccepted,
        PipelineStatus::MetadataCollected,
        PipelineStatus::MediaAccepted,
        PipelineStatus::Downloading,
        PipelineStatus::Downloaded,
        PipelineStatus::Transferred,
        PipelineStatus::Complete,
        PipelineStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Ingested => "ingested",
            PipelineStatus::Parsed => "parsed",
            PipelineStatus::FileAccepted => "file_accepted",
            PipelineStatus::MetadataCollected => "metadata_collected",
            PipelineStatus::MediaAccepted => "media_accepted",
            PipelineStatus::Downloading => "downloading",
            PipelineStatus::Downloaded => "downloaded",
            PipelineStatus::Transferred => "transferred",
            PipelineStatus::Complete => "complete",
            PipelineStatus::Rejected => "rejected",
        }
    }

    /// `complete` and `rejected` end a row's progress
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Complete | PipelineStatus::Rejected)
    }

    /// Whether a row may move from `self` to `next`.
    ///
    /// Forward arrows follow the stage table. Two backward arrows exist:
    /// `downloading -> ingested` when the daemon has lost the torrent, and
    /// `* -> ingested` for re-adoption and operator resets. Rewriting a row in
    /// its current status is always allowed.
    pub fn can_transition_to(&self, next: PipelineStatus) -> bool {
        use PipelineStatus::*;

        if *self == next || next == Ingested {
            return true;
        }

        matches!(
            (self, next),
            (Ingested, Parsed)
                | (Parsed, FileAccepted)
                | (Parsed, Rejected)
                | (FileAccepted, MetadataCollected)
                | (FileAccepted, Rejected)
                | (MetadataCollected, MediaAccepted)
                | (MetadataCollected, Rejected)
                | (MediaAccepted, Downloading)
                | (Downloading, Downloaded)
                | (Downloading, Rejected)
                | (Downloaded, Transferred)
                | (Downloaded, Rejected)
                | (Transferred, Complete)
        )
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = AtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AtError::invalid_enum("pipeline_status", s))
    }
}

/// Filter outcome recorded on a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RejectionStatus {
    #[default]
    Unfiltered,
    Accepted,
    Rejected,
    /// Operator-adopted; exempt from rule and model rejection
    Override,
}

impl RejectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionStatus::Unfiltered => "unfiltered",
            RejectionStatus::Accepted => "accepted",
            RejectionStatus::Rejected => "rejected",
            RejectionStatus::Override => "override",
        }
    }
}

impl fmt::Display for RejectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionStatus {
    type Err = AtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unfiltered" => Ok(RejectionStatus::Unfiltered),
            "accepted" => Ok(RejectionStatus::Accepted),
            "rejected" => Ok(RejectionStatus::Rejected),
            "override" => Ok(RejectionStatus::Override),
            _ => Err(AtError::invalid_enum("rejection_status", s)),
        }
    }
}

/// What kind of release a torrent contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    TvShow,
    TvSeason,
    TvEpisodePack,
    #[default]
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::TvShow => "tv_show",
            MediaType::TvSeason => "tv_season",
            MediaType::TvEpisodePack => "tv_episode_pack",
            MediaType::Unknown => "unknown",
        }
    }

    /// Any of the three TV flavours
    pub fn is_tv(&self) -> bool {
        matches!(
            self,
            MediaType::TvShow | MediaType::TvSeason | MediaType::TvEpisodePack
        )
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = AtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tv_show" => Ok(MediaType::TvShow),
            "tv_season" => Ok(MediaType::TvSeason),
            "tv_episode_pack" => Ok(MediaType::TvEpisodePack),
            "unknown" => Ok(MediaType::Unknown),
            _ => Err(AtError::invalid_enum("media_type", s)),
        }
    }
}

/// Watch decision stored in the training table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    WouldWatch,
    WouldNotWatch,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::WouldWatch => "would_watch",
            Label::WouldNotWatch => "would_not_watch",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = AtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "would_watch" => Ok(Label::WouldWatch),
            "would_not_watch" => Ok(Label::WouldNotWatch),
            _ => Err(AtError::invalid_enum("label", s)),
        }
    }
}
