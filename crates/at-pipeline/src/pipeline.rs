//! Stage context and orchestration

use crate::clients::{
    FeedSource, HttpMetadataProvider, MetadataProvider, Recommender, ReelDriverClient, RssClient,
    TorrentClient, TransmissionClient,
};
use crate::clock::{Clock, SystemClock};
use crate::config::Settings;
use crate::db::{create_pool, MediaRepository, PgRepository};
use crate::error::{PipelineError, PipelineResult};
use crate::parser::TitleParser;
use crate::stages;
use at_common::types::{MediaItem, PipelineStatus};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// One scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Ingest,
    Collect,
    Parse,
    FileFilter,
    Metadata,
    MediaFilter,
    Initiate,
    DownloadCheck,
    Transfer,
    Cleanup,
}

impl Stage {
    /// Every stage in execution order
    pub const ALL: [Stage; 10] = [
        Stage::Ingest,
        Stage::Collect,
        Stage::Parse,
        Stage::FileFilter,
        Stage::Metadata,
        Stage::MediaFilter,
        Stage::Initiate,
        Stage::DownloadCheck,
        Stage::Transfer,
        Stage::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Collect => "collect",
            Stage::Parse => "parse",
            Stage::FileFilter => "file-filter",
            Stage::Metadata => "metadata",
            Stage::MediaFilter => "media-filter",
            Stage::Initiate => "initiate",
            Stage::DownloadCheck => "check",
            Stage::Transfer => "transfer",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| PipelineError::not_found("stage", s))
    }
}

/// Row counts for one stage run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Rows the stage picked up or created
    pub processed: usize,
    /// Rows moved to the stage's success status
    pub advanced: usize,
    pub rejected: usize,
    /// Rows left in place with an error annotation
    pub errored: usize,
}

impl StageReport {
    /// Count the outcome of one row that started the run in `before`
    pub fn tally(&mut self, before: PipelineStatus, item: &MediaItem) {
        self.processed += 1;
        if item.error_status {
            self.errored += 1;
        } else if item.pipeline_status == PipelineStatus::Rejected && before != PipelineStatus::Rejected {
            self.rejected += 1;
        } else if item.pipeline_status != before {
            self.advanced += 1;
        }
    }

    pub fn merge(&mut self, other: &StageReport) {
        self.processed += other.processed;
        self.advanced += other.advanced;
        self.rejected += other.rejected;
        self.errored += other.errored;
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed={} advanced={} rejected={} errored={}",
            self.processed, self.advanced, self.rejected, self.errored
        )
    }
}

/// External collaborators a stage may call
pub struct Services {
    pub torrents: Arc<dyn TorrentClient>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub recommender: Arc<dyn Recommender>,
    pub feeds: Arc<dyn FeedSource>,
}

/// Everything a stage run needs, built once per process
pub struct Pipeline {
    pub settings: Settings,
    pub repo: Arc<dyn MediaRepository>,
    pub services: Services,
    pub clock: Arc<dyn Clock>,
    pub parser: TitleParser,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        repo: Arc<dyn MediaRepository>,
        services: Services,
        clock: Arc<dyn Clock>,
    ) -> PipelineResult<Self> {
        let parser = TitleParser::new(&settings.parser)?;
        Ok(Self {
            settings,
            repo,
            services,
            clock,
            parser,
        })
    }

    /// Production wiring: Postgres plus the HTTP clients
    pub async fn connect(settings: Settings) -> PipelineResult<Self> {
        let pool = create_pool(&settings.database).await?;
        let timeout = settings.http_timeout_secs;

        let services = Services {
            torrents: Arc::new(TransmissionClient::new(&settings.transmission, timeout)?),
            metadata: Arc::new(HttpMetadataProvider::new(&settings.metadata, timeout)?),
            recommender: Arc::new(ReelDriverClient::new(&settings.reel_driver, timeout)?),
            feeds: Arc::new(RssClient::new(timeout)?),
        };

        Self::new(
            settings,
            Arc::new(PgRepository::new(pool)),
            services,
            Arc::new(SystemClock),
        )
    }

    pub async fn run_stage(&self, stage: Stage) -> PipelineResult<StageReport> {
        tracing::info!(stage = %stage, "Stage started");

        let report = match stage {
            Stage::Ingest => stages::ingest(self).await,
            Stage::Collect => stages::collect(self).await,
            Stage::Parse => stages::parse(self).await,
            Stage::FileFilter => stages::file_filter(self).await,
            Stage::Metadata => stages::metadata(self).await,
            Stage::MediaFilter => stages::media_filter(self).await,
            Stage::Initiate => stages::initiate(self).await,
            Stage::DownloadCheck => stages::download_check(self).await,
            Stage::Transfer => stages::transfer(self).await,
            Stage::Cleanup => stages::cleanup(self).await,
        }?;

        tracing::info!(stage = %stage, %report, "Stage finished");
        Ok(report)
    }

    /// Run every stage in order. A failing stage is logged and the next one
    /// still runs; only fatal errors stop the sequence.
    pub async fn run_all(&self) -> PipelineResult<StageReport> {
        let mut total = StageReport::default();
        for stage in Stage::ALL {
            match self.run_stage(stage).await {
                Ok(report) => total.merge(&report),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::error!(stage = %stage, error = %e, "Stage failed"),
            }
        }
        Ok(total)
    }
}
