//! Shared harness for pipeline integration tests
//!
//! Builds a [`Pipeline`] over [`MemoryRepository`] and the in-memory
//! collaborators, all reading one [`ManualClock`].

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use at_common::types::{MediaItem, MediaType, PipelineStatus};
use at_pipeline::clock::ManualClock;
use at_pipeline::config::FeedSpec;
use at_pipeline::db::{MediaRepository, MemoryRepository};
use at_pipeline::testing::{FakeFeedSource, FakeMetadataProvider, FakeRecommender, FakeTorrentClient};
use at_pipeline::{Pipeline, Services, Settings};
use chrono::{TimeZone, Utc};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const YTS_FEED: &str = "https://yts.mx/rss/0/1080p/all/0";
pub const EPISODE_FEED: &str = "https://episodefeed.com/rss/1/0";

/// Scratch download/movie/tv directories owned by the current user
pub struct Library {
    pub root: TempDir,
    pub downloads: PathBuf,
    pub movies: PathBuf,
    pub tv: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

impl Library {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let downloads = root.path().join("downloads");
        let movies = root.path().join("movies");
        let tv = root.path().join("tv");
        for dir in [&downloads, &movies, &tv] {
            std::fs::create_dir_all(dir).unwrap();
        }
        let meta = std::fs::metadata(root.path()).unwrap();
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            root,
            downloads,
            movies,
            tv,
        }
    }

    /// Write a file below the download directory
    pub fn download(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        let path = self.downloads.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }
}

pub fn settings(library: &Library) -> Settings {
    let mut settings = Settings::default();
    settings.feeds = vec![
        FeedSpec {
            source: "yts.mx".into(),
            url: YTS_FEED.into(),
        },
        FeedSpec {
            source: "episodefeed.com".into(),
            url: EPISODE_FEED.into(),
        },
    ];
    settings.transfer.download_dir = library.downloads.clone();
    settings.transfer.movie_dir = library.movies.clone();
    settings.transfer.tv_show_dir = library.tv.clone();
    settings.transfer.uid = library.uid;
    settings.transfer.gid = library.gid;
    settings
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub repo: Arc<MemoryRepository>,
    pub daemon: Arc<FakeTorrentClient>,
    pub metadata: Arc<FakeMetadataProvider>,
    pub recommender: Arc<FakeRecommender>,
    pub clock: Arc<ManualClock>,
    pub library: Library,
}

pub struct HarnessBuilder {
    metadata: FakeMetadataProvider,
    recommender: FakeRecommender,
    feeds: FakeFeedSource,
    tweak: Box<dyn FnOnce(&mut Settings)>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            metadata: FakeMetadataProvider::new(),
            recommender: FakeRecommender::new(),
            feeds: FakeFeedSource::new(),
            tweak: Box::new(|_| {}),
        }
    }

    pub fn metadata(mut self, metadata: FakeMetadataProvider) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn recommender(mut self, recommender: FakeRecommender) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn feeds(mut self, feeds: FakeFeedSource) -> Self {
        self.feeds = feeds;
        self
    }

    pub fn settings(mut self, tweak: impl FnOnce(&mut Settings) + 'static) -> Self {
        self.tweak = Box::new(tweak);
        self
    }

    pub fn build(self) -> Harness {
        let library = Library::new();
        let mut settings = settings(&library);
        (self.tweak)(&mut settings);

        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()));
        let repo = Arc::new(MemoryRepository::with_clock(clock.clone()));
        let daemon = Arc::new(FakeTorrentClient::new());
        let metadata = Arc::new(self.metadata);
        let recommender = Arc::new(self.recommender);

        let services = Services {
            torrents: daemon.clone(),
            metadata: metadata.clone(),
            recommender: recommender.clone(),
            feeds: Arc::new(self.feeds),
        };
        let pipeline = Pipeline::new(settings, repo.clone(), services, clock.clone()).unwrap();

        Harness {
            pipeline,
            repo,
            daemon,
            metadata,
            recommender,
            clock,
            library,
        }
    }
}

impl Harness {
    pub fn row(&self, hash: &str) -> MediaItem {
        self.repo.get(hash).expect("row exists")
    }

    /// Insert a row already sitting in `status`
    pub async fn seed(&self, item: MediaItem) {
        self.repo.insert_items(&[item]).await.unwrap();
    }
}

/// A movie row that has been through parsing with every metadata field set
pub fn movie(hash: &str, title: &str, imdb_id: &str, status: PipelineStatus) -> MediaItem {
    let mut item = MediaItem::new(hash, format!("{} 2010 1080p BluRay", title)).unwrap();
    item.media_type = MediaType::Movie;
    item.media_title = Some(title.to_string());
    item.release_year = Some(2010);
    item.resolution = Some("1080p".into());
    item.imdb_id = Some(imdb_id.to_string());
    item.tmdb_id = Some(1000);
    item.pipeline_status = status;
    item
}

/// A 40-hex hash derived from a small number
pub fn hash(n: u32) -> String {
    format!("{:040x}", n)
}
