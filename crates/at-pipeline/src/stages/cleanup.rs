use super::{advance, annotate, settle, write_changed};
use crate::config::CleanupConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::{MediaItem, PipelineStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

pub const HUNG_REASON: &str = "exceeded time limit";

/// Scale applied to both cleanup delays.
///
/// `target / active` when both are positive, otherwise 1.0.
pub fn delay_multiplier(target_active_items: i64, active_count: usize) -> PipelineResult<f64> {
    if target_active_items < 0 {
        return Err(PipelineError::config(format!(
            "TARGET_ACTIVE_ITEMS cannot be negative: {}",
            target_active_items
        )));
    }
    if target_active_items > 0 && active_count > 0 {
        Ok(target_active_items as f64 / active_count as f64)
    } else {
        Ok(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupDelays {
    pub transferred: Duration,
    pub hung: Duration,
}

fn scaled(secs: i64, multiplier: f64) -> Duration {
    Duration::milliseconds((secs as f64 * multiplier * 1000.0).round() as i64)
}

pub fn cleanup_delays(config: &CleanupConfig, multiplier: f64) -> PipelineResult<CleanupDelays> {
    config.validate()?;
    Ok(CleanupDelays {
        transferred: scaled(config.transferred_delay_secs, multiplier),
        hung: scaled(config.hung_delay_secs, multiplier),
    })
}

fn older_than(item: &MediaItem, now: DateTime<Utc>, delay: Duration) -> bool {
    item.updated_at.is_some_and(|at| now - at > delay)
}

/// Reject a hung download whose torrent is gone from the daemon.
///
/// An override row keeps `override` and gets no reason; only `at reset`
/// clears it.
fn retire_hung(item: &mut MediaItem) {
    if !item.reject(HUNG_REASON) {
        tracing::warn!(hash = %item.hash, "Hung override torrent removed");
    }
    advance(item, PipelineStatus::Rejected);
}

/// Stage 10 against the pipeline clock
pub async fn cleanup(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    cleanup_at(pipeline, pipeline.clock.now()).await
}

/// Stage 10: retire transferred torrents and reject hung downloads
pub async fn cleanup_at(pipeline: &Pipeline, now: DateTime<Utc>) -> PipelineResult<StageReport> {
    let config = &pipeline.settings.cleanup;
    config.validate()?;

    let torrents = pipeline.services.torrents.get_torrents().await?;
    let multiplier = delay_multiplier(config.target_active_items, torrents.len())?;
    let delays = cleanup_delays(config, multiplier)?;
    tracing::debug!(
        active = torrents.len(),
        multiplier,
        transferred_secs = delays.transferred.num_seconds(),
        hung_secs = delays.hung.num_seconds(),
        "Cleanup delays"
    );
    let in_daemon: HashSet<String> = torrents
        .into_iter()
        .map(|t| t.hash.to_ascii_lowercase())
        .collect();

    let mut report = StageReport::default();

    let mut transferred = pipeline.repo.get_items_by_status(PipelineStatus::Transferred).await?;
    let snapshot = transferred.clone();
    for item in transferred
        .iter_mut()
        .filter(|item| older_than(item, now, delays.transferred))
    {
        item.clear_error();
        match pipeline.services.torrents.remove_torrent(&item.hash).await {
            Ok(()) => settle(item, PipelineStatus::Complete),
            Err(e) => annotate(item, format!("torrent removal error - {}", e)),
        }
        report.tally(PipelineStatus::Transferred, item);
    }
    write_changed(pipeline, &transferred, &snapshot).await?;

    let mut downloading = pipeline.repo.get_items_by_status(PipelineStatus::Downloading).await?;
    let snapshot = downloading.clone();
    for item in downloading
        .iter_mut()
        .filter(|item| in_daemon.contains(&item.hash) && older_than(item, now, delays.hung))
    {
        item.clear_error();
        match pipeline.services.torrents.remove_torrent(&item.hash).await {
            Ok(()) => retire_hung(item),
            Err(e) => annotate(item, format!("torrent removal error - {}", e)),
        }
        report.tally(PipelineStatus::Downloading, item);
    }
    write_changed(pipeline, &downloading, &snapshot).await?;

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use at_common::types::RejectionStatus;

    fn downloading() -> MediaItem {
        let mut item = MediaItem::new("08105069d7ef1d1e2d15d0a7b1e0d4d7c1be6eb4", "Slow.Film.2010").unwrap();
        item.pipeline_status = PipelineStatus::Downloading;
        item
    }

    #[test]
    fn test_hung_accepted_row_is_rejected_with_reason() {
        let mut item = downloading();
        item.rejection_status = RejectionStatus::Accepted;
        retire_hung(&mut item);
        assert_eq!(item.pipeline_status, PipelineStatus::Rejected);
        assert_eq!(item.rejection_status, RejectionStatus::Rejected);
        assert_eq!(item.rejection_reason.as_deref(), Some(HUNG_REASON));
        assert!(item.validate_invariants().is_ok());
    }

    #[test]
    fn test_hung_override_row_keeps_override() {
        let mut item = downloading();
        item.rejection_status = RejectionStatus::Override;
        retire_hung(&mut item);
        assert_eq!(item.pipeline_status, PipelineStatus::Rejected);
        assert_eq!(item.rejection_status, RejectionStatus::Override);
        assert_eq!(item.rejection_reason, None);
        assert!(item.validate_invariants().is_ok());
    }

    #[test]
    fn test_multiplier_boundaries() {
        assert_eq!(delay_multiplier(0, 10).unwrap(), 1.0);
        assert_eq!(delay_multiplier(10, 0).unwrap(), 1.0);
        assert_eq!(delay_multiplier(10, 20).unwrap(), 0.5);
        assert_eq!(delay_multiplier(30, 10).unwrap(), 3.0);
        assert!(delay_multiplier(-1, 10).unwrap_err().is_fatal());
    }

    #[test]
    fn test_delays_scale() {
        let config = CleanupConfig {
            transferred_delay_secs: 86_400,
            hung_delay_secs: 259_200,
            target_active_items: 10,
        };
        let delays = cleanup_delays(&config, 0.5).unwrap();
        assert_eq!(delays.transferred, Duration::hours(12));
        assert_eq!(delays.hung, Duration::hours(36));
    }

    #[test]
    fn test_negative_delays_are_fatal() {
        for (transferred, hung) in [(-1, 60), (60, -1)] {
            let config = CleanupConfig {
                transferred_delay_secs: transferred,
                hung_delay_secs: hung,
                target_active_items: 0,
            };
            assert!(cleanup_delays(&config, 1.0).unwrap_err().is_fatal());
        }
    }
}
