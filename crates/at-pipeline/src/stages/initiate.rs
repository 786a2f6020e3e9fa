use super::{annotate, clear_errors, settle, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::PipelineStatus;

/// Stage 7: hand accepted rows to the torrent daemon
pub async fn initiate(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::MediaAccepted).await?;
    let mut report = StageReport::default();

    for batch in items.chunks_mut(pipeline.settings.batch_size) {
        let snapshot = batch.to_vec();
        clear_errors(batch);

        for item in batch.iter_mut() {
            let Some(link) = item.original_link.clone() else {
                annotate(item, "original_link is null");
                report.tally(PipelineStatus::MediaAccepted, item);
                continue;
            };
            match pipeline.services.torrents.add_torrent(&link).await {
                Ok(()) => settle(item, PipelineStatus::Downloading),
                Err(e) => annotate(item, format!("download initiation error - {}", e)),
            }
            report.tally(PipelineStatus::MediaAccepted, item);
        }

        write_changed(pipeline, batch, &snapshot).await?;
    }

    Ok(report)
}
