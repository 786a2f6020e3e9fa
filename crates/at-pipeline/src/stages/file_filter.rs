use super::{clear_errors, settle, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::PipelineStatus;

/// Stage 4: apply the configured per-media-type field rules
pub async fn file_filter(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::Parsed).await?;
    let snapshot = items.clone();
    let mut report = StageReport::default();

    clear_errors(&mut items);
    for item in items.iter_mut() {
        pipeline.settings.filter.apply(item);
        settle(item, PipelineStatus::FileAccepted);
        report.tally(PipelineStatus::Parsed, item);
    }

    write_changed(pipeline, &items, &snapshot).await?;
    Ok(report)
}
