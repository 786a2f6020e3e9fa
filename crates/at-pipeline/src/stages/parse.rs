use super::{annotate, clear_errors, settle, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::PipelineStatus;

/// Stage 3: extract structured attributes from `original_title`.
///
/// Rows failing verification keep `ingested` with one `"<field> is null"`
/// condition per missing field, so a corrected parser can retry them.
pub async fn parse(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::Ingested).await?;
    let snapshot = items.clone();
    let mut report = StageReport::default();

    clear_errors(&mut items);
    for item in items.iter_mut() {
        pipeline.parser.parse_item(item);
        for problem in pipeline.parser.verify(item) {
            annotate(item, problem);
        }
        settle(item, PipelineStatus::Parsed);
        report.tally(PipelineStatus::Ingested, item);
    }

    write_changed(pipeline, &items, &snapshot).await?;
    Ok(report)
}
