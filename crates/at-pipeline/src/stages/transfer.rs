use super::{annotate, clear_errors, settle, write_changed};
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use crate::transfer::{plan_transfer, transfer_item, Ownership};
use at_common::types::{MediaItem, PipelineStatus};

async fn move_into_library(pipeline: &Pipeline, item: &mut MediaItem) {
    let config = &pipeline.settings.transfer;
    let plan = match plan_transfer(item, config) {
        Ok(plan) => plan,
        Err(e) => {
            annotate(item, format!("transfer error - {}", e));
            return;
        }
    };

    let owner = Ownership {
        uid: config.uid,
        gid: config.gid,
    };
    let parent = plan.parent.display().to_string();
    let target = plan.target.display().to_string();

    match transfer_item(plan, owner).await {
        Ok(()) => {
            tracing::debug!(hash = %item.hash, target = %target, "Transferred payload");
            item.parent_path = Some(parent);
            item.target_path = Some(target);
            settle(item, PipelineStatus::Transferred);
        }
        Err(e) => annotate(item, format!("transfer error - {}", e)),
    }
}

/// Stage 9: copy finished payloads into the library, one at a time
pub async fn transfer(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline.repo.get_items_by_status(PipelineStatus::Downloaded).await?;
    let snapshot = items.clone();
    let mut report = StageReport::default();

    clear_errors(&mut items);
    for item in items.iter_mut() {
        if item.is_rejected() {
            settle(item, PipelineStatus::Transferred);
        } else {
            move_into_library(pipeline, item).await;
        }
        report.tally(PipelineStatus::Downloaded, item);
    }

    write_changed(pipeline, &items, &snapshot).await?;
    Ok(report)
}
