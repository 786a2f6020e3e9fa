use super::{annotate, clear_errors, settle, write_changed};
use crate::clients::PredictionInput;
use crate::error::PipelineResult;
use crate::pipeline::{Pipeline, StageReport};
use at_common::types::{
    dedup_by_imdb_id, Label, MediaItem, MediaType, PipelineStatus, RejectionStatus, TrainingLabel,
};
use std::collections::HashMap;

/// Accept or reject on a model probability
fn decide(item: &mut MediaItem, probability: f64, threshold: f64) {
    if probability < threshold {
        item.reject(format!(
            "probability {:.3} below threshold {}",
            probability, threshold
        ));
    } else {
        item.accept();
    }
}

/// Probabilities by imdb id, plus per-id failures from the single-item path
async fn predict(
    pipeline: &Pipeline,
    inputs: &[PredictionInput],
) -> (HashMap<String, f64>, HashMap<String, String>) {
    let recommender = &pipeline.services.recommender;
    let mut failures = HashMap::new();

    if inputs.len() > 1 {
        match recommender.predict_batch(inputs).await {
            Ok(probabilities) => return (probabilities, failures),
            Err(e) => tracing::warn!(error = %e, size = inputs.len(), "Batch prediction failed, predicting per item"),
        }
    }

    let mut probabilities = HashMap::new();
    for input in inputs {
        match recommender.predict(input).await {
            Ok(p) => {
                probabilities.insert(input.imdb_id.clone(), p);
            }
            Err(e) => {
                failures.insert(input.imdb_id.clone(), e.to_string());
            }
        }
    }
    (probabilities, failures)
}

async fn process_batch(pipeline: &Pipeline, batch: &mut [MediaItem]) -> PipelineResult<()> {
    clear_errors(batch);
    let threshold = pipeline.settings.reel_driver.threshold;

    let imdb_ids: Vec<String> = batch
        .iter()
        .filter(|item| item.media_type == MediaType::Movie)
        .filter_map(|item| item.imdb_id.clone())
        .collect();
    let anomalous: HashMap<String, TrainingLabel> = if imdb_ids.is_empty() {
        HashMap::new()
    } else {
        pipeline
            .repo
            .get_training_labels(&imdb_ids)
            .await?
            .into_iter()
            .filter(|row| row.anomalous)
            .map(|row| (row.imdb_id.clone(), row))
            .collect()
    };

    let mut to_score = Vec::new();
    for (index, item) in batch.iter_mut().enumerate() {
        if item.media_type != MediaType::Movie || item.is_override() {
            item.accept();
            continue;
        }
        let Some(imdb_id) = item.imdb_id.clone() else {
            item.reject("no imdb_id for media filtration");
            continue;
        };
        match anomalous.get(&imdb_id).and_then(|row| row.label) {
            Some(Label::WouldNotWatch) => {
                item.reject("anomalous - previously failed reel-driver");
            }
            Some(Label::WouldWatch) => item.accept(),
            None => to_score.push(index),
        }
    }

    let inputs: Vec<PredictionInput> = to_score
        .iter()
        .filter_map(|&i| PredictionInput::from_item(&batch[i]))
        .collect();
    let (probabilities, failures) = if inputs.is_empty() {
        (HashMap::new(), HashMap::new())
    } else {
        predict(pipeline, &inputs).await
    };

    for &index in &to_score {
        let item = &mut batch[index];
        let imdb_id = item.imdb_id.clone().unwrap_or_default();
        if let Some(err) = failures.get(&imdb_id) {
            let condition = format!("media filtration error - {} - {}", item.hash, err);
            annotate(item, condition);
        } else if let Some(&probability) = probabilities.get(&imdb_id) {
            tracing::debug!(hash = %item.hash, probability, "Scored");
            decide(item, probability, threshold);
        } else {
            annotate(item, "failed to assign probability");
        }
    }

    let labels = dedup_by_imdb_id(
        batch
            .iter()
            .filter(|item| item.media_type == MediaType::Movie && !item.error_status)
            .filter_map(|item| match item.rejection_status {
                RejectionStatus::Accepted => TrainingLabel::decided(item, Label::WouldWatch),
                RejectionStatus::Rejected => TrainingLabel::decided(item, Label::WouldNotWatch),
                _ => None,
            })
            .collect(),
    );
    if !labels.is_empty() {
        pipeline.repo.training_db_upsert(&labels).await?;
    }

    for item in batch.iter_mut() {
        settle(item, PipelineStatus::MediaAccepted);
    }
    Ok(())
}

/// Stage 6: prior labels, then the recommendation model, for movies
pub async fn media_filter(pipeline: &Pipeline) -> PipelineResult<StageReport> {
    let mut items = pipeline
        .repo
        .get_items_by_status(PipelineStatus::MetadataCollected)
        .await?;
    let mut report = StageReport::default();

    for batch in items.chunks_mut(pipeline.settings.batch_size) {
        let snapshot = batch.to_vec();
        if let Err(e) = process_batch(pipeline, batch).await {
            tracing::error!(error = %e, size = batch.len(), "Media filter batch failed");
            continue;
        }
        for item in batch.iter() {
            report.tally(PipelineStatus::MetadataCollected, item);
        }
        write_changed(pipeline, batch, &snapshot).await?;
    }

    Ok(report)
}
