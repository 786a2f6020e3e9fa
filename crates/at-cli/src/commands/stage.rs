//! `at <stage>` and `at run`

use anyhow::Context;
use at_pipeline::{Pipeline, Settings, Stage};

/// Run a single stage
pub async fn run(settings: Settings, stage: Stage) -> anyhow::Result<()> {
    let pipeline = Pipeline::connect(settings)
        .await
        .context("Failed to start pipeline")?;
    let report = pipeline
        .run_stage(stage)
        .await
        .with_context(|| format!("Stage {} failed", stage))?;
    println!("{}: {}", stage, report);
    Ok(())
}

/// Run all ten stages; only fatal errors abort the pass
pub async fn run_all(settings: Settings) -> anyhow::Result<()> {
    let pipeline = Pipeline::connect(settings)
        .await
        .context("Failed to start pipeline")?;
    let report = pipeline.run_all().await.context("Pipeline run aborted")?;
    println!("run: {}", report);
    Ok(())
}
