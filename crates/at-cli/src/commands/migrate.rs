//! `at migrate` command implementation

use at_pipeline::db::{create_pool, run_migrations};
use at_pipeline::Settings;

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let pool = create_pool(&settings.database).await?;
    run_migrations(&pool).await?;
    println!("Migrations applied");
    Ok(())
}
