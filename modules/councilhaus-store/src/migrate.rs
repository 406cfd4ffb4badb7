use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Apply the embedded schema migrations. Safe to run on every start.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;
    info!("Migrations complete");
    Ok(())
}
