use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use tracing::{debug, info, trace};

/// Applies every pending migration, including the seeded roles and tariffs.
pub async fn apply_migrations(db: &DatabaseConnection) -> Result<()> {
    let pending = Migrator::get_pending_migrations(db)
        .await
        .context("Failed to read migration state")?;
    info!("Applying {} pending migrations", pending.len());
    Migrator::up(db, None)
        .await
        .context("Failed to run database migrations")?;
    debug!("All pending migrations have been applied");
    Ok(())
}

pub async fn init_database(database_url: &str) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database {}", database_url);

    let db = Database::connect(database_url)
        .await
        .with_context(|| format!("Failed to connect to database '{database_url}'"))?;
    apply_migrations(&db).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}
