/// Database migration runner
///
/// Migrations live in the workspace-level `migrations/` directory and are
/// embedded into the binary at compile time with `sqlx::migrate!`.
///
/// # Example
///
/// ```no_run
/// use sitebook_shared::db::pool::{create_pool, DatabaseConfig};
/// use sitebook_shared::db::migrations::{run_migrations, get_migration_status};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     })
///     .await?;
///
///     run_migrations(&pool).await?;
///
///     let status = get_migration_status(&pool).await?;
///     println!("Applied {} migrations", status.applied_migrations);
///     Ok(())
/// }
/// ```

use sqlx::{migrate::MigrateDatabase, migrate::Migrator, postgres::PgPool, Postgres};
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Where the schema stands relative to the embedded migrations
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub latest_version: Option<i64>,
    pub is_up_to_date: bool,

    /// Embedded migrations not yet applied, as `version description`
    pub pending: Vec<String>,
}

/// Applies every pending migration in version order
///
/// A migration that fails is rolled back and the error returned; later
/// migrations are not attempted.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    let embedded = MIGRATOR.iter().count();
    info!(embedded, "Applying SiteBook schema migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Schema migration failed");
        e
    })?;

    info!("Schema is up to date");
    Ok(())
}

/// Compares the successful rows of `_sqlx_migrations` with the embedded set
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let has_table: bool = sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations') IS NOT NULL")
        .fetch_one(pool)
        .await?;

    let applied: HashSet<i64> = if has_table {
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    let pending: Vec<String> = MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .map(|m| format!("{} {}", m.version, m.description))
        .collect();

    debug!(applied = applied.len(), pending = pending.len(), "Migration status");

    Ok(MigrationStatus {
        applied_migrations: applied.len(),
        latest_version: applied.iter().copied().max(),
        is_up_to_date: pending.is_empty(),
        pending,
    })
}

/// Creates the database named in `database_url` when missing (local setup and tests)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        return Ok(());
    }

    info!("Creating SiteBook database");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|m| m.version).collect();
        assert!(!versions.is_empty());

        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_change_feed_migration_is_last() {
        let last = MIGRATOR.iter().last().expect("at least one migration");
        assert!(last.description.contains("change feed"));
    }
}
