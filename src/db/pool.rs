use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

/// Schema files in apply order
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_infraction_ledger",
        include_str!("../../migrations/001_infraction_ledger.sql"),
    ),
    (
        "002_moderation_configs",
        include_str!("../../migrations/002_moderation_configs.sql"),
    ),
    (
        "003_scheduled_reversals",
        include_str!("../../migrations/003_scheduled_reversals.sql"),
    ),
    (
        "004_open_proposals",
        include_str!("../../migrations/004_open_proposals.sql"),
    ),
];

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("Database connection established");

    Ok(pool)
}

/// Apply every migration. Statements are idempotent, so this runs on each startup.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    for (name, migration) in MIGRATIONS {
        debug!("Applying migration {}", name);

        for statement in statements(migration) {
            if let Err(e) = sqlx::query(statement).execute(pool).await {
                let err_str = e.to_string();
                if !err_str.contains("already exists") && !err_str.contains("duplicate key") {
                    return Err(e);
                }
            }
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Split a migration file into its non-empty statements
fn statements(migration: &str) -> impl Iterator<Item = &str> {
    migration
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
