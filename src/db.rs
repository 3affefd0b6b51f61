use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::AppConfig;
use crate::literals::{MESSAGE_SQLITE_WARNING, SQLITE_BACKEND};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 2;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn init_pool_with_size(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool_size = max_size.max(1);
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)?;
    Ok(pool)
}

/// Logs the SQLite warning when the configured backend is not suited for production.
pub fn warn_on_unsupported_backend(config: &AppConfig) {
    if config.database_backend() == SQLITE_BACKEND {
        tracing::warn!(backend = SQLITE_BACKEND, "{MESSAGE_SQLITE_WARNING}");
    }
}

pub fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}
