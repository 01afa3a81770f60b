use sqlx::postgres::{PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Open the record-store pool
///
/// Sized from `DB_MAX_CONNECTIONS` (10), `DB_MIN_CONNECTIONS` (0) and
/// `DB_ACQUIRE_TIMEOUT_SECS` (3). Unparseable values fall back to the default.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(env_parse("DB_MAX_CONNECTIONS", 10u32))
        .min_connections(env_parse("DB_MIN_CONNECTIONS", 0u32))
        .acquire_timeout(Duration::from_secs(env_parse("DB_ACQUIRE_TIMEOUT_SECS", 3u64)))
        .connect(database_url)
        .await
}

/// Apply the embedded migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./db/migrations").run(pool).await
}
