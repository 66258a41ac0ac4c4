//! Postgres pool setup and schema migrations.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;

pub type Pool = PgPool;

/// How long a request waits for a free connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

fn pool_options(max_connections: u32) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
}

/// Connect to the club database.
pub async fn create_pool(config: &Config) -> Result<Pool, sqlx::Error> {
    let pool = pool_options(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    tracing::debug!(
        max_connections = config.database_max_connections,
        "Database pool ready"
    );
    Ok(pool)
}

/// Create the club tables if they do not exist yet.
pub async fn run_migrations(pool: &Pool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_limits() {
        let options = pool_options(4);
        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_acquire_timeout(), ACQUIRE_TIMEOUT);
    }
}
