//! Configuration management for the server.

use std::collections::HashSet;
use std::env;

/// Default number of rows returned by a snapshot.
pub const DEFAULT_SNAPSHOT_LIMIT: i64 = 500;
const MAX_SNAPSHOT_LIMIT: i64 = 5000;
/// Default size of the database pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub database_max_connections: u32,
    /// When set, every request must carry a bearer token
    pub auth_secret: Option<String>,
    /// Profiles allowed to create events
    pub admin_profiles: HashSet<String>,
    /// Maximum rows per snapshot
    pub snapshot_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let database_max_connections = match env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => parse_max_connections(&raw)?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        let auth_secret = env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty());

        let admin_profiles = env::var("ADMIN_PROFILES")
            .map(|raw| parse_profile_list(&raw))
            .unwrap_or_default();

        let snapshot_limit = match env::var("SNAPSHOT_LIMIT") {
            Ok(raw) => parse_snapshot_limit(&raw)?,
            Err(_) => DEFAULT_SNAPSHOT_LIMIT,
        };

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            auth_secret,
            admin_profiles,
            snapshot_limit,
        })
    }

    /// Whether `profile_id` may create events.
    pub fn is_admin(&self, profile_id: &str) -> bool {
        self.admin_profiles.contains(profile_id)
    }
}

fn parse_profile_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

fn parse_snapshot_limit(raw: &str) -> Result<i64, ConfigError> {
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidSnapshotLimit)?;
    Ok(limit.clamp(1, MAX_SNAPSHOT_LIMIT))
}

fn parse_max_connections(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidMaxConnections),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid SNAPSHOT_LIMIT value")]
    InvalidSnapshotLimit,

    #[error("Invalid DATABASE_MAX_CONNECTIONS value")]
    InvalidMaxConnections,
}
