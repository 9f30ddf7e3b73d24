use crate::core::{AppError, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Rule and snapshot storage settings. Absent when `DATABASE_URL` is unset.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Apply `migrations/` at startup (`DATABASE_RUN_MIGRATIONS`, default on)
    pub run_migrations: bool,
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("Invalid {}: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool_size: 5,
            max_connections: 20,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }

    /// `Ok(None)` when `DATABASE_URL` is unset or blank
    pub fn from_env() -> Result<Option<Self>> {
        let url = match env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };
        let defaults = Self::new(url);

        Ok(Some(DatabaseConfig {
            pool_size: parse_env("DATABASE_POOL_SIZE", defaults.pool_size)?,
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            acquire_timeout: Duration::from_secs(parse_env(
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            run_migrations: parse_env("DATABASE_RUN_MIGRATIONS", defaults.run_migrations)?,
            ..defaults
        }))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(AppError::Configuration(
                "DATABASE_MAX_CONNECTIONS must be greater than 0".to_string(),
            ));
        }
        if self.pool_size > self.max_connections {
            return Err(AppError::Configuration(
                "DATABASE_POOL_SIZE cannot exceed DATABASE_MAX_CONNECTIONS".to_string(),
            ));
        }
        Ok(())
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        match rest.rsplit_once('@') {
            Some((credentials, host)) => {
                let user = credentials.split(':').next().unwrap_or_default();
                format!("{}://{}:***@{}", scheme, user, host)
            }
            None => self.url.clone(),
        }
    }

    /// Open the pool and bring the schema up to date
    pub async fn connect(&self) -> Result<MySqlPool> {
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.pool_size)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(&self.url)
            .await
            .map_err(AppError::Database)?;

        if self.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;
            tracing::info!("Tax schema migrations applied");
        }

        tracing::info!(
            url = %self.redacted_url(),
            min = self.pool_size,
            max = self.max_connections,
            "Database pool initialized"
        );

        Ok(pool)
    }
}
