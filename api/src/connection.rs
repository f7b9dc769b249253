use std::{num::NonZeroU32, str::FromStr, time::Duration};

use once_cell::sync::OnceCell;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool, Postgres,
};

use crate::{
    config::DatabaseSettings,
    error::{ConfigError, StoreError},
};

/// Something able to open one datastore connection per call.
#[async_trait::async_trait]
pub trait ConnectionSource: Send + Sync {
    type Connection: Send;

    async fn open(&self) -> Result<Self::Connection, sqlx::Error>;
}

/// Postgres connection source. The pool behind it is built on first use,
/// exactly once even when the first callers race.
pub struct PgConnectionSource {
    options: PgConnectOptions,
    max_connections: u32,
    acquire_timeout: Duration,
    pool: OnceCell<PgPool>,
}

impl PgConnectionSource {
    pub fn new(settings: &DatabaseSettings) -> Result<Self, ConfigError> {
        let url = settings.url.trim();
        if url.is_empty() {
            return Err(ConfigError::BlankDatabaseUrl);
        }

        let options = PgConnectOptions::from_str(url).map_err(ConfigError::InvalidDatabaseUrl)?;

        Ok(Self {
            options,
            max_connections: settings.max_connections,
            acquire_timeout: settings.acquire_timeout(),
            pool: OnceCell::new(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.get_or_init(|| {
            tracing::debug!(
                max_connections = self.max_connections,
                "initializing postgres pool"
            );

            PgPoolOptions::new()
                .max_connections(self.max_connections)
                .acquire_timeout(self.acquire_timeout)
                .connect_lazy_with(self.options.clone())
        })
    }
}

#[async_trait::async_trait]
impl ConnectionSource for PgConnectionSource {
    type Connection = PoolConnection<Postgres>;

    async fn open(&self) -> Result<Self::Connection, sqlx::Error> {
        self.pool().acquire().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` keeps retrying until the datastore answers.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

/// Hands out one connection per operation, retrying failed opens with a
/// fixed delay. The connection is released when the caller drops it.
pub struct ConnectionProvider<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: ConnectionSource> ConnectionProvider<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn acquire(&self) -> Result<S::Connection, StoreError> {
        let mut attempt = 0u32;

        loop {
            attempt = attempt.saturating_add(1);

            let err = match self.source.open().await {
                Ok(conn) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "datastore connection established");
                    }
                    return Ok(conn);
                }
                Err(err) => err,
            };

            if self.policy.max_attempts.is_some_and(|max| attempt >= max.get()) {
                return Err(StoreError::ConnectionUnavailable {
                    attempts: attempt,
                    source: err,
                });
            }

            tracing::warn!(
                attempt,
                %err,
                "failed to open datastore connection, retrying in {:?}",
                self.policy.delay
            );
            tokio::time::sleep(self.policy.delay).await;
        }
    }
}
