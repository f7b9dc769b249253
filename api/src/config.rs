use std::{num::NonZeroU32, time::Duration};

use config::{Environment, File, FileFormat};

use crate::{connection::RetryPolicy, error::ConfigError};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Where people are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Postgres,
    /// Process memory; nothing survives a restart and `database` is ignored.
    Memory,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub address: String,
    pub request_timeout_secs: u64,
    pub max_concurrent_connections: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:80".into(),
            request_timeout_secs: 15,
            max_concurrent_connections: 1_000,
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "DatabaseSettings::default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "DatabaseSettings::default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Unset means retry forever.
    #[serde(default)]
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: Self::default_max_connections(),
            acquire_timeout_secs: Self::default_acquire_timeout_secs(),
            retry_delay_ms: Self::default_retry_delay_ms(),
            max_attempts: None,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.retry_delay_ms),
            max_attempts: self.max_attempts,
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    fn default_max_connections() -> u32 {
        10
    }

    fn default_acquire_timeout_secs() -> u64 {
        5
    }

    fn default_retry_delay_ms() -> u64 {
        1_000
    }
}

impl Settings {
    /// Reads `config.toml` (optional), then `APP_*` variables, then the
    /// plain `PG_ADDRESS` and `SERVER_ADDRESS` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Self = ::config::Config::builder()
            .add_source(File::new("config.toml", FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_override_option("database.url", std::env::var("PG_ADDRESS").ok())?
            .set_override_option("server.address", std::env::var("SERVER_ADDRESS").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.backend == Backend::Postgres && self.database.url.trim().is_empty() {
            return Err(ConfigError::BlankDatabaseUrl);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(raw: &str) -> Settings {
        ::config::Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn database_defaults_keep_unbounded_one_second_retry() {
        let settings = DatabaseSettings::new("postgres://localhost/people");
        let policy = settings.retry_policy();

        assert_eq!(policy.delay, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, None);
        assert_eq!(settings.max_connections, 10);
    }

    #[test]
    fn server_defaults() {
        let server = ServerSettings::default();
        assert_eq!(server.address, "0.0.0.0:80");
        assert_eq!(server.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn settings_deserialize_from_toml_source() {
        let settings = from_toml(
            r#"
            [server]
            address = "127.0.0.1:9999"

            [database]
            url = "postgres://postgres:secret@db:5432/people"
            max_attempts = 3
            "#,
        )
        .validate()
        .unwrap();

        assert_eq!(settings.backend, Backend::Postgres);
        assert_eq!(settings.server.address, "127.0.0.1:9999");
        assert_eq!(settings.server.request_timeout_secs, 15);
        assert_eq!(settings.database.max_attempts, NonZeroU32::new(3));
        assert_eq!(settings.database.retry_delay_ms, 1_000);
    }

    #[test]
    fn postgres_backend_requires_a_database_url() {
        let err = from_toml("[server]\naddress = \"127.0.0.1:9999\"")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::BlankDatabaseUrl));

        let err = from_toml("[database]\nurl = \"  \"").validate().unwrap_err();
        assert!(matches!(err, ConfigError::BlankDatabaseUrl));
    }

    #[test]
    fn memory_backend_runs_without_a_database() {
        let settings = from_toml(r#"backend = "memory""#).validate().unwrap();

        assert_eq!(settings.backend, Backend::Memory);
        assert!(settings.database.url.is_empty());
    }
}
