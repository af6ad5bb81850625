use serde::Deserialize;
use std::env;

use crate::error::DbError;
use crate::models::{ConnectOptions, ConnectionConfig};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub mongo: MongoSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    pub url: String,
    pub pool_size: u32,
    pub min_pool_size: Option<u32>,
    pub topology_discovery: bool,
    pub app_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
    pub log_level: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env first so its values count as environment variables
        let _ = dotenv::dotenv();

        let defaults = ConnectOptions::default();
        let mut builder = config::Config::builder()
            .set_default("mongo.url", "")?
            .set_default("mongo.pool_size", defaults.pool_size)?
            .set_default("mongo.topology_discovery", defaults.topology_discovery)?
            .set_default("mongo.log_level", ConnectionConfig::DEFAULT_LOG_LEVEL as u64)?
            .set_default("logging.level", "info")?;

        if let Ok(url) = env::var("MONGO_URL") {
            builder = builder.set_override("mongo.url", url)?;
        }

        if let Ok(pool_size) = env::var("MONGO_POOL_SIZE") {
            builder = builder.set_override(
                "mongo.pool_size",
                pool_size.parse::<u32>().unwrap_or(defaults.pool_size),
            )?;
        }

        if let Ok(min_pool_size) = env::var("MONGO_MIN_POOL_SIZE") {
            builder = builder.set_override("mongo.min_pool_size", min_pool_size.parse::<u32>().ok())?;
        }

        if let Ok(topology_discovery) = env::var("MONGO_TOPOLOGY_DISCOVERY") {
            builder = builder.set_override(
                "mongo.topology_discovery",
                topology_discovery.parse::<bool>().unwrap_or(true),
            )?;
        }

        if let Ok(app_name) = env::var("MONGO_APP_NAME") {
            builder = builder.set_override("mongo.app_name", Some(app_name))?;
        }

        if let Ok(timeout) = env::var("MONGO_CONNECT_TIMEOUT_MS") {
            builder = builder.set_override("mongo.connect_timeout_ms", timeout.parse::<u64>().ok())?;
        }

        if let Ok(timeout) = env::var("MONGO_SERVER_SELECTION_TIMEOUT_MS") {
            builder = builder
                .set_override("mongo.server_selection_timeout_ms", timeout.parse::<u64>().ok())?;
        }

        if let Ok(log_level) = env::var("MONGO_LOG_LEVEL") {
            builder = builder.set_override("mongo.log_level", log_level.parse::<u64>().unwrap_or(1))?;
        }

        if let Ok(rust_log) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", rust_log)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Build the connection settings handed to the pool cache
    pub fn connection_config(&self) -> Result<ConnectionConfig, DbError> {
        let options = ConnectOptions {
            pool_size: self.mongo.pool_size,
            min_pool_size: self.mongo.min_pool_size,
            topology_discovery: self.mongo.topology_discovery,
            app_name: self.mongo.app_name.clone(),
            connect_timeout_ms: self.mongo.connect_timeout_ms,
            server_selection_timeout_ms: self.mongo.server_selection_timeout_ms,
        };

        Ok(ConnectionConfig::new(self.mongo.url.clone(), options)?.with_log_level(self.mongo.log_level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_env() {
        // Clear environment variables for this test
        env::remove_var("MONGO_URL");
        env::remove_var("MONGO_POOL_SIZE");
        env::remove_var("MONGO_LOG_LEVEL");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.mongo.pool_size, 5);
        assert!(settings.mongo.topology_discovery);
        assert_eq!(settings.mongo.log_level, 1);
        if settings.mongo.url.is_empty() {
            assert!(matches!(
                settings.connection_config(),
                Err(DbError::InvalidArgument(_))
            ));
        }

        env::set_var("MONGO_URL", "mongodb://localhost:27017");
        env::set_var("MONGO_POOL_SIZE", "12");
        env::set_var("MONGO_LOG_LEVEL", "0");

        let settings = Settings::from_env().unwrap();
        let config = settings.connection_config().unwrap();
        assert_eq!(config.url(), "mongodb://localhost:27017");
        assert_eq!(config.options().pool_size, 12);
        assert!(!config.logs_pool_creation());

        env::remove_var("MONGO_URL");
        env::remove_var("MONGO_POOL_SIZE");
        env::remove_var("MONGO_LOG_LEVEL");
    }
}
