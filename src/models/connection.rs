use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::DbError;

/// Options handed to the database client when a pool is opened.
///
/// Every field has a default, so a partially specified record deserializes
/// into the defaults overlaid with whatever the caller supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Maximum number of connections kept by each pool
    pub pool_size: u32,
    pub min_pool_size: Option<u32>,
    /// Discover the whole deployment topology; `false` talks to the single
    /// host in the URL directly
    pub topology_discovery: bool,
    pub app_name: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub server_selection_timeout_ms: Option<u64>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pool_size: 5,
            min_pool_size: None,
            topology_discovery: true,
            app_name: None,
            connect_timeout_ms: None,
            server_selection_timeout_ms: None,
        }
    }
}

impl ConnectOptions {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn server_selection_timeout(&self) -> Option<Duration> {
        self.server_selection_timeout_ms.map(Duration::from_millis)
    }
}

/// Immutable connection settings shared by every pool the cache opens
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    url: String,
    options: ConnectOptions,
    log_level: u8,
}

impl ConnectionConfig {
    /// Default verbosity: log pool creation
    pub const DEFAULT_LOG_LEVEL: u8 = 1;

    pub fn new(url: impl Into<String>, options: ConnectOptions) -> Result<Self, DbError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(DbError::InvalidArgument(
                "url is a required connection parameter".to_string(),
            ));
        }

        Ok(Self {
            url,
            options,
            log_level: Self::DEFAULT_LOG_LEVEL,
        })
    }

    /// Set logging verbosity. 0 = silent, 1 or more = log pool creation
    pub fn with_log_level(mut self, log_level: u8) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn log_level(&self) -> u8 {
        self.log_level
    }

    pub fn logs_pool_creation(&self) -> bool {
        self.log_level > 0
    }
}
