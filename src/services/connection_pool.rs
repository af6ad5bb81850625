use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::DbError;
use crate::models::ConnectionConfig;
use crate::services::database::{Connection, Connector};

type ConnectOutcome = Result<Arc<dyn Connection>, DbError>;

/// A connection attempt that any number of callers can await
type PendingConnect = Shared<BoxFuture<'static, ConnectOutcome>>;

enum PoolEntry {
    Ready(Arc<dyn Connection>),
    Connecting(PendingConnect),
}

/// Connection pool cache that keeps one pooled connection per database name.
///
/// Pools are opened on first use. Concurrent first requests for the same
/// name share a single connection attempt; a failed attempt leaves no entry
/// behind so the next request starts over.
pub struct ConnectionPoolCache {
    config: Arc<ConnectionConfig>,
    connector: Arc<dyn Connector>,
    pools: Arc<Mutex<HashMap<String, PoolEntry>>>,
}

impl ConnectionPoolCache {
    pub fn new(config: ConnectionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            pools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Get or create the pooled connection for `database`.
    /// This method is safe to call concurrently from multiple tasks.
    pub async fn acquire(&self, database: &str) -> Result<Arc<dyn Connection>, DbError> {
        DbError::require_name(database, "database name")?;

        let pending = {
            let mut pools = self.pools.lock().await;
            let in_flight = match pools.get(database) {
                Some(PoolEntry::Ready(connection)) => {
                    tracing::debug!("Using existing connection pool for database '{}'", database);
                    return Ok(Arc::clone(connection));
                }
                // An attempt can finish without any waiter settling it
                Some(PoolEntry::Connecting(pending)) => match pending.peek() {
                    Some(Ok(connection)) => {
                        let connection = Arc::clone(connection);
                        pools.insert(
                            database.to_string(),
                            PoolEntry::Ready(Arc::clone(&connection)),
                        );
                        return Ok(connection);
                    }
                    Some(Err(_)) => None,
                    None => {
                        tracing::debug!(
                            "Waiting for in-flight connection to database '{}'",
                            database
                        );
                        Some(pending.clone())
                    }
                },
                None => None,
            };

            match in_flight {
                Some(pending) => pending,
                None => {
                    let pending = self.start_connect(database);
                    pools.insert(database.to_string(), PoolEntry::Connecting(pending.clone()));
                    pending
                }
            }
        };

        let outcome = pending.clone().await;
        self.settle(database, &pending, &outcome).await;
        outcome
    }

    /// Build the shared attempt. It owns everything it needs, so whichever
    /// waiter polls it can finish it.
    fn start_connect(&self, database: &str) -> PendingConnect {
        let config = Arc::clone(&self.config);
        let connector = Arc::clone(&self.connector);
        let database = database.to_string();

        async move {
            if config.logs_pool_creation() {
                tracing::info!(
                    "Creating new connection pool to database '{}' at {} (pool_size: {})",
                    database,
                    mask_credentials(config.url()),
                    config.options().pool_size
                );
            }
            connector.connect(config.url(), config.options()).await
        }
        .boxed()
        .shared()
    }

    /// Replace the in-flight marker with the outcome of the attempt.
    /// Only the entry belonging to this exact attempt is touched.
    async fn settle(&self, database: &str, pending: &PendingConnect, outcome: &ConnectOutcome) {
        let mut pools = self.pools.lock().await;

        let is_current = matches!(
            pools.get(database),
            Some(PoolEntry::Connecting(current)) if current.ptr_eq(pending)
        );
        if !is_current {
            return;
        }

        match outcome {
            Ok(connection) => {
                pools.insert(database.to_string(), PoolEntry::Ready(Arc::clone(connection)));
                if self.config.logs_pool_creation() {
                    tracing::info!("Connection pool to database '{}' is ready", database);
                }
            }
            Err(e) => {
                pools.remove(database);
                tracing::debug!("Connection to database '{}' failed: {}", database, e);
            }
        }
    }

    /// Number of established pools
    pub async fn pool_count(&self) -> usize {
        let pools = self.pools.lock().await;
        pools
            .values()
            .filter(|entry| matches!(entry, PoolEntry::Ready(_)))
            .count()
    }

    /// Whether an established pool exists for `database`
    pub async fn contains(&self, database: &str) -> bool {
        let pools = self.pools.lock().await;
        matches!(pools.get(database), Some(PoolEntry::Ready(_)))
    }

    /// Names of the databases with an established pool, sorted
    pub async fn database_names(&self) -> Vec<String> {
        let pools = self.pools.lock().await;
        let mut names: Vec<String> = pools
            .iter()
            .filter(|(_, entry)| matches!(entry, PoolEntry::Ready(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

/// Mask credentials in a connection URL for safe logging
pub(crate) fn mask_credentials(url: &str) -> String {
    if let Ok(parsed_url) = url::Url::parse(url) {
        if parsed_url.has_host() {
            let mut masked = parsed_url.clone();
            if parsed_url.password().is_some() {
                let _ = masked.set_password(Some("***"));
            }
            return masked.to_string();
        }
    }

    // Multi-host seed lists are not valid URLs; redact the userinfo by hand
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &url[..scheme_end], &url[at + 1..])
        }
        (Some(_), _) => url.to_string(),
        _ => "[invalid-url]".to_string(),
    }
}
