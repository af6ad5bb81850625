// Smoke check against a live server: MONGO_URL must point at it.
// Usage: db-connection-cache [database] [collection] [second-database]
use db_connection_cache::bson::doc;
use db_connection_cache::config::Settings;
use db_connection_cache::{DocumentDb, FindOneOptions, FindOptions};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let settings = Settings::from_env()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let config = settings.connection_config().map_err(|e| {
        error!("Invalid connection settings: {}", e);
        e
    })?;

    let mut args = std::env::args().skip(1);
    let database = args.next().unwrap_or_else(|| "toolbox".to_string());
    let collection = args.next().unwrap_or_else(|| "users".to_string());
    let other_database = args.next().unwrap_or_else(|| "cumulus".to_string());

    let db = DocumentDb::mongo(config);

    // Second acquire must reuse the first pool; another name gets its own
    db.connection(&database).await?;
    db.connection(&database).await?;
    db.connection(&other_database).await?;
    info!(
        "Pools open: {} ({:?})",
        db.cache().pool_count().await,
        db.cache().database_names().await
    );

    let found = db
        .find(
            &database,
            &collection,
            doc! {},
            FindOptions::projection(doc! { "password": 0 }).with_limit(5),
        )
        .await?;
    info!("find returned {} document(s)", found.len());

    match db
        .find_one(&database, &collection, doc! {}, FindOneOptions::default())
        .await?
    {
        Some(document) => info!("find_one returned: {}", document),
        None => info!("find_one found nothing in {}.{}", database, collection),
    }

    Ok(())
}
