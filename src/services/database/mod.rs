// Database client boundary: the traits the cache and facade talk to,
// plus the MongoDB implementation
pub mod adapter;
pub mod mongo;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{bulk_write_sequential, CollectionHandle, Connection, Connector};
pub use mongo::{MongoCollection, MongoConnection, MongoConnector};
