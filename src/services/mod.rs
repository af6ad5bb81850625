pub mod connection_pool;
pub mod data_access; // CRUD facade over the pool cache
pub mod database; // Database client boundary and MongoDB adapter

pub use connection_pool::*;
pub use data_access::*;
pub use database::{
    CollectionHandle, Connection, Connector, MongoCollection, MongoConnection, MongoConnector,
};
