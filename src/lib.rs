pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;

pub use mongodb::bson;
pub use mongodb::bson::oid::ObjectId;
