pub mod connection;
pub mod operation;

pub use connection::*;
pub use operation::*;
