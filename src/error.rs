use mongodb::error::PartialBulkWriteResult;
use thiserror::Error;

use crate::models::{BulkWriteFailure, WriteFailure};
use crate::services::database::mongo::summary_ack;

/// Error taxonomy surfaced by the cache and the data access facade
#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation error: {0}")]
    Operation(String),

    #[error("Bulk write error: {0}")]
    BulkWrite(BulkWriteFailure),
}

/// Coarse classification of a [`DbError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Connection,
    Operation,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            DbError::Connection(_) => ErrorKind::Connection,
            DbError::Operation(_) | DbError::BulkWrite(_) => ErrorKind::Operation,
        }
    }

    /// Reject empty names before any I/O happens
    pub(crate) fn require_name(value: &str, what: &str) -> Result<(), DbError> {
        if value.is_empty() {
            return Err(DbError::InvalidArgument(format!("{} is a required parameter", what)));
        }
        Ok(())
    }
}

/// Convert driver errors raised by an already-open connection
impl From<mongodb::error::Error> for DbError {
    fn from(err: mongodb::error::Error) -> Self {
        match *err.kind {
            mongodb::error::ErrorKind::BulkWrite(ref bulk) if !bulk.write_errors.is_empty() => {
                let mut errors: Vec<WriteFailure> = bulk
                    .write_errors
                    .iter()
                    .map(|(index, write_error)| WriteFailure {
                        index: *index,
                        message: write_error.message.clone(),
                    })
                    .collect();
                errors.sort_by_key(|failure| failure.index);

                let partial = match &bulk.partial_result {
                    Some(PartialBulkWriteResult::Summary(summary)) => summary_ack(summary),
                    Some(PartialBulkWriteResult::Verbose(verbose)) => summary_ack(&verbose.summary),
                    None => Default::default(),
                };

                DbError::BulkWrite(BulkWriteFailure { partial, errors })
            }
            _ => DbError::Operation(err.to_string()),
        }
    }
}
