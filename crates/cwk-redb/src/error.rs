//! Redb storage error

use thiserror::Error;

/// Redb database error
#[derive(Debug, Error)]
pub enum Error {
    /// Redb database error
    #[error(transparent)]
    Database(#[from] redb::DatabaseError),
    /// Redb transaction error
    #[error(transparent)]
    Transaction(#[from] redb::TransactionError),
    /// Redb table error
    #[error(transparent)]
    Table(#[from] redb::TableError),
    /// Redb storage error
    #[error(transparent)]
    Storage(#[from] redb::StorageError),
    /// Redb commit error
    #[error(transparent)]
    Commit(#[from] redb::CommitError),
    /// Row could not be (de)serialized
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    /// Io error
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Database file is from a newer version of this crate
    #[error("Unknown database version")]
    UnknownDatabaseVersion,
    /// Counter would overflow
    #[error("Keyset counter overflow")]
    CounterOverflow,
}

impl From<Error> for cwk::database::Error {
    fn from(err: Error) -> Self {
        Self::Database(Box::new(err))
    }
}
