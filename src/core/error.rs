use thiserror::Error;

use super::types::VertexId;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Vertex '{0}' not found")]
    VertexNotFound(VertexId),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Store mutation attempted outside of a transaction")]
    NoActiveTransaction,

    #[error("Transaction is active on another thread")]
    TransactionBusy,

    /// Requests a silent rollback of the enclosing transaction.
    #[error("Transaction aborted")]
    Aborted,

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Persistence queue closed")]
    QueueClosed,

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;

impl<T> From<std::sync::PoisonError<T>> for GraphError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for GraphError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for GraphError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl GraphError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
