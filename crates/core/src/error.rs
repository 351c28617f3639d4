//! Error taxonomy for the ordering engine.

use crate::id::{BatchId, PoolId, TransactionId};
use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine-wide error types.
///
/// The first three variants are caller errors and are never retried by the
/// engine; `AnalysisFailed` is per-transaction and non-fatal to its batch;
/// `OrderingStrategyFailed` fails the whole batch and indicates a defect in a
/// strategy implementation.
#[derive(Debug, Error)]
pub enum Error {
    /// Pool configuration violates an invariant.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No pool with the given id exists.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    /// Submitted transaction is malformed; it never enters a queue.
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Risk analysis failed for a single transaction.
    #[error("analysis failed for transaction {transaction_id}: {reason}")]
    AnalysisFailed {
        transaction_id: TransactionId,
        reason: String,
    },

    /// A strategy produced an invalid permutation. Fatal to the batch.
    #[error("ordering strategy failed for batch {batch_id}: {reason}")]
    OrderingStrategyFailed { batch_id: BatchId, reason: String },

    /// Persistence capability failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Operation attempted on a stopped engine.
    #[error("engine is not running")]
    EngineStopped,
}

impl Error {
    /// Shorthand for an `InvalidTransaction` error.
    pub fn invalid_transaction(reason: impl Into<String>) -> Self {
        Error::InvalidTransaction(reason.into())
    }

    /// Shorthand for an `InvalidConfiguration` error.
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Error::InvalidConfiguration(reason.into())
    }
}
