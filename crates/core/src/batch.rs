//! Drained batch record and its status machine.

use crate::id::{BatchId, PoolId, TransactionId};
use crate::pool::OrderingAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-pool processing pipeline state, cycling back to `Idle` after each
/// batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Draining,
    Analyzing,
    Ordering,
    Completed,
}

/// Terminal and in-flight batch statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    /// Per-transaction risk analysis in progress.
    Analyzing,

    /// Ordering strategy running.
    Ordering,

    /// Batch ordered and persisted.
    Completed,

    /// Ordering strategy produced an invalid permutation; every transaction
    /// in the batch is marked failed and eligible for resubmission.
    Failed,

    /// Batch ordered, but persistence retries were exhausted. Results are
    /// served from memory until callers reconcile.
    CompletedUnpersisted,
}

impl BatchStatus {
    /// Whether the batch has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::CompletedUnpersisted
        )
    }
}

/// Membership record for one transaction inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Transaction id.
    pub transaction_id: TransactionId,

    /// Position in the drained queue.
    pub original_position: usize,

    /// Position assigned by the ordering strategy. For a failed transaction
    /// this mirrors the original position and carries no ordering meaning.
    pub final_position: usize,

    /// Whether the transaction was successfully ordered.
    pub success: bool,

    /// Failure reason for unsuccessful transactions.
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// A drained, ordered set of transactions processed together.
///
/// The entry set is a partition of exactly the transactions drained from the
/// pool at formation time: no transaction appears in two batches and none is
/// silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch id.
    pub id: BatchId,

    /// Owning pool.
    pub pool_id: PoolId,

    /// Membership with original and final positions.
    pub entries: Vec<BatchEntry>,

    /// When the batch was formed (queue swap time).
    pub created_at: DateTime<Utc>,

    /// When processing finished.
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Algorithm that ordered the batch.
    pub algorithm: OrderingAlgorithm,

    /// Current status.
    pub status: BatchStatus,

    /// Hex-encoded SHA-256 commitment to the random seed, recorded when a
    /// randomized strategy draws its seed.
    #[serde(default)]
    pub seed_commitment: Option<String>,

    /// Hex-encoded seed, revealed once the batch is terminal so the
    /// permutation can be audited.
    #[serde(default)]
    pub revealed_seed: Option<String>,
}

impl Batch {
    /// Number of successfully ordered transactions.
    #[must_use]
    pub fn successful_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.success).count()
    }

    /// Number of transactions drained into this batch.
    #[must_use]
    pub fn drained_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::CompletedUnpersisted.is_terminal());
        assert!(!BatchStatus::Analyzing.is_terminal());
        assert!(!BatchStatus::Ordering.is_terminal());
    }

    #[test]
    fn successful_count_ignores_failures() {
        let batch = Batch {
            id: BatchId::new(),
            pool_id: PoolId::new(),
            entries: vec![
                BatchEntry {
                    transaction_id: TransactionId::new(),
                    original_position: 0,
                    final_position: 0,
                    success: true,
                    failure_reason: None,
                },
                BatchEntry {
                    transaction_id: TransactionId::new(),
                    original_position: 1,
                    final_position: 1,
                    success: false,
                    failure_reason: Some("analysis failed".to_string()),
                },
            ],
            created_at: Utc::now(),
            completed_at: None,
            algorithm: OrderingAlgorithm::Fifo,
            status: BatchStatus::Completed,
            seed_commitment: None,
            revealed_seed: None,
        };
        assert_eq!(batch.successful_count(), 1);
        assert_eq!(batch.drained_count(), 2);
    }
}
