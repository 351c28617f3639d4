//! Immutable per-transaction ordering result.

use crate::id::{BatchId, PoolId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of ordering one transaction.
///
/// Written once when its batch reaches a terminal state and never mutated;
/// keyed by transaction id so repeated lookups are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingResult {
    /// Transaction id.
    pub transaction_id: TransactionId,

    /// Pool the transaction was ordered in.
    pub pool_id: PoolId,

    /// Batch the transaction was drained into.
    pub batch_id: BatchId,

    /// Position in the drained queue.
    pub original_position: usize,

    /// Final position assigned by the strategy. Mirrors the original
    /// position for failed transactions.
    pub final_position: usize,

    /// How little the transaction was displaced, 0–1 (1 = no displacement).
    pub fairness_score: f64,

    /// How well the transaction was shielded from MEV extraction, 0–1.
    pub mev_protection_score: f64,

    /// Whether ordering succeeded for this transaction.
    pub success: bool,

    /// Failure reason for unsuccessful transactions.
    #[serde(default)]
    pub failure_reason: Option<String>,

    /// When the batch finished processing.
    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_round_trips_through_json() {
        let result = OrderingResult {
            transaction_id: TransactionId::new(),
            pool_id: PoolId::new(),
            batch_id: BatchId::new(),
            original_position: 2,
            final_position: 0,
            fairness_score: 0.5,
            mev_protection_score: 0.75,
            success: true,
            failure_reason: None,
            processed_at: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: OrderingResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}
