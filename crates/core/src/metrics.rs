//! Per-pool fairness aggregates and read-model summaries.

use crate::batch::PipelineState;
use crate::id::PoolId;
use crate::pool::OrderingAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rolling per-pool fairness statistics.
///
/// Updated incrementally after each batch; an eventually-consistent read
/// model whose source of truth is the immutable ordering-result log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    /// Pool these metrics describe.
    pub pool_id: PoolId,

    /// Successfully ordered transactions, cumulative.
    pub total_processed: u64,

    /// Batches processed, cumulative.
    pub total_batches: u64,

    /// Rolling average batch latency (completion minus oldest submission),
    /// in milliseconds.
    pub avg_latency_ms: f64,

    /// Rolling fairness score: normalized inverse of positional
    /// displacement, 0–1.
    pub fairness_score: f64,

    /// Fraction of flagged high/critical-risk transactions whose final
    /// protection score cleared the configured threshold.
    pub protection_effectiveness: f64,

    /// Ordered transactions divided by drained transactions, cumulative.
    pub ordering_efficiency: f64,

    /// Last update timestamp.
    pub last_updated: DateTime<Utc>,
}

impl FairnessMetrics {
    /// Zeroed metrics for a pool with no processed batches yet.
    #[must_use]
    pub fn empty(pool_id: PoolId) -> Self {
        Self {
            pool_id,
            total_processed: 0,
            total_batches: 0,
            avg_latency_ms: 0.0,
            fairness_score: 1.0,
            protection_effectiveness: 1.0,
            ordering_efficiency: 1.0,
            last_updated: Utc::now(),
        }
    }
}

/// Read-only snapshot of one pool for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    /// Pool id.
    pub id: PoolId,

    /// Pool name.
    pub name: String,

    /// Configured algorithm.
    pub algorithm: OrderingAlgorithm,

    /// Transactions currently queued.
    pub pending_count: usize,

    /// Batches processed so far.
    pub processed_batches: u64,

    /// Current pipeline state.
    pub state: PipelineState,
}

/// Liveness snapshot of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Whether batch processing is running.
    pub running: bool,

    /// Number of registered pools.
    pub pool_count: usize,
}
