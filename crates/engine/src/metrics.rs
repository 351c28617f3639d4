//! Fairness metrics aggregation.
//!
//! Consumes each completed batch to maintain per-pool rolling statistics.
//! Updates are increment-only and per-pool, so no cross-pool locking is
//! needed; readers get an eventually-consistent snapshot whose source of
//! truth is the immutable ordering-result log.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fairorder_core::{Batch, FairnessMetrics, MevAnalysis, OrderingResult, PoolId, TransactionId};
use fairorder_store::{keys, Store, StoreExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

struct PoolAccumulator {
    metrics: FairnessMetrics,
    flagged: u64,
    flagged_protected: u64,
    drained: u64,
    ordered: u64,
}

impl PoolAccumulator {
    fn new(pool_id: PoolId) -> Self {
        Self {
            metrics: FairnessMetrics::empty(pool_id),
            flagged: 0,
            flagged_protected: 0,
            drained: 0,
            ordered: 0,
        }
    }
}

/// Maintains rolling per-pool fairness statistics.
pub struct MetricsAggregator {
    store: Arc<dyn Store>,
    accumulators: DashMap<PoolId, PoolAccumulator>,
    effectiveness_threshold: f64,
}

impl MetricsAggregator {
    pub fn new(store: Arc<dyn Store>, effectiveness_threshold: f64) -> Self {
        Self {
            store,
            accumulators: DashMap::new(),
            effectiveness_threshold,
        }
    }

    /// Fold one completed batch into the pool's rolling metrics and persist
    /// the snapshot.
    pub fn record_batch(
        &self,
        batch: &Batch,
        results: &[OrderingResult],
        analyses: &HashMap<TransactionId, MevAnalysis>,
        oldest_submission: Option<DateTime<Utc>>,
    ) -> FairnessMetrics {
        let successful: Vec<&OrderingResult> =
            results.iter().filter(|result| result.success).collect();

        let batch_fairness = batch_fairness(&successful);
        let latency_ms = match (oldest_submission, batch.completed_at) {
            (Some(oldest), Some(completed)) => {
                (completed - oldest).num_milliseconds().max(0) as f64
            }
            _ => 0.0,
        };

        let mut batch_flagged = 0u64;
        let mut batch_protected = 0u64;
        for result in results {
            if let Some(analysis) = analyses.get(&result.transaction_id) {
                if analysis.is_flagged() {
                    batch_flagged += 1;
                    if result.mev_protection_score > self.effectiveness_threshold {
                        batch_protected += 1;
                    }
                }
            }
        }

        let mut entry = self
            .accumulators
            .entry(batch.pool_id)
            .or_insert_with(|| PoolAccumulator::new(batch.pool_id));
        let acc = entry.value_mut();

        acc.metrics.total_batches += 1;
        acc.metrics.total_processed += successful.len() as u64;
        let batches = acc.metrics.total_batches as f64;
        acc.metrics.avg_latency_ms += (latency_ms - acc.metrics.avg_latency_ms) / batches;
        acc.metrics.fairness_score += (batch_fairness - acc.metrics.fairness_score) / batches;

        acc.flagged += batch_flagged;
        acc.flagged_protected += batch_protected;
        acc.metrics.protection_effectiveness = if acc.flagged == 0 {
            1.0
        } else {
            acc.flagged_protected as f64 / acc.flagged as f64
        };

        acc.drained += results.len() as u64;
        acc.ordered += successful.len() as u64;
        acc.metrics.ordering_efficiency = if acc.drained == 0 {
            1.0
        } else {
            acc.ordered as f64 / acc.drained as f64
        };

        acc.metrics.last_updated = Utc::now();

        let snapshot = acc.metrics.clone();
        drop(entry);

        if let Err(err) = self
            .store
            .put_json(keys::metrics(&batch.pool_id), &snapshot)
        {
            // Metrics are a read model; the result log remains the source
            // of truth, so a failed snapshot write is not fatal.
            warn!(pool = %batch.pool_id, %err, "failed to persist metrics snapshot");
        }
        snapshot
    }

    /// Current metrics for a pool, falling back to the persisted snapshot
    /// and then to an empty record.
    pub fn get(&self, pool_id: PoolId) -> FairnessMetrics {
        if let Some(entry) = self.accumulators.get(&pool_id) {
            return entry.value().metrics.clone();
        }
        match self.store.get_json::<FairnessMetrics>(&keys::metrics(&pool_id)) {
            Ok(Some(metrics)) => metrics,
            Ok(None) => FairnessMetrics::empty(pool_id),
            Err(err) => {
                warn!(pool = %pool_id, %err, "failed to load metrics snapshot");
                FairnessMetrics::empty(pool_id)
            }
        }
    }
}

/// Normalized inverse of total positional displacement across a batch,
/// scaled to 0–1.
///
/// Displacement is measured between ranks within the successfully ordered
/// subset, so per-transaction failures do not distort the score. The
/// maximum total displacement of a permutation of `n` is `n²/2` (rounded
/// down), reached by a full reversal.
fn batch_fairness(successful: &[&OrderingResult]) -> f64 {
    let n = successful.len();
    if n <= 1 {
        return 1.0;
    }

    let mut original_positions: Vec<usize> = successful
        .iter()
        .map(|result| result.original_position)
        .collect();
    original_positions.sort_unstable();

    let rank_of = |original: usize| -> usize {
        // Positions are unique within a batch.
        original_positions
            .binary_search(&original)
            .unwrap_or(usize::MAX)
    };

    let displacement: usize = successful
        .iter()
        .map(|result| rank_of(result.original_position).abs_diff(result.final_position))
        .sum();
    let max_displacement = (n * n) / 2;
    (1.0 - displacement as f64 / max_displacement as f64).clamp(0.0, 1.0)
}
