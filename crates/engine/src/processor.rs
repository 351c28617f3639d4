//! Batch formation and the processing pipeline.
//!
//! One scheduled task per pool waits for the first of two triggers: the
//! pending count reaching the configured batch size, or the oldest pending
//! transaction reaching the configured batch timeout. On trigger the queue
//! is swapped atomically and the drained set runs the
//! analyze → order → persist → notify-metrics pipeline. A drained batch
//! always reaches a terminal status; per-transaction analysis failures do
//! not abort a batch, an invalid permutation fails it in full, and
//! exhausted persistence retries degrade it to `CompletedUnpersisted`.

use crate::analyzer::{self, AnalyzerConfig};
use crate::enclave::IsolatedExecutor;
use crate::metrics::MetricsAggregator;
use crate::pool::PoolHandle;
use crate::random::SecureRandom;
use crate::strategy::{self, AnalyzedTransaction, OrderingOutcome, StrategyParams};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fairorder_core::{
    Batch, BatchEntry, BatchId, BatchStatus, Error, MevAnalysis, OrderingResult,
    PendingTransaction, PipelineState, PoolConfig, PoolId, Result, RiskLevel, TransactionId,
};
use fairorder_store::{keys, Store, StoreExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Batch-processing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Batches processed concurrently across all pools.
    pub max_concurrent_batches: usize,

    /// Persistence attempts per batch before degrading to
    /// `CompletedUnpersisted`.
    pub persist_attempts: u32,

    /// Initial backoff between persistence attempts; doubles per attempt.
    pub persist_backoff: Duration,

    /// How often an idle pool rechecks its queue in the absence of
    /// submission wakeups.
    pub idle_recheck: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 4,
            persist_attempts: 4,
            persist_backoff: Duration::from_millis(50),
            idle_recheck: Duration::from_secs(1),
        }
    }
}

/// Runs the per-pool batch pipeline.
pub struct BatchProcessor {
    store: Arc<dyn Store>,
    metrics: Arc<MetricsAggregator>,
    random: Arc<dyn SecureRandom>,
    isolation: Option<Arc<dyn IsolatedExecutor>>,
    analyzer_config: AnalyzerConfig,
    strategy_params: StrategyParams,
    config: ProcessorConfig,
    semaphore: Arc<Semaphore>,
    results: DashMap<TransactionId, OrderingResult>,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        metrics: Arc<MetricsAggregator>,
        random: Arc<dyn SecureRandom>,
        isolation: Option<Arc<dyn IsolatedExecutor>>,
        analyzer_config: AnalyzerConfig,
        strategy_params: StrategyParams,
        config: ProcessorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_batches.max(1)));
        Self {
            store,
            metrics,
            random,
            isolation,
            analyzer_config,
            strategy_params,
            config,
            semaphore,
            results: DashMap::new(),
        }
    }

    /// Analyzer configuration in effect.
    pub fn analyzer_config(&self) -> &AnalyzerConfig {
        &self.analyzer_config
    }

    /// Look up a transaction's ordering result, memory first, then the
    /// store. Unknown ids are `None`, not an error.
    pub fn lookup_result(&self, id: TransactionId) -> Result<Option<OrderingResult>> {
        if let Some(result) = self.results.get(&id) {
            return Ok(Some(result.value().clone()));
        }
        self.store
            .get_json(&keys::result(&id))
            .map_err(|err| Error::Storage(err.to_string()))
    }

    /// Spawn the scheduled task for one pool.
    pub fn spawn_pool_task(
        self: &Arc<Self>,
        handle: Arc<PoolHandle>,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let processor = Arc::clone(self);
        tokio::spawn(async move {
            processor.pool_loop(handle, shutdown).await;
        })
    }

    async fn pool_loop(&self, handle: Arc<PoolHandle>, mut shutdown: watch::Receiver<bool>) {
        debug!(pool = %handle.id, "pool scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let config = handle.config();
            let wait = match handle.oldest_submission() {
                Some(oldest) => {
                    let age_ms = (Utc::now() - oldest).num_milliseconds().max(0) as u64;
                    config
                        .batch_timeout
                        .saturating_sub(Duration::from_millis(age_ms))
                }
                None => self.config.idle_recheck,
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = handle.wake.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }

            if !Self::should_trigger(&handle) {
                continue;
            }

            // Bound cross-pool concurrency. A closed semaphore means the
            // processor is being torn down.
            let permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            self.process_pool_once(&handle).await;
            drop(permit);
        }
        debug!(pool = %handle.id, "pool scheduler stopped");
    }

    fn should_trigger(handle: &PoolHandle) -> bool {
        let config = handle.config();
        let pending = handle.pending_count();
        if pending == 0 {
            return false;
        }
        if pending >= config.batch_size {
            return true;
        }
        match handle.oldest_submission() {
            Some(oldest) => {
                let age_ms = (Utc::now() - oldest).num_milliseconds().max(0) as u64;
                Duration::from_millis(age_ms) >= config.batch_timeout
            }
            None => false,
        }
    }

    /// Drain and process one batch from a pool. Returns `None` when the
    /// queue was empty at trigger time.
    pub async fn process_pool_once(&self, handle: &Arc<PoolHandle>) -> Option<Batch> {
        handle.set_state(PipelineState::Draining);
        let drained = handle.drain();
        if drained.is_empty() {
            handle.set_state(PipelineState::Idle);
            return None;
        }

        let config = handle.config();
        let batch_id = BatchId::new();
        let created_at = Utc::now();
        let oldest_submission = drained.first().map(|tx| tx.submitted_at);
        info!(
            pool = %handle.id,
            batch = %batch_id,
            count = drained.len(),
            algorithm = %config.algorithm,
            "processing batch"
        );

        // Analysis and ordering optionally run under the isolated-execution
        // capability so in-flight decisions cannot be observed.
        let session = self.isolation.as_ref().map(|isolation| isolation.enter());

        handle.set_state(PipelineState::Analyzing);
        let context = handle.risk_context(&drained);
        let mut analyzed: Vec<AnalyzedTransaction> = Vec::with_capacity(drained.len());
        let mut analysis_failures: Vec<(usize, String)> = Vec::new();
        let mut analyses: HashMap<TransactionId, MevAnalysis> = HashMap::new();
        for (position, tx) in drained.iter().enumerate() {
            match analyzer::analyze(tx, &context, &self.analyzer_config) {
                Ok(analysis) => {
                    analyses.insert(tx.id, analysis.clone());
                    analyzed.push(AnalyzedTransaction {
                        transaction: tx.clone(),
                        analysis,
                        original_position: position,
                    });
                }
                Err(err) => {
                    warn!(pool = %handle.id, tx = %tx.id, %err, "analysis failed; excluding transaction");
                    analysis_failures.push((position, err.to_string()));
                }
            }
        }

        handle.set_state(PipelineState::Ordering);
        let outcome = strategy::order(
            config.algorithm,
            &analyzed,
            &self.strategy_params,
            self.random.as_ref(),
        );
        let validation = strategy::validate_placements(&outcome.placements, analyzed.len());
        drop(session);

        let completed_at = Utc::now();
        let (mut batch, results) = match validation {
            Ok(()) => build_completed(
                batch_id,
                handle.id,
                &config,
                &drained,
                &analyzed,
                &analysis_failures,
                &outcome,
                created_at,
                completed_at,
            ),
            Err(reason) => {
                error!(
                    pool = %handle.id,
                    batch = %batch_id,
                    %reason,
                    "ordering strategy produced an invalid permutation; failing batch"
                );
                build_failed(
                    batch_id, handle.id, &config, &drained, &reason, created_at, completed_at,
                )
            }
        };

        // Results are cached before the persistence attempt so lookups work
        // even in the degraded CompletedUnpersisted state.
        for result in &results {
            self.results.insert(result.transaction_id, result.clone());
        }

        handle.set_state(PipelineState::Completed);
        if !self.persist_with_retry(&batch, &results).await
            && batch.status == BatchStatus::Completed
        {
            warn!(
                batch = %batch.id,
                "persistence retries exhausted; batch completed unpersisted"
            );
            batch.status = BatchStatus::CompletedUnpersisted;
        }

        self.metrics
            .record_batch(&batch, &results, &analyses, oldest_submission);
        handle.record_recent(&drained);
        handle.mark_batch_processed();
        handle.set_state(PipelineState::Idle);

        info!(
            pool = %handle.id,
            batch = %batch.id,
            status = ?batch.status,
            successful = batch.successful_count(),
            "batch processed"
        );
        Some(batch)
    }

    async fn persist_with_retry(&self, batch: &Batch, results: &[OrderingResult]) -> bool {
        let mut backoff = self.config.persist_backoff;
        for attempt in 1..=self.config.persist_attempts.max(1) {
            match self.persist(batch, results) {
                Ok(()) => return true,
                Err(err) => {
                    warn!(batch = %batch.id, attempt, %err, "batch persistence failed");
                    if attempt < self.config.persist_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }
        false
    }

    fn persist(&self, batch: &Batch, results: &[OrderingResult]) -> Result<()> {
        self.store
            .put_json(keys::batch(&batch.id), batch)
            .map_err(|err| Error::Storage(err.to_string()))?;
        for result in results {
            self.store
                .put_json(keys::result(&result.transaction_id), result)
                .map_err(|err| Error::Storage(err.to_string()))?;
        }
        Ok(())
    }
}

/// Protection score for one ordered transaction: how well its residual
/// risk was mitigated by the pool's configuration and strategy.
fn protection_score(risk: RiskLevel, config: &PoolConfig) -> f64 {
    let base = match risk {
        RiskLevel::Low => 1.0,
        RiskLevel::Medium => 0.75,
        RiskLevel::High => 0.5,
        RiskLevel::Critical => 0.3,
    };
    let mut score: f64 = base;
    if config.algorithm.is_protective() {
        score += 0.25;
    }
    if config.mev_protection_enabled {
        score += 0.15;
    }
    score.min(1.0)
}

#[allow(clippy::too_many_arguments)]
fn build_completed(
    batch_id: BatchId,
    pool_id: PoolId,
    config: &PoolConfig,
    drained: &[PendingTransaction],
    analyzed: &[AnalyzedTransaction],
    analysis_failures: &[(usize, String)],
    outcome: &OrderingOutcome,
    created_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> (Batch, Vec<OrderingResult>) {
    let ordered_count = analyzed.len();
    // Rank of each drained position within the successfully analyzed
    // subset; displacement is measured between these ranks and final
    // positions.
    let rank_of: HashMap<usize, usize> = analyzed
        .iter()
        .enumerate()
        .map(|(rank, tx)| (tx.original_position, rank))
        .collect();
    let analysis_of: HashMap<usize, RiskLevel> = analyzed
        .iter()
        .map(|tx| (tx.original_position, tx.analysis.risk_level))
        .collect();

    let mut entries = Vec::with_capacity(drained.len());
    let mut results = Vec::with_capacity(drained.len());

    for placement in &outcome.placements {
        let rank = rank_of
            .get(&placement.original_position)
            .copied()
            .unwrap_or(placement.original_position);
        let fairness = if ordered_count > 1 {
            1.0 - rank.abs_diff(placement.final_position) as f64 / (ordered_count - 1) as f64
        } else {
            1.0
        };
        let risk = analysis_of
            .get(&placement.original_position)
            .copied()
            .unwrap_or(RiskLevel::Low);
        entries.push(BatchEntry {
            transaction_id: placement.transaction_id,
            original_position: placement.original_position,
            final_position: placement.final_position,
            success: true,
            failure_reason: None,
        });
        results.push(OrderingResult {
            transaction_id: placement.transaction_id,
            pool_id,
            batch_id,
            original_position: placement.original_position,
            final_position: placement.final_position,
            fairness_score: fairness.clamp(0.0, 1.0),
            mev_protection_score: protection_score(risk, config),
            success: true,
            failure_reason: None,
            processed_at: completed_at,
        });
    }

    for (position, reason) in analysis_failures {
        let tx = &drained[*position];
        entries.push(BatchEntry {
            transaction_id: tx.id,
            original_position: *position,
            final_position: *position,
            success: false,
            failure_reason: Some(reason.clone()),
        });
        results.push(OrderingResult {
            transaction_id: tx.id,
            pool_id,
            batch_id,
            original_position: *position,
            final_position: *position,
            fairness_score: 0.0,
            mev_protection_score: 0.0,
            success: false,
            failure_reason: Some(reason.clone()),
            processed_at: completed_at,
        });
    }

    entries.sort_by_key(|entry| entry.original_position);

    let batch = Batch {
        id: batch_id,
        pool_id,
        entries,
        created_at,
        completed_at: Some(completed_at),
        algorithm: config.algorithm,
        status: BatchStatus::Completed,
        seed_commitment: outcome.seed_commitment.clone(),
        revealed_seed: outcome.revealed_seed.clone(),
    };
    (batch, results)
}

fn build_failed(
    batch_id: BatchId,
    pool_id: PoolId,
    config: &PoolConfig,
    drained: &[PendingTransaction],
    reason: &str,
    created_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
) -> (Batch, Vec<OrderingResult>) {
    let reason = format!("ordering strategy failed: {reason}");
    let mut entries = Vec::with_capacity(drained.len());
    let mut results = Vec::with_capacity(drained.len());
    for (position, tx) in drained.iter().enumerate() {
        entries.push(BatchEntry {
            transaction_id: tx.id,
            original_position: position,
            final_position: position,
            success: false,
            failure_reason: Some(reason.clone()),
        });
        results.push(OrderingResult {
            transaction_id: tx.id,
            pool_id,
            batch_id,
            original_position: position,
            final_position: position,
            fairness_score: 0.0,
            mev_protection_score: 0.0,
            success: false,
            failure_reason: Some(reason.clone()),
            processed_at: completed_at,
        });
    }

    let batch = Batch {
        id: batch_id,
        pool_id,
        entries,
        created_at,
        completed_at: Some(completed_at),
        algorithm: config.algorithm,
        status: BatchStatus::Failed,
        seed_commitment: None,
        revealed_seed: None,
    };
    (batch, results)
}
