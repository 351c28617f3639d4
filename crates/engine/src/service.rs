//! Engine facade.
//!
//! [`OrderingEngine`] wires the pool manager, batch processor, and metrics
//! aggregator together and exposes the interface consumed by a transport
//! layer: pool lifecycle, transaction submission, result and metrics
//! lookup, standalone risk analysis, and health.

use crate::analyzer::{self, AnalyzerConfig, PoolRiskContext};
use crate::enclave::IsolatedExecutor;
use crate::metrics::MetricsAggregator;
use crate::pool::{PoolHandle, PoolManager};
use crate::processor::{BatchProcessor, ProcessorConfig};
use crate::random::SecureRandom;
use crate::strategy::StrategyParams;
use fairorder_core::{
    FairnessMetrics, Health, MevAnalysis, OrderingResult, PendingTransaction, PoolConfig, PoolId,
    PoolSummary, Result, TransactionId,
};
use fairorder_store::Store;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Risk-analyzer thresholds and weights.
    pub analyzer: AnalyzerConfig,

    /// Strategy parameters.
    pub strategy: StrategyParams,

    /// Batch-processing knobs.
    pub processor: ProcessorConfig,

    /// Protection score above which a flagged transaction counts as
    /// effectively protected in the metrics.
    pub effectiveness_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            strategy: StrategyParams::default(),
            processor: ProcessorConfig::default(),
            effectiveness_threshold: 0.5,
        }
    }
}

struct PoolTask {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The fair transaction-ordering and MEV-protection engine.
pub struct OrderingEngine {
    pools: Arc<PoolManager>,
    processor: Arc<BatchProcessor>,
    metrics: Arc<MetricsAggregator>,
    running: AtomicBool,
    tasks: Mutex<HashMap<PoolId, PoolTask>>,
}

impl OrderingEngine {
    /// Build an engine over the injected capabilities. Pools persisted by a
    /// previous run are restored; processing does not start until
    /// [`start`](Self::start).
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn Store>,
        random: Arc<dyn SecureRandom>,
        isolation: Option<Arc<dyn IsolatedExecutor>>,
    ) -> Self {
        let metrics = Arc::new(MetricsAggregator::new(
            Arc::clone(&store),
            config.effectiveness_threshold,
        ));
        let pools = Arc::new(PoolManager::new(Arc::clone(&store)));
        if let Err(err) = pools.load_persisted() {
            warn!(%err, "failed to restore persisted pools");
        }
        if let Some(isolation) = &isolation {
            info!(mode = isolation.mode().as_str(), "isolated execution enabled");
        }
        let processor = Arc::new(BatchProcessor::new(
            store,
            Arc::clone(&metrics),
            random,
            isolation,
            config.analyzer,
            config.strategy,
            config.processor,
        ));
        Self {
            pools,
            processor,
            metrics,
            running: AtomicBool::new(false),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Start batch processing for every registered pool. Idempotent.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        for handle in self.pools.handles() {
            self.spawn_task(handle);
        }
        info!("ordering engine started");
    }

    /// Stop batch processing. In-flight batches finish; pending queues are
    /// kept for the next start.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let tasks: Vec<PoolTask> = self
            .tasks
            .lock()
            .drain()
            .map(|(_, task)| task)
            .collect();
        for task in &tasks {
            let _ = task.stop.send(true);
        }
        for task in tasks {
            let _ = task.task.await;
        }
        info!("ordering engine stopped");
    }

    fn spawn_task(&self, handle: Arc<PoolHandle>) {
        let (stop, receiver) = watch::channel(false);
        let task = self.processor.spawn_pool_task(Arc::clone(&handle), receiver);
        self.tasks.lock().insert(handle.id, PoolTask { stop, task });
    }

    /// Create an ordering pool. Starts processing for it only if the engine
    /// is running.
    pub fn create_pool(&self, config: PoolConfig) -> Result<PoolId> {
        let id = self.pools.create_pool(config)?;
        if self.running.load(Ordering::SeqCst) {
            self.spawn_task(self.pools.get(id)?);
        }
        Ok(id)
    }

    /// Replace a pool's configuration.
    pub fn update_pool(&self, id: PoolId, config: PoolConfig) -> Result<()> {
        self.pools.update_pool(id, config)
    }

    /// Read-only snapshot of every pool.
    pub fn list_pools(&self) -> Vec<PoolSummary> {
        self.pools.list_pools()
    }

    /// Delete a pool. Its scheduler is cancelled, the pending queue is
    /// drained through one final batch so no transaction is dropped, and
    /// the pool record is removed.
    pub async fn delete_pool(&self, id: PoolId) -> Result<()> {
        let handle = self.pools.get(id)?;
        let task = self.tasks.lock().remove(&id);
        if let Some(task) = task {
            let _ = task.stop.send(true);
            handle.wake.notify_one();
            let _ = task.task.await;
        }
        while self.processor.process_pool_once(&handle).await.is_some() {}
        self.pools.remove(id)?;
        Ok(())
    }

    /// Validate and enqueue a transaction; returns its id even if no batch
    /// boundary has been crossed yet.
    pub fn submit_transaction(
        &self,
        pool_id: PoolId,
        tx: PendingTransaction,
    ) -> Result<TransactionId> {
        self.pools.submit(pool_id, tx)
    }

    /// Ordering result for a transaction. Unknown ids yield `None`;
    /// repeated lookups of a known id return identical results.
    pub fn get_ordering_result(&self, id: TransactionId) -> Result<Option<OrderingResult>> {
        self.processor.lookup_result(id)
    }

    /// Rolling fairness metrics for a pool.
    pub fn get_fairness_metrics(&self, pool_id: PoolId) -> Result<FairnessMetrics> {
        self.pools.get(pool_id)?;
        Ok(self.metrics.get(pool_id))
    }

    /// Standalone pre-submission risk check. With a pool id the analysis
    /// runs against that pool's recent activity and pending density;
    /// without one only structural and intrinsic signals can fire.
    pub fn analyze_risk(
        &self,
        tx: &PendingTransaction,
        pool_id: Option<PoolId>,
    ) -> Result<MevAnalysis> {
        let context = match pool_id {
            Some(id) => self.pools.get(id)?.risk_context(&[]),
            None => PoolRiskContext::empty(),
        };
        analyzer::analyze(tx, &context, self.processor.analyzer_config())
    }

    /// Liveness snapshot.
    pub fn health(&self) -> Health {
        Health {
            running: self.running.load(Ordering::SeqCst),
            pool_count: self.pools.pool_count(),
        }
    }
}
