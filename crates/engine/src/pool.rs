//! Pool lifecycle and pending-transaction intake.
//!
//! Each pool owns an independently schedulable pending queue. Submission is
//! a non-blocking append; the batch processor's drain is an atomic queue
//! swap, the single synchronization point per pool. Pools never block on
//! each other.

use crate::analyzer::PoolRiskContext;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fairorder_core::{
    Error, OrderingPool, PendingTransaction, PipelineState, PoolConfig, PoolId, PoolSummary,
    Result, TransactionId,
};
use fairorder_store::{keys, Store, StoreExt};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Sliding window of recently processed activity, feeding the analyzer's
/// pool context.
#[derive(Debug)]
pub struct RecentActivity {
    values: VecDeque<i64>,
    gas_prices: VecDeque<i64>,
    capacity: usize,
}

impl RecentActivity {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            gas_prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, value: i64, gas_price: i64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
            self.gas_prices.pop_front();
        }
        self.values.push_back(value);
        self.gas_prices.push_back(gas_price);
    }
}

/// Number of recent transactions retained for risk context.
const RECENT_WINDOW: usize = 256;

/// One named ordering pool.
pub struct PoolHandle {
    /// Pool id.
    pub id: PoolId,
    config: RwLock<PoolConfig>,
    pending: Mutex<Vec<PendingTransaction>>,
    /// Wakes the pool's scheduler on submissions.
    pub wake: Notify,
    state: RwLock<PipelineState>,
    processed_batches: AtomicU64,
    recent: Mutex<RecentActivity>,
    created_at: DateTime<Utc>,
}

impl PoolHandle {
    fn new(id: PoolId, config: PoolConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            config: RwLock::new(config),
            pending: Mutex::new(Vec::new()),
            wake: Notify::new(),
            state: RwLock::new(PipelineState::Idle),
            processed_batches: AtomicU64::new(0),
            recent: Mutex::new(RecentActivity::new(RECENT_WINDOW)),
            created_at,
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> PoolConfig {
        self.config.read().clone()
    }

    /// Number of queued transactions.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Submission time of the oldest queued transaction.
    pub fn oldest_submission(&self) -> Option<DateTime<Utc>> {
        self.pending.lock().first().map(|tx| tx.submitted_at)
    }

    /// Atomically take the whole pending queue. Concurrent submissions land
    /// in the next batch, never the one being drained.
    pub fn drain(&self) -> Vec<PendingTransaction> {
        std::mem::take(&mut *self.pending.lock())
    }

    /// Current pipeline state.
    pub fn state(&self) -> PipelineState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: PipelineState) {
        *self.state.write() = state;
    }

    /// Batches processed so far.
    pub fn processed_batches(&self) -> u64 {
        self.processed_batches.load(Ordering::Relaxed)
    }

    pub(crate) fn mark_batch_processed(&self) {
        self.processed_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recent(&self, transactions: &[PendingTransaction]) {
        let mut recent = self.recent.lock();
        for tx in transactions {
            recent.record(tx.value, tx.gas_price);
        }
    }

    /// Enqueue without validation or timestamp stamping. Test-only: lets
    /// structurally invalid transactions reach the analyzer.
    #[cfg(test)]
    pub(crate) fn push_unchecked(&self, tx: PendingTransaction) {
        self.pending.lock().push(tx);
    }

    /// Risk context for analyzing `draining`: recent activity plus the
    /// recipient density across the drained set and whatever is already
    /// queued behind it.
    pub fn risk_context(&self, draining: &[PendingTransaction]) -> PoolRiskContext {
        let (recent_values, recent_gas_prices) = {
            let recent = self.recent.lock();
            (
                recent.values.iter().copied().collect(),
                recent.gas_prices.iter().copied().collect(),
            )
        };

        let mut recipient_density: HashMap<String, usize> = HashMap::new();
        for tx in draining {
            *recipient_density.entry(tx.recipient.clone()).or_default() += 1;
        }
        for tx in self.pending.lock().iter() {
            *recipient_density.entry(tx.recipient.clone()).or_default() += 1;
        }

        PoolRiskContext {
            recent_values,
            recent_gas_prices,
            recipient_density,
        }
    }

    fn summary(&self) -> PoolSummary {
        let config = self.config.read();
        PoolSummary {
            id: self.id,
            name: config.name.clone(),
            algorithm: config.algorithm,
            pending_count: self.pending_count(),
            processed_batches: self.processed_batches(),
            state: self.state(),
        }
    }
}

/// Owns the set of named ordering pools.
pub struct PoolManager {
    pools: DashMap<PoolId, Arc<PoolHandle>>,
    store: Arc<dyn Store>,
}

impl PoolManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            pools: DashMap::new(),
            store,
        }
    }

    /// Restore pools persisted by a previous run.
    pub fn load_persisted(&self) -> Result<usize> {
        let records: Vec<OrderingPool> = self
            .store
            .scan_json(keys::POOL_PREFIX)
            .map_err(|err| Error::Storage(err.to_string()))?;
        let count = records.len();
        for record in records {
            self.pools.insert(
                record.id,
                Arc::new(PoolHandle::new(record.id, record.config, record.created_at)),
            );
        }
        if count > 0 {
            info!(count, "restored persisted pools");
        }
        Ok(count)
    }

    /// Create a pool from a validated configuration.
    ///
    /// Persists the pool record; starts no processing by itself.
    pub fn create_pool(&self, config: PoolConfig) -> Result<PoolId> {
        config.validate()?;
        let id = PoolId::new();
        let created_at = Utc::now();
        let record = OrderingPool {
            id,
            config: config.clone(),
            created_at,
        };
        self.store
            .put_json(keys::pool(&id), &record)
            .map_err(|err| Error::Storage(err.to_string()))?;
        self.pools
            .insert(id, Arc::new(PoolHandle::new(id, config, created_at)));
        info!(pool = %id, "created ordering pool");
        Ok(id)
    }

    /// Replace a pool's configuration. Last writer wins; batches already
    /// formed are unaffected.
    pub fn update_pool(&self, id: PoolId, config: PoolConfig) -> Result<()> {
        config.validate()?;
        let handle = self.get(id)?;
        let record = OrderingPool {
            id,
            config: config.clone(),
            created_at: handle.created_at,
        };
        self.store
            .put_json(keys::pool(&id), &record)
            .map_err(|err| Error::Storage(err.to_string()))?;
        *handle.config.write() = config;
        info!(pool = %id, "updated pool configuration");
        Ok(())
    }

    /// Read-only snapshot of every pool.
    pub fn list_pools(&self) -> Vec<PoolSummary> {
        let mut summaries: Vec<PoolSummary> = self
            .pools
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Look up a pool handle.
    pub fn get(&self, id: PoolId) -> Result<Arc<PoolHandle>> {
        self.pools
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(Error::PoolNotFound(id))
    }

    /// Validate and enqueue a transaction.
    ///
    /// The submission timestamp is stamped here, at the moment the
    /// transaction enters the queue.
    pub fn submit(&self, pool_id: PoolId, mut tx: PendingTransaction) -> Result<TransactionId> {
        let handle = self.get(pool_id)?;
        tx.validate()?;
        tx.submitted_at = Utc::now();
        let id = tx.id;

        let queued = {
            let mut pending = handle.pending.lock();
            // Keep per-pool submission timestamps strictly increasing so
            // FIFO order and queue order always agree, even when the clock
            // reads the same nanosecond twice.
            if let Some(last) = pending.last() {
                if tx.submitted_at <= last.submitted_at {
                    tx.submitted_at = last.submitted_at + chrono::Duration::nanoseconds(1);
                }
            }
            pending.push(tx);
            pending.len()
        };
        debug!(pool = %pool_id, tx = %id, queued, "transaction queued");
        handle.wake.notify_one();
        Ok(id)
    }

    /// Remove a pool from the registry and delete its persisted record.
    ///
    /// The caller (the engine facade) is responsible for draining the
    /// pending queue first; removal here is unconditional.
    pub fn remove(&self, id: PoolId) -> Result<Arc<PoolHandle>> {
        let (_, handle) = self.pools.remove(&id).ok_or(Error::PoolNotFound(id))?;
        if let Err(err) = self.store.delete(&keys::pool(&id)) {
            warn!(pool = %id, %err, "failed to delete pool record");
        }
        info!(pool = %id, "removed ordering pool");
        Ok(handle)
    }

    /// Number of registered pools.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Handles for every registered pool.
    pub fn handles(&self) -> Vec<Arc<PoolHandle>> {
        self.pools
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fairorder_store::MemoryStore;
    use std::time::Duration;

    fn manager() -> PoolManager {
        PoolManager::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn create_validates_configuration() {
        let manager = manager();
        let bad = PoolConfig {
            batch_size: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(
            manager.create_pool(bad),
            Err(Error::InvalidConfiguration(_))
        ));
        assert_eq!(manager.pool_count(), 0);
    }

    #[test]
    fn submit_to_unknown_pool_fails() {
        let manager = manager();
        let tx = PendingTransaction::new("alice", "bob", 1);
        assert!(matches!(
            manager.submit(PoolId::new(), tx),
            Err(Error::PoolNotFound(_))
        ));
    }

    #[test]
    fn submit_validates_the_transaction() {
        let manager = manager();
        let pool = manager.create_pool(PoolConfig::default()).unwrap();
        let tx = PendingTransaction::new("", "bob", 1);
        assert!(matches!(
            manager.submit(pool, tx),
            Err(Error::InvalidTransaction(_))
        ));
        assert_eq!(manager.get(pool).unwrap().pending_count(), 0);
    }

    #[test]
    fn drain_takes_everything_and_resets_the_queue() {
        let manager = manager();
        let pool = manager.create_pool(PoolConfig::default()).unwrap();
        for i in 0..5 {
            manager
                .submit(pool, PendingTransaction::new("alice", "bob", i))
                .unwrap();
        }
        let handle = manager.get(pool).unwrap();
        let drained = handle.drain();
        assert_eq!(drained.len(), 5);
        assert_eq!(handle.pending_count(), 0);
        // Submission order is preserved by the queue.
        assert!(drained.windows(2).all(|w| w[0].value <= w[1].value));
    }

    #[test]
    fn update_replaces_configuration() {
        let manager = manager();
        let pool = manager.create_pool(PoolConfig::default()).unwrap();
        let updated = PoolConfig {
            batch_size: 7,
            batch_timeout: Duration::from_millis(100),
            ..PoolConfig::default()
        };
        manager.update_pool(pool, updated.clone()).unwrap();
        assert_eq!(manager.get(pool).unwrap().config(), updated);
    }

    #[test]
    fn list_pools_reports_pending_counts() {
        let manager = manager();
        let pool = manager.create_pool(PoolConfig::default()).unwrap();
        manager
            .submit(pool, PendingTransaction::new("alice", "bob", 1))
            .unwrap();
        let summaries = manager.list_pools();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].pending_count, 1);
        assert_eq!(summaries[0].state, PipelineState::Idle);
    }

    #[test]
    fn pools_survive_a_restart() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let first = PoolManager::new(Arc::clone(&store));
        let pool = first.create_pool(PoolConfig::default()).unwrap();

        let second = PoolManager::new(store);
        assert_eq!(second.load_persisted().unwrap(), 1);
        assert!(second.get(pool).is_ok());
    }

    #[test]
    fn risk_context_counts_recipient_density() {
        let manager = manager();
        let pool = manager.create_pool(PoolConfig::default()).unwrap();
        manager
            .submit(pool, PendingTransaction::new("a", "dex", 1))
            .unwrap();
        manager
            .submit(pool, PendingTransaction::new("b", "dex", 1))
            .unwrap();
        let handle = manager.get(pool).unwrap();
        let draining = handle.drain();
        manager
            .submit(pool, PendingTransaction::new("c", "dex", 1))
            .unwrap();

        let context = handle.risk_context(&draining);
        assert_eq!(context.recipient_density.get("dex"), Some(&3));
    }
}
