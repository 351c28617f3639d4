//! # Fairorder Engine
//!
//! Fair transaction-ordering and MEV-protection engine.
//!
//! Pending transactions are accepted into named pools, batched on a
//! timer/size trigger, analyzed for front-running/sandwich/arbitrage risk,
//! reordered by a configurable fairness algorithm, and emitted as an
//! auditable ordering result plus aggregate fairness metrics.
//!
//! ## Components
//!
//! - **Pool Manager** ([`pool`]): named pools, configuration, pending queues
//! - **Batch Processor** ([`processor`]): per-pool scheduling and the
//!   drain → analyze → order → persist pipeline
//! - **Risk Analyzer** ([`analyzer`]): pure per-transaction MEV scoring
//! - **Ordering Strategies** ([`strategy`]): the closed family of batch
//!   ordering algorithms
//! - **Metrics Aggregator** ([`metrics`]): rolling per-pool fairness
//!   statistics
//! - **Capabilities** ([`random`], [`enclave`]): injected secure randomness
//!   and the optional isolated-execution hardening layer
//! - **Facade** ([`service`]): the [`OrderingEngine`] entry point
//!
//! ## Example
//!
//! ```rust,no_run
//! use fairorder_core::{PendingTransaction, PoolConfig};
//! use fairorder_engine::{EngineConfig, OrderingEngine, OsSecureRandom};
//! use fairorder_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> fairorder_core::Result<()> {
//! let engine = OrderingEngine::new(
//!     EngineConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(OsSecureRandom),
//!     None,
//! );
//! engine.start();
//!
//! let pool_id = engine.create_pool(PoolConfig::default())?;
//! let tx = PendingTransaction::new("alice", "bob", 100);
//! let tx_id = engine.submit_transaction(pool_id, tx)?;
//!
//! // ... later ...
//! let result = engine.get_ordering_result(tx_id)?;
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod enclave;
pub mod logging;
pub mod metrics;
pub mod pool;
pub mod processor;
pub mod random;
pub mod service;
pub mod strategy;

pub use analyzer::{AnalyzerConfig, PoolRiskContext, ProtectionFeeSchedule};
pub use enclave::{IsolatedExecutor, IsolationMode, SimulationExecutor};
pub use logging::{init_logging, LogConfig};
pub use metrics::MetricsAggregator;
pub use pool::{PoolHandle, PoolManager};
pub use processor::{BatchProcessor, ProcessorConfig};
pub use random::{OsSecureRandom, SecureRandom, SeededSecureRandom};
pub use service::{EngineConfig, OrderingEngine};
pub use strategy::{AnalyzedTransaction, OrderingOutcome, Placement, StrategyParams};
