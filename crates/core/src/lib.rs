//! # Fairorder Core
//!
//! Data model and error taxonomy for the fairorder transaction-ordering
//! engine.
//!
//! ## Components
//!
//! - **Identifiers**: opaque pool/transaction/batch ids
//! - **Transaction**: pending-transaction record and submission validation
//! - **Pool**: pool configuration, ordering algorithms, fairness levels
//! - **Batch**: drained batch record and its status machine
//! - **Analysis**: per-transaction MEV risk snapshot
//! - **Result**: immutable per-transaction ordering result
//! - **Metrics**: per-pool fairness aggregates and summaries
//!
//! This crate is deliberately free of async code and I/O; the engine and
//! store crates build on top of it.

pub mod analysis;
pub mod batch;
pub mod error;
pub mod id;
pub mod metrics;
pub mod pool;
pub mod result;
pub mod transaction;

pub use analysis::{MevAnalysis, ProtectionRecommendation, RiskIndicator, RiskLevel};
pub use batch::{Batch, BatchEntry, BatchStatus, PipelineState};
pub use error::{Error, Result};
pub use id::{BatchId, PoolId, TransactionId};
pub use metrics::{FairnessMetrics, Health, PoolSummary};
pub use pool::{FairnessLevel, OrderingAlgorithm, OrderingPool, PoolConfig};
pub use result::OrderingResult;
pub use transaction::{PendingTransaction, ProtectionLevel};
