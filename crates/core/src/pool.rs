//! Pool configuration, ordering algorithms, and fairness levels.

use crate::error::{Error, Result};
use crate::id::PoolId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// The closed set of ordering algorithms a pool can be configured with.
///
/// Policy shape is fixed; the tunable knobs (displacement cap, jitter
/// window) live in strategy parameters, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderingAlgorithm {
    /// Original submission order, unchanged.
    #[default]
    Fifo,

    /// Priority fee descending with a bounded displacement versus FIFO.
    PriorityFair,

    /// Round-robin across distinct senders so no sender dominates a batch.
    FairQueue,

    /// Cryptographically random permutation with a persisted seed commitment.
    RandomFair,

    /// Risky transactions separated by low-risk buffers and position jitter.
    MevResistant,

    /// Submission time ascending.
    TimeWeighted,

    /// Gas price descending.
    GasWeighted,
}

impl OrderingAlgorithm {
    /// Whether the algorithm reorders transactions specifically to frustrate
    /// MEV extraction.
    #[must_use]
    pub const fn is_protective(&self) -> bool {
        matches!(
            self,
            OrderingAlgorithm::RandomFair
                | OrderingAlgorithm::MevResistant
                | OrderingAlgorithm::FairQueue
        )
    }
}

impl fmt::Display for OrderingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderingAlgorithm::Fifo => "fifo",
            OrderingAlgorithm::PriorityFair => "priority-fair",
            OrderingAlgorithm::FairQueue => "fair-queue",
            OrderingAlgorithm::RandomFair => "random-fair",
            OrderingAlgorithm::MevResistant => "mev-resistant",
            OrderingAlgorithm::TimeWeighted => "time-weighted",
            OrderingAlgorithm::GasWeighted => "gas-weighted",
        };
        f.write_str(name)
    }
}

/// How aggressively a pool trades throughput for fairness guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FairnessLevel {
    #[default]
    Standard,
    High,
    Maximum,
}

/// Configuration of a single ordering pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Human-readable pool name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Ordering algorithm applied to each batch.
    #[serde(default)]
    pub algorithm: OrderingAlgorithm,

    /// Number of pending transactions that triggers a batch.
    pub batch_size: usize,

    /// Maximum age of the oldest pending transaction before a batch is
    /// forced regardless of size.
    pub batch_timeout: Duration,

    /// Fairness level.
    #[serde(default)]
    pub fairness_level: FairnessLevel,

    /// Whether MEV protection scoring applies to this pool.
    #[serde(default)]
    pub mev_protection_enabled: bool,

    /// Maximum allowed slippage in basis points.
    #[serde(default)]
    pub max_slippage_bps: u32,

    /// Free-form algorithm parameters.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            description: String::new(),
            algorithm: OrderingAlgorithm::default(),
            batch_size: 32,
            batch_timeout: Duration::from_secs(5),
            fairness_level: FairnessLevel::default(),
            mev_protection_enabled: true,
            max_slippage_bps: 50,
            parameters: BTreeMap::new(),
        }
    }
}

impl PoolConfig {
    /// Validate configuration invariants.
    ///
    /// This is the single gate for `InvalidConfiguration`; both pool
    /// creation and update go through it.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_configuration("pool name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_configuration("batch size must be positive"));
        }
        if self.batch_timeout.is_zero() {
            return Err(Error::invalid_configuration(
                "batch timeout must be positive",
            ));
        }
        if self.max_slippage_bps > 10_000 {
            return Err(Error::invalid_configuration(format!(
                "max slippage {} bps exceeds 100%",
                self.max_slippage_bps
            )));
        }
        Ok(())
    }
}

/// Persisted pool record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingPool {
    /// Pool id.
    pub id: PoolId,

    /// Current configuration. Updates replace this wholesale and do not
    /// affect batches already formed.
    pub config: PoolConfig,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}
