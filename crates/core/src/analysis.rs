//! Per-transaction MEV risk snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate risk classification for a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// The next level up, saturating at `Critical`.
    #[must_use]
    pub const fn escalate(self) -> Self {
        match self {
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }
}

/// Individual risk signals detected by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskIndicator {
    /// Value in the top percentile of recent pool activity.
    LargeValue,

    /// Gas price in the top percentile of recent pool activity.
    LargeGasPrice,

    /// Gas price far above the recent median; a classic front-running bait.
    FrontRunningTarget,

    /// Multiple pending transactions touch the same recipient.
    MevCompetition,

    /// Recipient density high enough to make a sandwich practical.
    SandwichTarget,
}

/// Protections the analyzer recommends for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtectionRecommendation {
    /// Route through a private pool rather than the public queue.
    PrivatePool,

    /// Order under a randomized strategy.
    RandomizedOrdering,

    /// Delay inclusion to break attacker timing.
    DelayedInclusion,

    /// Tighten the slippage bound.
    SlippageGuard,
}

/// Risk snapshot produced once per transaction per analysis pass.
///
/// Analyses are recomputed with fresh pool context rather than mutated;
/// `analyzed_at` versions them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MevAnalysis {
    /// Aggregate classification: the maximum of the individual signals.
    pub risk_level: RiskLevel,

    /// Weighted sum of signal magnitudes, in base units.
    pub estimated_mev: f64,

    /// Detected risk signals.
    pub indicators: Vec<RiskIndicator>,

    /// Recommended protections.
    pub recommendations: Vec<ProtectionRecommendation>,

    /// Protection fee, monotonic in estimated MEV and requested protection
    /// level, floored at zero.
    pub protection_fee: f64,

    /// When this analysis pass ran.
    pub analyzed_at: DateTime<Utc>,
}

impl MevAnalysis {
    /// A benign baseline analysis.
    #[must_use]
    pub fn benign() -> Self {
        Self {
            risk_level: RiskLevel::Low,
            estimated_mev: 0.0,
            indicators: Vec::new(),
            recommendations: Vec::new(),
            protection_fee: 0.0,
            analyzed_at: Utc::now(),
        }
    }

    /// Whether the transaction is flagged for MEV-protection tracking.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.risk_level >= RiskLevel::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_levels_are_ordered() {
        assert!(RiskLevel::Critical > RiskLevel::High);
        assert!(RiskLevel::High > RiskLevel::Medium);
        assert!(RiskLevel::Medium > RiskLevel::Low);
    }

    #[test]
    fn escalate_saturates() {
        assert_eq!(RiskLevel::Low.escalate(), RiskLevel::Medium);
        assert_eq!(RiskLevel::Critical.escalate(), RiskLevel::Critical);
    }

    #[test]
    fn benign_analysis_is_not_flagged() {
        assert!(!MevAnalysis::benign().is_flagged());
    }
}
