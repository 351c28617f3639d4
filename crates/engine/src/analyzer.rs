//! MEV risk analysis.
//!
//! A pure scoring component: given a transaction and the pool context it
//! would be ordered in, produce a risk classification, estimated MEV
//! exposure, and recommended protections. Thresholds and weights are
//! configuration; the policy shape is fixed.

use chrono::Utc;
use fairorder_core::{
    Error, MevAnalysis, PendingTransaction, ProtectionLevel, ProtectionRecommendation, Result,
    RiskIndicator, RiskLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protection-fee multipliers per requested protection level.
///
/// Monotonically increasing so a higher protection level always costs at
/// least as much.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionFeeSchedule {
    pub standard: f64,
    pub high: f64,
    pub maximum: f64,
}

impl Default for ProtectionFeeSchedule {
    fn default() -> Self {
        Self {
            standard: 0.05,
            high: 0.12,
            maximum: 0.25,
        }
    }
}

impl ProtectionFeeSchedule {
    /// Multiplier for a requested level. `None` pays nothing.
    #[must_use]
    pub fn multiplier(&self, level: ProtectionLevel) -> f64 {
        match level {
            ProtectionLevel::None => 0.0,
            ProtectionLevel::Standard => self.standard,
            ProtectionLevel::High => self.high,
            ProtectionLevel::Maximum => self.maximum,
        }
    }
}

/// Analyzer thresholds and signal weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Percentile of recent activity above which value/gas price counts as
    /// outsized (0–1).
    pub top_percentile: f64,

    /// Multiple of the recent median gas price that flags a front-running
    /// target.
    pub gas_multiple_threshold: f64,

    /// Pending transactions touching one recipient that flag MEV
    /// competition.
    pub density_threshold: usize,

    /// Recipient density at which a sandwich becomes practical.
    pub sandwich_density_threshold: usize,

    /// Weight of the value signal in estimated MEV.
    pub value_weight: f64,

    /// Weight of the gas-price signal in estimated MEV.
    pub gas_weight: f64,

    /// Weight of the density signal in estimated MEV.
    pub density_weight: f64,

    /// Protection-fee schedule.
    pub fee_schedule: ProtectionFeeSchedule,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            top_percentile: 0.95,
            gas_multiple_threshold: 3.0,
            density_threshold: 2,
            sandwich_density_threshold: 4,
            value_weight: 0.3,
            gas_weight: 0.5,
            density_weight: 0.2,
            fee_schedule: ProtectionFeeSchedule::default(),
        }
    }
}

/// Pool-level context the analyzer scores against.
#[derive(Debug, Clone, Default)]
pub struct PoolRiskContext {
    /// Values of recently processed transactions.
    pub recent_values: Vec<i64>,

    /// Gas prices of recently processed transactions.
    pub recent_gas_prices: Vec<i64>,

    /// Pending transactions per recipient, including the batch under
    /// analysis.
    pub recipient_density: HashMap<String, usize>,
}

impl PoolRiskContext {
    /// Context for a pool with no history; only structural checks and
    /// density signals can fire.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    fn median_gas_price(&self) -> Option<f64> {
        median(&self.recent_gas_prices)
    }
}

fn median(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0)
    } else {
        Some(sorted[mid] as f64)
    }
}

fn percentile(values: &[i64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((sorted.len() as f64) * p).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[index] as f64)
}

/// Analyze one transaction against its pool context.
///
/// Structurally invalid input yields `InvalidTransaction`, never a
/// best-effort score; the batch processor treats that as a per-transaction
/// failure, not a batch failure.
pub fn analyze(
    tx: &PendingTransaction,
    context: &PoolRiskContext,
    config: &AnalyzerConfig,
) -> Result<MevAnalysis> {
    if tx.value < 0 {
        return Err(Error::invalid_transaction(format!(
            "negative value {}",
            tx.value
        )));
    }
    if tx.gas_price < 0 {
        return Err(Error::invalid_transaction(format!(
            "negative gas price {}",
            tx.gas_price
        )));
    }
    if tx.gas_limit <= 0 {
        return Err(Error::invalid_transaction(format!(
            "non-positive gas limit {}",
            tx.gas_limit
        )));
    }

    let mut indicators = Vec::new();
    let mut level = RiskLevel::Low;
    let mut value_excess = 0.0;
    let mut gas_excess = 0.0;
    let mut density_magnitude = 0.0;

    // Size risk: top-percentile value or gas price raises risk one level.
    let mut outsized = false;
    if let Some(threshold) = percentile(&context.recent_values, config.top_percentile) {
        if tx.value as f64 >= threshold {
            indicators.push(RiskIndicator::LargeValue);
            value_excess = (tx.value as f64 - threshold).max(0.0);
            outsized = true;
        }
    }
    if let Some(threshold) = percentile(&context.recent_gas_prices, config.top_percentile) {
        if tx.gas_price as f64 >= threshold {
            indicators.push(RiskIndicator::LargeGasPrice);
            outsized = true;
        }
    }
    if outsized {
        level = level.escalate();
    }

    // Gas-price risk: far above the recent median marks a front-running
    // target.
    if let Some(median_gas) = context.median_gas_price() {
        let bar = median_gas * config.gas_multiple_threshold;
        if median_gas > 0.0 && tx.gas_price as f64 > bar {
            indicators.push(RiskIndicator::FrontRunningTarget);
            gas_excess = tx.gas_price as f64 - bar;
            level = level.max(RiskLevel::High);
        }
    }

    // Pool-density risk: contested recipients invite sandwiches and
    // arbitrage.
    let density = context
        .recipient_density
        .get(&tx.recipient)
        .copied()
        .unwrap_or(0);
    if density >= config.density_threshold {
        indicators.push(RiskIndicator::MevCompetition);
        level = level.max(RiskLevel::Medium);
        let reference_value = median(&context.recent_values).unwrap_or(tx.value.max(0) as f64);
        density_magnitude =
            (density - config.density_threshold + 1) as f64 * reference_value.max(1.0);
        if density >= config.sandwich_density_threshold {
            indicators.push(RiskIndicator::SandwichTarget);
            level = level.max(RiskLevel::High);
        }
    }

    // Compounding signals: a front-running target in a contested corner of
    // the pool is the classic sandwich setup.
    if indicators.contains(&RiskIndicator::FrontRunningTarget)
        && (indicators.contains(&RiskIndicator::MevCompetition)
            || indicators.contains(&RiskIndicator::SandwichTarget))
    {
        level = RiskLevel::Critical;
    }

    let estimated_mev = (config.value_weight * value_excess
        + config.gas_weight * gas_excess
        + config.density_weight * density_magnitude)
        .max(0.0);

    let protection_fee =
        (estimated_mev * config.fee_schedule.multiplier(tx.protection_level)).max(0.0);

    Ok(MevAnalysis {
        risk_level: level,
        estimated_mev,
        recommendations: recommend(&indicators),
        indicators,
        protection_fee,
        analyzed_at: Utc::now(),
    })
}

fn recommend(indicators: &[RiskIndicator]) -> Vec<ProtectionRecommendation> {
    let mut recommendations = Vec::new();
    let mut push = |r: ProtectionRecommendation| {
        if !recommendations.contains(&r) {
            recommendations.push(r);
        }
    };
    for indicator in indicators {
        match indicator {
            RiskIndicator::FrontRunningTarget => {
                push(ProtectionRecommendation::PrivatePool);
                push(ProtectionRecommendation::RandomizedOrdering);
            }
            RiskIndicator::SandwichTarget => {
                push(ProtectionRecommendation::DelayedInclusion);
                push(ProtectionRecommendation::SlippageGuard);
            }
            RiskIndicator::MevCompetition => push(ProtectionRecommendation::RandomizedOrdering),
            RiskIndicator::LargeValue => push(ProtectionRecommendation::SlippageGuard),
            RiskIndicator::LargeGasPrice => {}
        }
    }
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_gas(prices: &[i64]) -> PoolRiskContext {
        PoolRiskContext {
            recent_gas_prices: prices.to_vec(),
            ..PoolRiskContext::default()
        }
    }

    #[test]
    fn benign_transaction_in_empty_pool_is_low_risk() {
        let tx = PendingTransaction::new("alice", "bob", 100);
        let analysis = analyze(&tx, &PoolRiskContext::empty(), &AnalyzerConfig::default()).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::Low);
        assert_eq!(analysis.estimated_mev, 0.0);
        assert!(analysis.indicators.is_empty());
    }

    #[test]
    fn ten_times_median_gas_is_a_front_running_target() {
        let context = context_with_gas(&[90, 100, 100, 110, 100]);
        let mut tx = PendingTransaction::new("alice", "bob", 100);
        tx.gas_price = 1_000;

        let analysis = analyze(&tx, &context, &AnalyzerConfig::default()).unwrap();
        assert!(analysis.risk_level >= RiskLevel::Medium);
        assert!(analysis.estimated_mev > 0.0);
        assert!(analysis
            .indicators
            .contains(&RiskIndicator::FrontRunningTarget));
        assert!(analysis
            .recommendations
            .contains(&ProtectionRecommendation::RandomizedOrdering));
    }

    #[test]
    fn contested_recipient_raises_competition_risk() {
        let mut context = PoolRiskContext::empty();
        context.recipient_density.insert("dex".to_string(), 3);
        let tx = PendingTransaction::new("alice", "dex", 100);

        let analysis = analyze(&tx, &context, &AnalyzerConfig::default()).unwrap();
        assert!(analysis.indicators.contains(&RiskIndicator::MevCompetition));
        assert!(analysis.risk_level >= RiskLevel::Medium);
    }

    #[test]
    fn dense_recipient_plus_high_gas_is_critical() {
        let mut context = context_with_gas(&[100; 10]);
        context.recipient_density.insert("dex".to_string(), 5);
        let mut tx = PendingTransaction::new("alice", "dex", 100);
        tx.gas_price = 2_000;

        let analysis = analyze(&tx, &context, &AnalyzerConfig::default()).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::Critical);
        assert!(analysis.indicators.contains(&RiskIndicator::SandwichTarget));
    }

    #[test]
    fn negative_gas_price_is_structurally_invalid() {
        let mut tx = PendingTransaction::new("alice", "bob", 100);
        tx.gas_price = -1;
        let result = analyze(&tx, &PoolRiskContext::empty(), &AnalyzerConfig::default());
        assert!(matches!(result, Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn protection_fee_is_monotonic_in_level() {
        let context = context_with_gas(&[100; 10]);
        let config = AnalyzerConfig::default();
        let mut fees = Vec::new();
        for level in [
            ProtectionLevel::None,
            ProtectionLevel::Standard,
            ProtectionLevel::High,
            ProtectionLevel::Maximum,
        ] {
            let mut tx = PendingTransaction::new("alice", "bob", 100);
            tx.gas_price = 5_000;
            tx.protection_level = level;
            fees.push(analyze(&tx, &context, &config).unwrap().protection_fee);
        }
        assert_eq!(fees[0], 0.0);
        assert!(fees[1] < fees[2]);
        assert!(fees[2] < fees[3]);
    }

    #[test]
    fn large_value_raises_one_level() {
        let context = PoolRiskContext {
            recent_values: vec![100, 120, 90, 110, 100, 95, 105, 115, 100, 100],
            ..PoolRiskContext::default()
        };
        let tx = PendingTransaction::new("whale", "bob", 10_000);
        let analysis = analyze(&tx, &context, &AnalyzerConfig::default()).unwrap();
        assert_eq!(analysis.risk_level, RiskLevel::Medium);
        assert!(analysis.indicators.contains(&RiskIndicator::LargeValue));
    }

    #[test]
    fn median_of_even_window_averages() {
        assert_eq!(median(&[1, 3]), Some(2.0));
        assert_eq!(median(&[]), None);
    }
}
