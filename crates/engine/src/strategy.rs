//! Ordering strategy library.
//!
//! Each strategy is a pure, total function from an analyzed batch to a
//! final order: every input transaction id appears exactly once with a
//! unique final position in `[0, len)`. The universal final tie-break for
//! every strategy is submission timestamp ascending, then transaction id
//! ascending.

use crate::random::{permutation_from_seed, seed_commitment, SecureRandom};
use fairorder_core::{MevAnalysis, OrderingAlgorithm, PendingTransaction, TransactionId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

/// A transaction together with its risk analysis and drained-queue
/// position.
#[derive(Debug, Clone)]
pub struct AnalyzedTransaction {
    /// The transaction.
    pub transaction: PendingTransaction,

    /// Risk snapshot from the analyzer.
    pub analysis: MevAnalysis,

    /// Position in the drained queue.
    pub original_position: usize,
}

/// Tunable strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Maximum displacement versus FIFO order that `PriorityFair` allows
    /// any single transaction, in positions.
    pub max_position_delta: usize,

    /// Half-width of the position jitter `MevResistant` applies to risky
    /// transactions.
    pub jitter_window: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            max_position_delta: 3,
            jitter_window: 2,
        }
    }
}

/// Final position assignment for one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Transaction id.
    pub transaction_id: TransactionId,

    /// Position in the drained queue.
    pub original_position: usize,

    /// Assigned final position.
    pub final_position: usize,
}

/// The output of one strategy run.
#[derive(Debug, Clone)]
pub struct OrderingOutcome {
    /// Placements sorted by final position.
    pub placements: Vec<Placement>,

    /// Hex SHA-256 commitment to the random seed, for randomized
    /// strategies.
    pub seed_commitment: Option<String>,

    /// Hex seed, revealed alongside the terminal batch record.
    pub revealed_seed: Option<String>,
}

/// Universal tie-break: submission timestamp ascending, then id ascending.
fn tie_break(a: &AnalyzedTransaction, b: &AnalyzedTransaction) -> Ordering {
    a.transaction
        .submitted_at
        .cmp(&b.transaction.submitted_at)
        .then_with(|| a.transaction.id.cmp(&b.transaction.id))
}

/// Batch indices in FIFO order.
fn fifo_indices(batch: &[AnalyzedTransaction]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..batch.len()).collect();
    indices.sort_by(|&a, &b| tie_break(&batch[a], &batch[b]));
    indices
}

/// Run the configured algorithm over an analyzed batch.
pub fn order(
    algorithm: OrderingAlgorithm,
    batch: &[AnalyzedTransaction],
    params: &StrategyParams,
    random: &dyn SecureRandom,
) -> OrderingOutcome {
    let (ordered, seed) = match algorithm {
        OrderingAlgorithm::Fifo | OrderingAlgorithm::TimeWeighted => (fifo_indices(batch), None),
        OrderingAlgorithm::GasWeighted => (gas_weighted(batch), None),
        OrderingAlgorithm::PriorityFair => {
            (priority_fair(batch, params.max_position_delta), None)
        }
        OrderingAlgorithm::FairQueue => (fair_queue(batch), None),
        OrderingAlgorithm::RandomFair => {
            let seed = random.seed32();
            (random_fair(batch, seed), Some(seed))
        }
        OrderingAlgorithm::MevResistant => {
            let seed = random.seed32();
            (mev_resistant(batch, params.jitter_window, seed), Some(seed))
        }
    };

    let placements = ordered
        .iter()
        .enumerate()
        .map(|(position, &index)| Placement {
            transaction_id: batch[index].transaction.id,
            original_position: batch[index].original_position,
            final_position: position,
        })
        .collect();

    OrderingOutcome {
        placements,
        seed_commitment: seed.as_ref().map(seed_commitment),
        revealed_seed: seed.map(hex::encode),
    }
}

/// Check that placements form a permutation of `[0, expected)` with unique
/// transaction ids. A violation means a defective strategy.
pub fn validate_placements(
    placements: &[Placement],
    expected: usize,
) -> std::result::Result<(), String> {
    if placements.len() != expected {
        return Err(format!(
            "strategy returned {} placements for {} transactions",
            placements.len(),
            expected
        ));
    }
    let mut position_taken = vec![false; expected];
    let mut ids = HashSet::with_capacity(expected);
    for placement in placements {
        if placement.final_position >= expected {
            return Err(format!(
                "final position {} out of range [0, {expected})",
                placement.final_position
            ));
        }
        if position_taken[placement.final_position] {
            return Err(format!(
                "final position {} assigned twice",
                placement.final_position
            ));
        }
        position_taken[placement.final_position] = true;
        if !ids.insert(placement.transaction_id) {
            return Err(format!(
                "transaction {} placed twice",
                placement.transaction_id
            ));
        }
    }
    Ok(())
}

fn gas_weighted(batch: &[AnalyzedTransaction]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..batch.len()).collect();
    indices.sort_by(|&a, &b| {
        batch[b]
            .transaction
            .gas_price
            .cmp(&batch[a].transaction.gas_price)
            .then_with(|| tie_break(&batch[a], &batch[b]))
    });
    indices
}

/// Priority fee descending, with displacement versus FIFO order bounded by
/// `delta` in both directions.
///
/// Greedy placement: at each slot the transaction that has reached its
/// maximum allowed lag is forced in; otherwise the highest-fee transaction
/// eligible to be pulled forward wins. At most one transaction can reach
/// its forcing slot at a time, so the bound is exact.
fn priority_fair(batch: &[AnalyzedTransaction], delta: usize) -> Vec<usize> {
    let n = batch.len();
    let fifo = fifo_indices(batch);
    let mut fifo_pos = vec![0usize; n];
    for (slot, &index) in fifo.iter().enumerate() {
        fifo_pos[index] = slot;
    }

    // Remaining transactions, kept in FIFO order.
    let mut remaining: VecDeque<usize> = fifo.into_iter().collect();
    let mut ordered = Vec::with_capacity(n);
    for position in 0..n {
        let forced = remaining
            .iter()
            .position(|&index| fifo_pos[index] + delta <= position);
        let take = match forced {
            Some(slot) => slot,
            None => {
                let mut best = 0;
                for (slot, &index) in remaining.iter().enumerate() {
                    if fifo_pos[index] > position + delta {
                        continue;
                    }
                    let best_index = remaining[best];
                    let candidate = &batch[index];
                    let current = &batch[best_index];
                    let fee = candidate.transaction.priority_fee;
                    let best_fee = current.transaction.priority_fee;
                    if fee > best_fee
                        || (fee == best_fee && tie_break(candidate, current) == Ordering::Less)
                    {
                        best = slot;
                    }
                }
                best
            }
        };
        // The head of the queue always satisfies the pull-forward bound, so
        // `take` is always a legal choice.
        if let Some(index) = remaining.remove(take) {
            ordered.push(index);
        }
    }
    ordered
}

/// Round-robin across distinct senders; within one sender, submission
/// order.
fn fair_queue(batch: &[AnalyzedTransaction]) -> Vec<usize> {
    let mut senders: Vec<&str> = Vec::new();
    let mut queues: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for &index in &fifo_indices(batch) {
        let sender = batch[index].transaction.sender.as_str();
        if !queues.contains_key(sender) {
            senders.push(sender);
        }
        queues.entry(sender).or_default().push_back(index);
    }

    let mut ordered = Vec::with_capacity(batch.len());
    while ordered.len() < batch.len() {
        for sender in &senders {
            if let Some(queue) = queues.get_mut(sender) {
                if let Some(index) = queue.pop_front() {
                    ordered.push(index);
                }
            }
        }
    }
    ordered
}

/// Unbiased random permutation of the batch, derived from the committed
/// seed.
fn random_fair(batch: &[AnalyzedTransaction], seed: [u8; 32]) -> Vec<usize> {
    let fifo = fifo_indices(batch);
    permutation_from_seed(seed, batch.len())
        .into_iter()
        .map(|slot| fifo[slot])
        .collect()
}

/// Risky transactions spread between low-risk buffers, with bounded
/// position jitter so adjacency is not predictable.
fn mev_resistant(batch: &[AnalyzedTransaction], jitter_window: usize, seed: [u8; 32]) -> Vec<usize> {
    let mut rng = ChaCha20Rng::from_seed(seed);
    let mut safe = Vec::new();
    let mut risky = Vec::new();
    for index in fifo_indices(batch) {
        if batch[index].analysis.is_flagged() {
            risky.push(index);
        } else {
            safe.push(index);
        }
    }

    let mut ordered = safe;
    let risky_count = risky.len();
    for (rank, index) in risky.into_iter().enumerate() {
        let base = ((rank + 1) * (ordered.len() + 1)) / (risky_count + 1);
        let jitter = if jitter_window == 0 {
            0
        } else {
            rng.gen_range(-(jitter_window as isize)..=jitter_window as isize)
        };
        let position = (base as isize + jitter).clamp(0, ordered.len() as isize) as usize;
        ordered.insert(position, index);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededSecureRandom;
    use chrono::{Duration, Utc};
    use fairorder_core::RiskLevel;
    use proptest::prelude::*;

    fn tx_at(offset_ms: i64, sender: &str, priority_fee: i64) -> PendingTransaction {
        let mut tx = PendingTransaction::new(sender, "recipient", 100);
        tx.submitted_at = Utc::now() + Duration::milliseconds(offset_ms);
        tx.priority_fee = priority_fee;
        tx
    }

    fn analyzed(batch: Vec<PendingTransaction>) -> Vec<AnalyzedTransaction> {
        batch
            .into_iter()
            .enumerate()
            .map(|(position, transaction)| AnalyzedTransaction {
                transaction,
                analysis: MevAnalysis::benign(),
                original_position: position,
            })
            .collect()
    }

    fn run(algorithm: OrderingAlgorithm, batch: &[AnalyzedTransaction]) -> OrderingOutcome {
        let random = SeededSecureRandom::new(7);
        order(algorithm, batch, &StrategyParams::default(), &random)
    }

    #[test]
    fn empty_batch_yields_empty_outcome() {
        let outcome = run(OrderingAlgorithm::Fifo, &[]);
        assert!(outcome.placements.is_empty());
        assert!(validate_placements(&outcome.placements, 0).is_ok());
    }

    #[test]
    fn fifo_is_the_identity() {
        let batch = analyzed((0..8).map(|i| tx_at(i, "sender", 0)).collect());
        let outcome = run(OrderingAlgorithm::Fifo, &batch);
        for placement in &outcome.placements {
            assert_eq!(placement.final_position, placement.original_position);
        }
    }

    #[test]
    fn gas_weighted_sorts_descending() {
        let mut txs: Vec<PendingTransaction> =
            (0..5).map(|i| tx_at(i, "sender", 0)).collect();
        for (i, tx) in txs.iter_mut().enumerate() {
            tx.gas_price = (i as i64) * 10;
        }
        let batch = analyzed(txs);
        let outcome = run(OrderingAlgorithm::GasWeighted, &batch);
        // Highest gas price lands first.
        let first = outcome
            .placements
            .iter()
            .find(|p| p.final_position == 0)
            .unwrap();
        assert_eq!(first.original_position, 4);
    }

    #[test]
    fn priority_fair_respects_the_displacement_bound() {
        let delta = StrategyParams::default().max_position_delta;
        let fees = [5, 80, 3, 200, 1, 90, 40, 7, 300, 2, 60, 11];
        let batch = analyzed(
            fees.iter()
                .enumerate()
                .map(|(i, &fee)| tx_at(i as i64, "sender", fee))
                .collect(),
        );
        let outcome = run(OrderingAlgorithm::PriorityFair, &batch);
        assert!(validate_placements(&outcome.placements, batch.len()).is_ok());
        for placement in &outcome.placements {
            let displacement = placement
                .final_position
                .abs_diff(placement.original_position);
            assert!(
                displacement <= delta,
                "tx at {} displaced to {} (delta {delta})",
                placement.original_position,
                placement.final_position
            );
        }
    }

    #[test]
    fn priority_fair_with_zero_delta_is_fifo() {
        let batch = analyzed((0..6).map(|i| tx_at(i, "sender", 100 - i as i64)).collect());
        let params = StrategyParams {
            max_position_delta: 0,
            ..StrategyParams::default()
        };
        let random = SeededSecureRandom::new(7);
        let outcome = order(OrderingAlgorithm::PriorityFair, &batch, &params, &random);
        for placement in &outcome.placements {
            assert_eq!(placement.final_position, placement.original_position);
        }
    }

    #[test]
    fn fair_queue_round_robins_senders() {
        let batch = analyzed(vec![
            tx_at(0, "a", 0),
            tx_at(1, "a", 0),
            tx_at(2, "a", 0),
            tx_at(3, "b", 0),
        ]);
        let outcome = run(OrderingAlgorithm::FairQueue, &batch);
        let mut by_position: Vec<usize> = vec![0; 4];
        for placement in &outcome.placements {
            by_position[placement.final_position] = placement.original_position;
        }
        // a, b alternate until b runs dry: [a0, b0, a1, a2].
        assert_eq!(by_position, vec![0, 3, 1, 2]);
    }

    #[test]
    fn random_fair_is_deterministic_per_seed() {
        let batch = analyzed((0..10).map(|i| tx_at(i, "sender", 0)).collect());
        let params = StrategyParams::default();
        let first = order(
            OrderingAlgorithm::RandomFair,
            &batch,
            &params,
            &SeededSecureRandom::new(3),
        );
        let second = order(
            OrderingAlgorithm::RandomFair,
            &batch,
            &params,
            &SeededSecureRandom::new(3),
        );
        assert_eq!(first.placements, second.placements);
        assert_eq!(first.seed_commitment, second.seed_commitment);
        assert!(first.seed_commitment.is_some());
        assert!(first.revealed_seed.is_some());
    }

    #[test]
    fn random_fair_frequencies_approach_uniform() {
        let batch = analyzed((0..3).map(|i| tx_at(i, "sender", 0)).collect());
        let params = StrategyParams::default();
        let random = SeededSecureRandom::new(99);

        let trials = 6_000;
        let mut counts: HashMap<Vec<usize>, usize> = HashMap::new();
        for _ in 0..trials {
            let outcome = order(OrderingAlgorithm::RandomFair, &batch, &params, &random);
            let mut by_position = vec![0usize; 3];
            for placement in &outcome.placements {
                by_position[placement.final_position] = placement.original_position;
            }
            *counts.entry(by_position).or_default() += 1;
        }

        assert_eq!(counts.len(), 6, "all 3! permutations should occur");
        let expected = trials / 6;
        for (permutation, count) in counts {
            assert!(
                count.abs_diff(expected) < 300,
                "permutation {permutation:?} occurred {count} times (expected ~{expected})"
            );
        }
    }

    #[test]
    fn mev_resistant_separates_risky_transactions() {
        let mut batch = analyzed((0..8).map(|i| tx_at(i, "sender", 0)).collect());
        batch[2].analysis.risk_level = RiskLevel::High;
        batch[3].analysis.risk_level = RiskLevel::Critical;

        let params = StrategyParams {
            jitter_window: 0,
            ..StrategyParams::default()
        };
        let random = SeededSecureRandom::new(5);
        let outcome = order(OrderingAlgorithm::MevResistant, &batch, &params, &random);
        assert!(validate_placements(&outcome.placements, batch.len()).is_ok());

        let mut risky_positions: Vec<usize> = outcome
            .placements
            .iter()
            .filter(|p| p.original_position == 2 || p.original_position == 3)
            .map(|p| p.final_position)
            .collect();
        risky_positions.sort_unstable();
        assert!(
            risky_positions[1] - risky_positions[0] > 1,
            "risky transactions ended up adjacent: {risky_positions:?}"
        );
    }

    #[test]
    fn validate_placements_catches_duplicates() {
        let batch = analyzed(vec![tx_at(0, "a", 0), tx_at(1, "b", 0)]);
        let mut placements = run(OrderingAlgorithm::Fifo, &batch).placements;
        placements[1].final_position = placements[0].final_position;
        assert!(validate_placements(&placements, 2).is_err());
    }

    proptest! {
        #[test]
        fn every_strategy_is_total(
            fees in proptest::collection::vec(0i64..1_000, 0..40),
            seed in 0u64..1_000,
        ) {
            let batch = analyzed(
                fees.iter()
                    .enumerate()
                    .map(|(i, &fee)| tx_at(i as i64, if i % 3 == 0 { "a" } else { "b" }, fee))
                    .collect(),
            );
            let params = StrategyParams::default();
            let random = SeededSecureRandom::new(seed);
            for algorithm in [
                OrderingAlgorithm::Fifo,
                OrderingAlgorithm::PriorityFair,
                OrderingAlgorithm::FairQueue,
                OrderingAlgorithm::RandomFair,
                OrderingAlgorithm::MevResistant,
                OrderingAlgorithm::TimeWeighted,
                OrderingAlgorithm::GasWeighted,
            ] {
                let outcome = order(algorithm, &batch, &params, &random);
                prop_assert!(validate_placements(&outcome.placements, batch.len()).is_ok());
            }
        }
    }
}
