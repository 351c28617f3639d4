//! Key construction for persisted engine records.
//!
//! Keys are namespaced byte strings: `pool/{pool_id}`, `batch/{batch_id}`,
//! `result/{transaction_id}`, `metrics/{pool_id}`. Uuid display form keeps
//! prefix scans lexicographic and human-debuggable.

use fairorder_core::{BatchId, PoolId, TransactionId};

/// Namespace prefix for pool records.
pub const POOL_PREFIX: &[u8] = b"pool/";

/// Namespace prefix for batch records.
pub const BATCH_PREFIX: &[u8] = b"batch/";

/// Namespace prefix for per-transaction ordering results.
pub const RESULT_PREFIX: &[u8] = b"result/";

/// Namespace prefix for per-pool fairness metrics.
pub const METRICS_PREFIX: &[u8] = b"metrics/";

fn join(prefix: &[u8], id: impl ToString) -> Vec<u8> {
    let id = id.to_string();
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id.as_bytes());
    key
}

/// Key for a persisted pool record.
#[must_use]
pub fn pool(id: &PoolId) -> Vec<u8> {
    join(POOL_PREFIX, id)
}

/// Key for a persisted batch record.
#[must_use]
pub fn batch(id: &BatchId) -> Vec<u8> {
    join(BATCH_PREFIX, id)
}

/// Key for a persisted ordering result.
#[must_use]
pub fn result(id: &TransactionId) -> Vec<u8> {
    join(RESULT_PREFIX, id)
}

/// Key for persisted pool metrics.
#[must_use]
pub fn metrics(id: &PoolId) -> Vec<u8> {
    join(METRICS_PREFIX, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_their_namespace() {
        let id = PoolId::new();
        let key = pool(&id);
        assert!(key.starts_with(POOL_PREFIX));
        assert!(String::from_utf8(key).unwrap().contains(&id.to_string()));
    }

    #[test]
    fn namespaces_do_not_collide() {
        // "pool/" must never be a prefix of another namespace.
        for other in [BATCH_PREFIX, RESULT_PREFIX, METRICS_PREFIX] {
            assert!(!other.starts_with(POOL_PREFIX));
        }
    }
}
