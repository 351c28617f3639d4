//! Pending-transaction record and submission validation.

use crate::error::{Error, Result};
use crate::id::TransactionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protection level requested by the submitter.
///
/// Higher levels buy stronger ordering protections and a proportionally
/// higher protection fee.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum ProtectionLevel {
    /// No protection requested; the transaction pays no protection fee.
    None,
    #[default]
    Standard,
    High,
    Maximum,
}

/// A transaction waiting in a pool's pending queue.
///
/// Belongs to exactly one pool at a time and is never mutated after it has
/// been drained into a batch; a new version requires resubmission under a
/// new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Transaction id.
    pub id: TransactionId,

    /// Sender address (opaque to the engine).
    pub sender: String,

    /// Recipient address (opaque to the engine).
    pub recipient: String,

    /// Transferred value in base units.
    pub value: i64,

    /// Opaque payload carried through ordering untouched.
    #[serde(default)]
    pub payload: Vec<u8>,

    /// Gas price in base units.
    pub gas_price: i64,

    /// Gas limit.
    pub gas_limit: i64,

    /// Priority fee in base units.
    pub priority_fee: i64,

    /// When the transaction was accepted into a pending queue.
    pub submitted_at: DateTime<Utc>,

    /// Requested protection level.
    #[serde(default)]
    pub protection_level: ProtectionLevel,

    /// Earliest acceptable execution time, if any.
    #[serde(default)]
    pub not_before: Option<DateTime<Utc>>,

    /// Latest acceptable execution time, if any.
    #[serde(default)]
    pub not_after: Option<DateTime<Utc>>,
}

impl PendingTransaction {
    /// Create a transaction with a fresh id and sensible defaults.
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, value: i64) -> Self {
        Self {
            id: TransactionId::new(),
            sender: sender.into(),
            recipient: recipient.into(),
            value,
            payload: Vec::new(),
            gas_price: 0,
            gas_limit: 21_000,
            priority_fee: 0,
            submitted_at: Utc::now(),
            protection_level: ProtectionLevel::default(),
            not_before: None,
            not_after: None,
        }
    }

    /// Validate submission invariants.
    ///
    /// A transaction that fails here is rejected at the door and never
    /// enters a pending queue.
    pub fn validate(&self) -> Result<()> {
        if self.sender.trim().is_empty() {
            return Err(Error::invalid_transaction("sender must not be empty"));
        }
        if self.recipient.trim().is_empty() {
            return Err(Error::invalid_transaction("recipient must not be empty"));
        }
        if self.value < 0 {
            return Err(Error::invalid_transaction(format!(
                "value must be non-negative, got {}",
                self.value
            )));
        }
        if self.gas_price < 0 {
            return Err(Error::invalid_transaction(format!(
                "gas price must be non-negative, got {}",
                self.gas_price
            )));
        }
        if self.gas_limit <= 0 {
            return Err(Error::invalid_transaction(format!(
                "gas limit must be positive, got {}",
                self.gas_limit
            )));
        }
        if self.priority_fee < 0 {
            return Err(Error::invalid_transaction(format!(
                "priority fee must be non-negative, got {}",
                self.priority_fee
            )));
        }
        if let (Some(not_before), Some(not_after)) = (self.not_before, self.not_after) {
            if not_before > not_after {
                return Err(Error::invalid_transaction(
                    "execution window is inverted (not_before > not_after)",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn valid_transaction_passes() {
        let tx = PendingTransaction::new("alice", "bob", 100);
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn empty_sender_is_rejected() {
        let tx = PendingTransaction::new("  ", "bob", 100);
        assert!(matches!(tx.validate(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn negative_value_is_rejected() {
        let tx = PendingTransaction::new("alice", "bob", -1);
        assert!(matches!(tx.validate(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn zero_gas_limit_is_rejected() {
        let mut tx = PendingTransaction::new("alice", "bob", 100);
        tx.gas_limit = 0;
        assert!(matches!(tx.validate(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn inverted_execution_window_is_rejected() {
        let mut tx = PendingTransaction::new("alice", "bob", 100);
        let now = Utc::now();
        tx.not_before = Some(now);
        tx.not_after = Some(now - Duration::seconds(10));
        assert!(matches!(tx.validate(), Err(Error::InvalidTransaction(_))));
    }

    #[test]
    fn protection_levels_are_ordered() {
        assert!(ProtectionLevel::Maximum > ProtectionLevel::High);
        assert!(ProtectionLevel::High > ProtectionLevel::Standard);
        assert!(ProtectionLevel::Standard > ProtectionLevel::None);
    }
}
