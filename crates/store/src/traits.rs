use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Abstraction exposed by storage backends.
///
/// The engine assumes `put` is durable once it returns and that operations
/// on a single key are linearizable. No ordering is assumed across keys.
pub trait Store: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;

    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// All entries whose key starts with `prefix`, sorted by key.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

/// Convenience helpers for working with JSON-encoded records.
pub trait StoreExt: Store {
    fn put_json<V: Serialize>(&self, key: Vec<u8>, value: &V) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes)
    }

    fn get_json<V: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<V>, StoreError> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decode every record under `prefix`, skipping nothing: a record that
    /// fails to decode is a serialization error, not a missing entry.
    fn scan_json<V: DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<V>, StoreError> {
        let mut records = Vec::new();
        for (_, bytes) in self.scan_prefix(prefix)? {
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }
}

impl<T: Store + ?Sized> StoreExt for T {}
