use std::path::Path;

use crate::error::StoreError;
use crate::traits::Store;

/// Persistent store backed by the `sled` embedded database.
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|err| StoreError::backend(err.to_string()))?;
        Ok(Self { db })
    }
}

impl Store for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.db
            .get(key)
            .map_err(|err| StoreError::backend(err.to_string()))
            .map(|opt| opt.map(|ivec| ivec.as_ref().to_vec()))
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.db
            .insert(key, value)
            .map_err(|err| StoreError::backend(err.to_string()))?;
        self.db
            .flush()
            .map_err(|err| StoreError::backend(err.to_string()))?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.db
            .remove(key)
            .map_err(|err| StoreError::backend(err.to_string()))?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (key, value) = item.map_err(|err| StoreError::backend(err.to_string()))?;
            entries.push((key.as_ref().to_vec(), value.as_ref().to_vec()));
        }
        Ok(entries)
    }
}
