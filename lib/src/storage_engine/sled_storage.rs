// lib/src/storage_engine/sled_storage.rs
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};
use sled::{Db, Tree};

use models::errors::{ClinicError, ClinicResult};

use crate::config::StorageConfig;
use crate::storage_engine::storage_engine::{decode_counter, Collection, StorageEngine, UniqueIndex};

const SEQUENCES_TREE: &str = "sequences";

#[derive(Clone, Debug)]
pub struct SledStorage {
    db: Db,
    path: PathBuf,
}

impl SledStorage {
    pub fn new(config: &StorageConfig) -> ClinicResult<Self> {
        let path = config.data_directory.join("sled");
        info!("Opening sled database at {}", path.display());

        let mut sled_config = sled::Config::new().path(&path).temporary(config.temporary);
        if let Some(capacity) = config.cache_capacity {
            sled_config = sled_config.cache_capacity(capacity);
        }
        let db = sled_config.open().map_err(|e| {
            ClinicError::StorageError(format!("Failed to open sled database at {}: {}", path.display(), e))
        })?;
        Ok(SledStorage { db, path })
    }

    fn tree(&self, collection: Collection) -> ClinicResult<Tree> {
        Ok(self.db.open_tree(collection.tree_name())?)
    }

    fn index(&self, index: UniqueIndex) -> ClinicResult<Tree> {
        Ok(self.db.open_tree(index.tree_name())?)
    }
}

#[async_trait]
impl StorageEngine for SledStorage {
    async fn connect(&self) -> ClinicResult<()> {
        for collection in Collection::ALL {
            self.tree(collection)?;
        }
        for index in UniqueIndex::ALL {
            self.index(index)?;
        }
        debug!("sled trees ready at {}", self.path.display());
        Ok(())
    }

    async fn insert(&self, collection: Collection, key: &[u8], value: Vec<u8>) -> ClinicResult<()> {
        self.tree(collection)?.insert(key, value)?;
        Ok(())
    }

    async fn retrieve(&self, collection: Collection, key: &[u8]) -> ClinicResult<Option<Vec<u8>>> {
        Ok(self.tree(collection)?.get(key)?.map(|v| v.to_vec()))
    }

    async fn delete(&self, collection: Collection, key: &[u8]) -> ClinicResult<bool> {
        Ok(self.tree(collection)?.remove(key)?.is_some())
    }

    async fn scan(&self, collection: Collection) -> ClinicResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let entries = self
            .tree(collection)?
            .iter()
            .map(|entry| entry.map(|(k, v)| (k.to_vec(), v.to_vec())))
            .collect::<Result<Vec<_>, sled::Error>>()?;
        Ok(entries)
    }

    async fn flush(&self) -> ClinicResult<()> {
        let bytes = self.db.flush_async().await?;
        debug!("Flushed {} bytes to {}", bytes, self.path.display());
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "sled"
    }

    async fn claim_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool> {
        let swapped = self
            .index(index)?
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(owner))?;
        Ok(swapped.is_ok())
    }

    async fn lookup_unique(&self, index: UniqueIndex, key: &str) -> ClinicResult<Option<Vec<u8>>> {
        Ok(self.index(index)?.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn release_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool> {
        let swapped = self
            .index(index)?
            .compare_and_swap(key.as_bytes(), Some(owner), None::<&[u8]>)?;
        Ok(swapped.is_ok())
    }

    async fn next_sequence(&self, name: &str) -> ClinicResult<u64> {
        let tree = self.db.open_tree(SEQUENCES_TREE)?;
        let updated = tree.update_and_fetch(name.as_bytes(), |old| {
            let next = old.map(decode_counter).unwrap_or(0) + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        updated
            .map(|bytes| decode_counter(&bytes))
            .ok_or_else(|| ClinicError::StorageError(format!("sequence '{}' vanished during update", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> StorageConfig {
        StorageConfig {
            data_directory: dir.to_path_buf(),
            cache_capacity: Some(8 * 1024 * 1024),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = SledStorage::new(&config_in(dir.path())).unwrap();
            storage.connect().await.unwrap();
            storage.insert(Collection::Users, b"u1", b"alice".to_vec()).await.unwrap();
            assert!(storage.claim_unique(UniqueIndex::UserEmail, "alice@x.org", b"u1").await.unwrap());
            assert_eq!(storage.next_sequence("patient").await.unwrap(), 1);
            storage.flush().await.unwrap();
        }
        let storage = SledStorage::new(&config_in(dir.path())).unwrap();
        assert_eq!(storage.retrieve(Collection::Users, b"u1").await.unwrap(), Some(b"alice".to_vec()));
        assert!(!storage.claim_unique(UniqueIndex::UserEmail, "alice@x.org", b"u2").await.unwrap());
        assert_eq!(storage.next_sequence("patient").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn release_requires_the_owner() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledStorage::new(&config_in(dir.path())).unwrap();
        assert!(storage.claim_unique(UniqueIndex::PatientId, "000001-19700101", b"p1").await.unwrap());
        assert!(!storage.release_unique(UniqueIndex::PatientId, "000001-19700101", b"p2").await.unwrap());
        assert!(storage.release_unique(UniqueIndex::PatientId, "000001-19700101", b"p1").await.unwrap());
        assert_eq!(storage.lookup_unique(UniqueIndex::PatientId, "000001-19700101").await.unwrap(), None);
    }

    #[tokio::test]
    async fn collections_are_separate_keyspaces() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SledStorage::new(&config_in(dir.path())).unwrap();
        storage.insert(Collection::Patients, b"same", b"patient".to_vec()).await.unwrap();
        storage.insert(Collection::Appointments, b"same", b"appointment".to_vec()).await.unwrap();
        assert_eq!(storage.scan(Collection::Patients).await.unwrap().len(), 1);
        assert!(storage.delete(Collection::Appointments, b"same").await.unwrap());
        assert!(storage.retrieve(Collection::Patients, b"same").await.unwrap().is_some());
    }
}
