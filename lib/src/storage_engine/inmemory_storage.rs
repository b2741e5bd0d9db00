// lib/src/storage_engine/inmemory_storage.rs
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;

use models::errors::ClinicResult;

use crate::storage_engine::storage_engine::{Collection, StorageEngine, UniqueIndex};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    collections: TokioMutex<HashMap<Collection, Tree>>,
    indexes: TokioMutex<HashMap<UniqueIndex, HashMap<String, Vec<u8>>>>,
    sequences: TokioMutex<HashMap<String, u64>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn connect(&self) -> ClinicResult<()> {
        Ok(())
    }

    async fn insert(&self, collection: Collection, key: &[u8], value: Vec<u8>) -> ClinicResult<()> {
        let mut collections = self.collections.lock().await;
        collections.entry(collection).or_default().insert(key.to_vec(), value);
        Ok(())
    }

    async fn retrieve(&self, collection: Collection, key: &[u8]) -> ClinicResult<Option<Vec<u8>>> {
        let collections = self.collections.lock().await;
        Ok(collections.get(&collection).and_then(|tree| tree.get(key)).cloned())
    }

    async fn delete(&self, collection: Collection, key: &[u8]) -> ClinicResult<bool> {
        let mut collections = self.collections.lock().await;
        Ok(collections
            .get_mut(&collection)
            .map_or(false, |tree| tree.remove(key).is_some()))
    }

    async fn scan(&self, collection: Collection) -> ClinicResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(&collection)
            .map(|tree| tree.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn flush(&self) -> ClinicResult<()> {
        Ok(())
    }

    fn get_type(&self) -> &'static str {
        "in_memory"
    }

    async fn claim_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool> {
        let mut indexes = self.indexes.lock().await;
        let entries = indexes.entry(index).or_default();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), owner.to_vec());
        Ok(true)
    }

    async fn lookup_unique(&self, index: UniqueIndex, key: &str) -> ClinicResult<Option<Vec<u8>>> {
        let indexes = self.indexes.lock().await;
        Ok(indexes.get(&index).and_then(|entries| entries.get(key)).cloned())
    }

    async fn release_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool> {
        let mut indexes = self.indexes.lock().await;
        let Some(entries) = indexes.get_mut(&index) else {
            return Ok(false);
        };
        if entries.get(key).map(Vec::as_slice) == Some(owner) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn next_sequence(&self, name: &str) -> ClinicResult<u64> {
        let mut sequences = self.sequences.lock().await;
        let counter = sequences.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn insert_retrieve_delete() {
        let storage = InMemoryStorage::new();
        storage.insert(Collection::Patients, b"k1", b"v1".to_vec()).await.unwrap();
        assert_eq!(
            storage.retrieve(Collection::Patients, b"k1").await.unwrap(),
            Some(b"v1".to_vec())
        );
        assert_eq!(storage.retrieve(Collection::Users, b"k1").await.unwrap(), None);
        assert!(storage.delete(Collection::Patients, b"k1").await.unwrap());
        assert!(!storage.delete(Collection::Patients, b"k1").await.unwrap());
    }

    #[tokio::test]
    async fn scan_is_key_ordered() {
        let storage = InMemoryStorage::new();
        for key in [b"c", b"a", b"b"] {
            storage.insert(Collection::AuditLog, key, key.to_vec()).await.unwrap();
        }
        let keys: Vec<Vec<u8>> = storage
            .scan(Collection::AuditLog)
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn unique_claims_are_exclusive() {
        let storage = InMemoryStorage::new();
        assert!(storage.claim_unique(UniqueIndex::PatientContact, "555", b"p1").await.unwrap());
        assert!(!storage.claim_unique(UniqueIndex::PatientContact, "555", b"p2").await.unwrap());
        assert!(!storage.release_unique(UniqueIndex::PatientContact, "555", b"p2").await.unwrap());
        assert_eq!(
            storage.lookup_unique(UniqueIndex::PatientContact, "555").await.unwrap(),
            Some(b"p1".to_vec())
        );
        assert!(storage.release_unique(UniqueIndex::PatientContact, "555", b"p1").await.unwrap());
        assert!(storage.claim_unique(UniqueIndex::PatientContact, "555", b"p2").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let storage = Arc::new(InMemoryStorage::new());
        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let storage = storage.clone();
                tokio::spawn(async move {
                    storage.claim_unique(UniqueIndex::UserEmail, "a@b.c", &[i]).await.unwrap()
                })
            })
            .collect();
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn sequences_count_independently() {
        let storage = InMemoryStorage::new();
        assert_eq!(storage.next_sequence("patient").await.unwrap(), 1);
        assert_eq!(storage.next_sequence("patient").await.unwrap(), 2);
        assert_eq!(storage.next_sequence("other").await.unwrap(), 1);
    }
}
