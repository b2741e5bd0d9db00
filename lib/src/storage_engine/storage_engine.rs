// lib/src/storage_engine/storage_engine.rs
use std::fmt::Debug;

use async_trait::async_trait;

use models::errors::ClinicResult;

/// Document collections. Each maps to its own keyspace (a sled tree).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Patients,
    Appointments,
    AuditLog,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Users,
        Collection::Patients,
        Collection::Appointments,
        Collection::AuditLog,
    ];

    pub fn tree_name(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Patients => "patients",
            Collection::Appointments => "appointments",
            Collection::AuditLog => "audit_log",
        }
    }
}

/// Unique secondary indexes: normalized key -> owning record id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UniqueIndex {
    UserEmail,
    PatientContact,
    PatientId,
}

impl UniqueIndex {
    pub const ALL: [UniqueIndex; 3] = [
        UniqueIndex::UserEmail,
        UniqueIndex::PatientContact,
        UniqueIndex::PatientId,
    ];

    pub fn tree_name(&self) -> &'static str {
        match self {
            UniqueIndex::UserEmail => "idx_user_email",
            UniqueIndex::PatientContact => "idx_patient_contact",
            UniqueIndex::PatientId => "idx_patient_id",
        }
    }
}

#[async_trait]
pub trait StorageEngine: Send + Sync + Debug + 'static {
    async fn connect(&self) -> ClinicResult<()>;
    async fn insert(&self, collection: Collection, key: &[u8], value: Vec<u8>) -> ClinicResult<()>;
    async fn retrieve(&self, collection: Collection, key: &[u8]) -> ClinicResult<Option<Vec<u8>>>;
    /// Returns true when the key existed.
    async fn delete(&self, collection: Collection, key: &[u8]) -> ClinicResult<bool>;
    /// Every entry of the collection in key order.
    async fn scan(&self, collection: Collection) -> ClinicResult<Vec<(Vec<u8>, Vec<u8>)>>;
    async fn flush(&self) -> ClinicResult<()>;
    fn get_type(&self) -> &'static str;

    /// Atomically binds `key` to `owner`. Returns false if the key is already
    /// bound, to anyone (including `owner`).
    async fn claim_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool>;
    async fn lookup_unique(&self, index: UniqueIndex, key: &str) -> ClinicResult<Option<Vec<u8>>>;
    /// Unbinds `key` only if it is still bound to `owner`.
    async fn release_unique(&self, index: UniqueIndex, key: &str, owner: &[u8]) -> ClinicResult<bool>;

    /// Monotonic per-name counter starting at 1.
    async fn next_sequence(&self, name: &str) -> ClinicResult<u64>;
}

pub(crate) fn decode_counter(bytes: &[u8]) -> u64 {
    <[u8; 8]>::try_from(bytes).map(u64::from_be_bytes).unwrap_or(0)
}
