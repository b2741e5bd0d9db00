// lib/src/database.rs
use std::sync::Arc;

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};

use models::errors::{ClinicError, ClinicResult};
use models::identifiers::RecordId;
use models::medical::{normalize_contact, normalize_email, Appointment, Patient, User};

use crate::config::{StorageConfig, StorageEngineType};
use crate::storage_engine::{Collection, InMemoryStorage, StorageEngine, UniqueIndex};
#[cfg(feature = "with-sled")]
use crate::storage_engine::SledStorage;

pub const USER_EXISTS_MESSAGE: &str = "User already exists with this email.";
pub const CONTACT_TAKEN_MESSAGE: &str = "A patient with this contact number already exists.";
pub const DUPLICATE_PATIENT_MESSAGE: &str = "A duplicate patient record was detected.";

/// Typed document access over a `StorageEngine`. Documents are stored as JSON
/// keyed by their `RecordId` bytes.
#[derive(Clone, Debug)]
pub struct Database {
    pub storage: Arc<dyn StorageEngine>,
    pub config: StorageConfig,
    write_lock: Arc<TokioMutex<()>>,
}

impl Database {
    pub async fn new(config: StorageConfig) -> ClinicResult<Self> {
        let storage: Arc<dyn StorageEngine> = match config.engine {
            StorageEngineType::InMemory => Arc::new(InMemoryStorage::new()),
            StorageEngineType::Sled => {
                #[cfg(feature = "with-sled")]
                {
                    Arc::new(SledStorage::new(&config)?)
                }
                #[cfg(not(feature = "with-sled"))]
                return Err(ClinicError::ConfigurationError("Sled feature not enabled".to_string()));
            }
        };
        storage.connect().await?;
        info!("Storage engine '{}' ready", storage.get_type());
        Ok(Self::from_storage(storage, config))
    }

    pub fn from_storage(storage: Arc<dyn StorageEngine>, config: StorageConfig) -> Self {
        Database {
            storage,
            config,
            write_lock: Arc::new(TokioMutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_storage(Arc::new(InMemoryStorage::new()), StorageConfig::in_memory())
    }

    pub fn engine_type(&self) -> &'static str {
        self.storage.get_type()
    }

    /// Serializes read-modify-write sequences spanning several documents.
    pub async fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn flush(&self) -> ClinicResult<()> {
        self.storage.flush().await
    }

    pub async fn next_sequence(&self, name: &str) -> ClinicResult<u64> {
        self.storage.next_sequence(name).await
    }

    async fn put_document<T: Serialize + Sync>(
        &self,
        collection: Collection,
        id: &RecordId,
        document: &T,
    ) -> ClinicResult<()> {
        let bytes = serde_json::to_vec(document)?;
        self.storage.insert(collection, id.as_bytes(), bytes).await
    }

    async fn get_document<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> ClinicResult<Option<T>> {
        match self.storage.retrieve(collection, id.as_bytes()).await? {
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                ClinicError::DeserializationError(format!(
                    "{} record {} is unreadable: {}",
                    collection.tree_name(),
                    id,
                    e
                ))
            }),
            None => Ok(None),
        }
    }

    async fn list_documents<T: DeserializeOwned>(&self, collection: Collection) -> ClinicResult<Vec<T>> {
        let entries = self.storage.scan(collection).await?;
        let mut documents = Vec::with_capacity(entries.len());
        for (key, bytes) in entries {
            match serde_json::from_slice(&bytes) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(
                    "Skipping unreadable {} record {:?}: {}",
                    collection.tree_name(),
                    RecordId::from_bytes(&key).map(|id| id.to_string()).unwrap_or_default(),
                    e
                ),
            }
        }
        Ok(documents)
    }

    async fn resolve_unique(&self, index: UniqueIndex, key: &str) -> ClinicResult<Option<RecordId>> {
        match self.storage.lookup_unique(index, key).await? {
            Some(owner) => Ok(Some(RecordId::from_bytes(&owner)?)),
            None => Ok(None),
        }
    }

    // ---- users ----

    pub async fn create_user(&self, user: &User) -> ClinicResult<()> {
        let email = normalize_email(&user.email);
        if !self.storage.claim_unique(UniqueIndex::UserEmail, &email, user.id.as_bytes()).await? {
            return Err(ClinicError::AlreadyExists(USER_EXISTS_MESSAGE.to_string()));
        }
        if let Err(e) = self.put_document(Collection::Users, &user.id, user).await {
            self.storage.release_unique(UniqueIndex::UserEmail, &email, user.id.as_bytes()).await?;
            return Err(e);
        }
        Ok(())
    }

    pub async fn get_user(&self, id: &RecordId) -> ClinicResult<Option<User>> {
        self.get_document(Collection::Users, id).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> ClinicResult<Option<User>> {
        match self.resolve_unique(UniqueIndex::UserEmail, &normalize_email(email)).await? {
            Some(id) => self.get_user(&id).await,
            None => Ok(None),
        }
    }

    /// Updates an existing user. The email is immutable.
    pub async fn save_user(&self, user: &User) -> ClinicResult<()> {
        self.put_document(Collection::Users, &user.id, user).await
    }

    // ---- patients ----

    /// Inserts a patient after claiming its contact and patientId.
    pub async fn create_patient(&self, patient: &Patient) -> ClinicResult<()> {
        let owner = patient.id.as_bytes();
        let contact = normalize_contact(&patient.contact);
        if !self.storage.claim_unique(UniqueIndex::PatientContact, &contact, owner).await? {
            return Err(ClinicError::Conflict(CONTACT_TAKEN_MESSAGE.to_string()));
        }
        if !self
            .storage
            .claim_unique(UniqueIndex::PatientId, patient.patient_id.as_str(), owner)
            .await?
        {
            self.storage.release_unique(UniqueIndex::PatientContact, &contact, owner).await?;
            return Err(ClinicError::Conflict(DUPLICATE_PATIENT_MESSAGE.to_string()));
        }
        if let Err(e) = self.put_document(Collection::Patients, &patient.id, patient).await {
            self.storage.release_unique(UniqueIndex::PatientContact, &contact, owner).await?;
            self.storage
                .release_unique(UniqueIndex::PatientId, patient.patient_id.as_str(), owner)
                .await?;
            return Err(e);
        }
        Ok(())
    }

    pub async fn get_patient(&self, id: &RecordId) -> ClinicResult<Option<Patient>> {
        self.get_document(Collection::Patients, id).await
    }

    pub async fn find_patient_by_patient_id(&self, patient_id: &str) -> ClinicResult<Option<Patient>> {
        match self.resolve_unique(UniqueIndex::PatientId, patient_id.trim()).await? {
            Some(id) => self.get_patient(&id).await,
            None => Ok(None),
        }
    }

    pub async fn find_patient_by_contact(&self, contact: &str) -> ClinicResult<Option<Patient>> {
        match self.resolve_unique(UniqueIndex::PatientContact, &normalize_contact(contact)).await? {
            Some(id) => self.get_patient(&id).await,
            None => Ok(None),
        }
    }

    pub async fn list_patients(&self) -> ClinicResult<Vec<Patient>> {
        self.list_documents(Collection::Patients).await
    }

    /// Updates an existing patient. Contact and patientId are immutable.
    pub async fn save_patient(&self, patient: &Patient) -> ClinicResult<()> {
        self.put_document(Collection::Patients, &patient.id, patient).await
    }

    // ---- appointments ----

    pub async fn save_appointment(&self, appointment: &Appointment) -> ClinicResult<()> {
        self.put_document(Collection::Appointments, &appointment.id, appointment).await
    }

    pub async fn get_appointment(&self, id: &RecordId) -> ClinicResult<Option<Appointment>> {
        self.get_document(Collection::Appointments, id).await
    }

    pub async fn list_appointments(&self) -> ClinicResult<Vec<Appointment>> {
        self.list_documents(Collection::Appointments).await
    }

    pub async fn delete_appointment(&self, id: &RecordId) -> ClinicResult<bool> {
        self.storage.delete(Collection::Appointments, id.as_bytes()).await
    }

    // ---- audit ----

    /// Audit keys must sort chronologically.
    pub async fn append_audit_entry<T: Serialize + Sync>(&self, key: Vec<u8>, entry: &T) -> ClinicResult<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.storage.insert(Collection::AuditLog, &key, bytes).await
    }

    /// Oldest first.
    pub async fn audit_entries<T: DeserializeOwned>(&self) -> ClinicResult<Vec<T>> {
        self.list_documents(Collection::AuditLog).await
    }
}
