// medical_knowledge/src/diagnostics/upload_store.rs
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tokio::fs;
use uuid::Uuid;

use lib::config::PredictorConfig;
use models::errors::{ClinicError, ClinicResult};

const DEFAULT_EXTENSION: &str = "img";
const MAX_EXTENSION_LEN: usize = 8;

/// Scratch directory for images waiting on the classifier.
#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

/// An uploaded file on disk. Removed when dropped.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {}: {}", self.path.display(), e),
        }
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self { dir: dir.into(), max_bytes }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Writes `bytes` under a generated name. The client's file name only
    /// contributes its extension.
    pub async fn save(&self, bytes: &[u8], original_name: Option<&str>) -> ClinicResult<StoredUpload> {
        if bytes.is_empty() {
            return Err(ClinicError::MissingUpload);
        }
        if bytes.len() as u64 > self.max_bytes {
            return Err(ClinicError::PayloadTooLarge(format!(
                "Image exceeds the {} byte upload limit.",
                self.max_bytes
            )));
        }
        fs::create_dir_all(&self.dir).await?;
        let file_name = format!("{}.{}", Uuid::new_v4(), extension_of(original_name));
        let upload = StoredUpload { path: self.dir.join(file_name) };
        fs::write(&upload.path, bytes).await?;
        debug!("Stored {} byte upload at {}", bytes.len(), upload.path.display());
        Ok(upload)
    }
}

fn extension_of(original_name: Option<&str>) -> String {
    original_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
