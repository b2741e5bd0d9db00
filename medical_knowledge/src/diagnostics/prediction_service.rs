// medical_knowledge/src/diagnostics/prediction_service.rs
use std::sync::Arc;

use log::info;

use lib::config::PredictorConfig;
use models::errors::ClinicResult;
use models::medical::Prediction;

use super::classifier::{ImageClassifier, PythonClassifier};
use super::upload_store::UploadStore;

#[derive(Clone, Debug)]
pub struct PredictionService {
    uploads: UploadStore,
    classifier: Arc<dyn ImageClassifier>,
}

impl PredictionService {
    pub fn new(uploads: UploadStore, classifier: Arc<dyn ImageClassifier>) -> Self {
        Self { uploads, classifier }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(
            UploadStore::from_config(config),
            Arc::new(PythonClassifier::from_config(config)),
        )
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.uploads.max_bytes()
    }

    /// Stages the image, classifies it and removes it again whatever the outcome.
    pub async fn predict(&self, image: &[u8], file_name: Option<&str>) -> ClinicResult<Prediction> {
        let upload = self.uploads.save(image, file_name).await?;
        let prediction = self.classifier.classify(upload.path()).await?;
        info!("Classified upload as {}", prediction.stage);
        Ok(prediction)
    }
}
