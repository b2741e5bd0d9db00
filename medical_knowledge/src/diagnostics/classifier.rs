// medical_knowledge/src/diagnostics/classifier.rs
//! Bridge to the external fundus-image classifier.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use lib::config::PredictorConfig;
use models::errors::{ClinicError, ClinicResult};
use models::medical::{Prediction, PredictorOutput};

pub const SCRIPT_NOT_FOUND_MESSAGE: &str = "Server configuration error: Python script not found.";
pub const SCRIPT_FAILED_MESSAGE: &str = "Prediction script failed.";
pub const UNPARSABLE_OUTPUT_MESSAGE: &str = "Failed to parse prediction output.";

#[async_trait]
pub trait ImageClassifier: Send + Sync + Debug + 'static {
    async fn classify(&self, image: &Path) -> ClinicResult<Prediction>;
}

/// Runs `<python> <script> <image>` once per image. The script prints one
/// JSON object on its last stdout line.
#[derive(Clone, Debug)]
pub struct PythonClassifier {
    python: String,
    script_path: PathBuf,
    timeout: Duration,
}

impl PythonClassifier {
    pub fn new(python: impl Into<String>, script_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            python: python.into(),
            script_path: script_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &PredictorConfig) -> Self {
        Self::new(
            config.python.clone(),
            config.script_path.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl ImageClassifier for PythonClassifier {
    async fn classify(&self, image: &Path) -> ClinicResult<Prediction> {
        if !tokio::fs::try_exists(&self.script_path).await.unwrap_or(false) {
            warn!("Predictor script {} does not exist", self.script_path.display());
            return Err(ClinicError::prediction(SCRIPT_NOT_FOUND_MESSAGE, None));
        }

        let mut command = TokioCommand::new(&self.python);
        command
            .arg(&self.script_path)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running predictor {} {} on {}", self.python, self.script_path.display(), image.display());
        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Failed to start predictor {}: {}", self.python, e);
                return Err(ClinicError::prediction(SCRIPT_FAILED_MESSAGE, Some(e.to_string())));
            }
            Err(_) => {
                warn!("Predictor timed out after {:?}; child killed", self.timeout);
                return Err(ClinicError::prediction(
                    SCRIPT_FAILED_MESSAGE,
                    Some(format!("timed out after {} ms", self.timeout.as_millis())),
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Predictor exited with {}: {}", output.status, stderr);
            return Err(ClinicError::prediction(SCRIPT_FAILED_MESSAGE, Some(stderr)));
        }

        match PredictorOutput::parse(&stdout) {
            Ok(PredictorOutput::Success(prediction)) => Ok(prediction),
            Ok(PredictorOutput::Failure { error }) => Err(ClinicError::prediction(error, None)),
            Err(e) => {
                warn!("Unparsable predictor output: {}", e);
                Err(ClinicError::prediction(UNPARSABLE_OUTPUT_MESSAGE, Some(stdout.trim().to_string())))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn classifier_for(dir: &Path, body: &str, timeout: Duration) -> PythonClassifier {
        let script = dir.join("predict.sh");
        fs::write(&script, body).unwrap();
        PythonClassifier::new("sh", script, timeout)
    }

    fn details(err: ClinicError) -> (String, Option<String>) {
        match err {
            ClinicError::PredictionError { message, details } => (message, details),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn success_passes_the_image_path() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = classifier_for(
            dir.path(),
            "echo 'loading model'\necho \"{\\\"stage\\\":\\\"Mild\\\",\\\"probability\\\":0.61,\\\"image\\\":\\\"$1\\\"}\"\n",
            Duration::from_secs(10),
        );
        let image = dir.path().join("eye.png");
        let prediction = classifier.classify(&image).await.unwrap();
        assert_eq!(prediction.stage, "Mild");
        assert_eq!(prediction.extra["image"], image.display().to_string());
    }

    #[tokio::test]
    async fn reported_error_becomes_the_message() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = classifier_for(dir.path(), "echo '{\"error\":\"cannot read image\"}'\n", Duration::from_secs(10));
        let (message, details) = details(classifier.classify(Path::new("x.png")).await.unwrap_err());
        assert_eq!(message, "cannot read image");
        assert!(details.is_none());
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = classifier_for(dir.path(), "echo 'model missing' >&2\nexit 3\n", Duration::from_secs(10));
        let (message, details) = details(classifier.classify(Path::new("x.png")).await.unwrap_err());
        assert_eq!(message, SCRIPT_FAILED_MESSAGE);
        assert_eq!(details.as_deref(), Some("model missing"));
    }

    #[tokio::test]
    async fn garbage_output_is_reported_raw() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = classifier_for(dir.path(), "echo 'stage: severe'\n", Duration::from_secs(10));
        let (message, details) = details(classifier.classify(Path::new("x.png")).await.unwrap_err());
        assert_eq!(message, UNPARSABLE_OUTPUT_MESSAGE);
        assert_eq!(details.as_deref(), Some("stage: severe"));
    }

    #[tokio::test]
    async fn slow_script_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = classifier_for(dir.path(), "sleep 5\n", Duration::from_millis(200));
        let started = std::time::Instant::now();
        let (message, _) = details(classifier.classify(Path::new("x.png")).await.unwrap_err());
        assert_eq!(message, SCRIPT_FAILED_MESSAGE);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn missing_script_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = PythonClassifier::new("sh", dir.path().join("absent.py"), Duration::from_secs(1));
        let (message, _) = details(classifier.classify(Path::new("x.png")).await.unwrap_err());
        assert_eq!(message, SCRIPT_NOT_FOUND_MESSAGE);
    }
}
