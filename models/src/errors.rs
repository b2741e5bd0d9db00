use std::io;
pub use thiserror::Error;
use uuid::Error as UuidError;
use anyhow::Error as AnyhowError;
use serde_json::Error as SerdeJsonError;
use serde::{Serialize, Deserialize};
use tokio::task::JoinError;

#[derive(Debug, Serialize, Deserialize, Error, Clone)]
pub enum ClinicError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Entity already exists: {0}")]
    AlreadyExists(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(ValidationError),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Permission denied: {0}")]
    Forbidden(String),
    #[error("Mail delivery error: {0}")]
    MailError(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("No image file uploaded")]
    MissingUpload,
    #[error("Prediction error: {message}")]
    PredictionError { message: String, details: Option<String> },
    #[error("UUID parsing or generation error: {0}")]
    Uuid(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
    #[cfg(feature = "sled-errors")]
    #[error("Sled error: {0}")]
    Sled(String),
}

impl ClinicError {
    pub fn prediction(message: impl Into<String>, details: Option<String>) -> Self {
        ClinicError::PredictionError { message: message.into(), details }
    }

    /// Message that is safe to hand back to an API caller.
    pub fn public_message(&self) -> String {
        match self {
            ClinicError::InvalidRequest(msg)
            | ClinicError::AlreadyExists(msg)
            | ClinicError::Conflict(msg)
            | ClinicError::NotFound(msg)
            | ClinicError::Auth(msg)
            | ClinicError::Forbidden(msg)
            | ClinicError::PayloadTooLarge(msg) => msg.clone(),
            ClinicError::Validation(v) => v.to_string(),
            ClinicError::MissingUpload => self.to_string(),
            ClinicError::PredictionError { message, .. } => message.clone(),
            _ => "Server error".to_string(),
        }
    }
}

impl From<&str> for ClinicError {
    fn from(error: &str) -> Self {
        ClinicError::InvalidRequest(error.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClinicError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ClinicError::TimeoutError("operation timed out".into())
    }
}

impl From<SerdeJsonError> for ClinicError {
    fn from(err: SerdeJsonError) -> Self {
        ClinicError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<AnyhowError> for ClinicError {
    fn from(err: AnyhowError) -> Self {
        ClinicError::InternalError(format!("{:#}", err))
    }
}

impl From<JoinError> for ClinicError {
    fn from(err: JoinError) -> Self {
        ClinicError::InternalError(format!("Task failed to join: {}", err))
    }
}

impl From<io::Error> for ClinicError {
    fn from(err: io::Error) -> Self {
        ClinicError::Io(format!("IO error: {}", err))
    }
}

impl From<UuidError> for ClinicError {
    fn from(err: UuidError) -> Self {
        ClinicError::Uuid(format!("UUID error: {}", err))
    }
}

impl From<ValidationError> for ClinicError {
    fn from(err: ValidationError) -> Self {
        ClinicError::Validation(err)
    }
}

#[cfg(feature = "sled-errors")]
impl From<sled::Error> for ClinicError {
    fn from(err: sled::Error) -> Self {
        ClinicError::Sled(format!("Sled error: {}", err))
    }
}

#[derive(Debug, Serialize, Deserialize, Error, PartialEq, Clone)]
pub enum ValidationError {
    #[error("{0} is required.")]
    RequiredField(String),
    #[error("identifier '{0}' is invalid")]
    InvalidIdentifier(String),
    #[error("identifier has invalid length")]
    InvalidIdentifierLength,
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("'{value}' is not a valid {field}")]
    InvalidEnumValue { field: String, value: String },
    #[error("{0} cannot be in the future")]
    FutureDate(String),
    #[error("cannot change status from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },
}

/// A type alias for a `Result` that returns a `ClinicError` on failure.
pub type ClinicResult<T> = Result<T, ClinicError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = ClinicError::StorageError("tree 'patients' is corrupt".into());
        assert_eq!(err.public_message(), "Server error");
    }

    #[test]
    fn caller_errors_keep_their_message() {
        let err = ClinicError::NotFound("Patient not found.".into());
        assert_eq!(err.public_message(), "Patient not found.");
        let err: ClinicError = ValidationError::RequiredField("Gender".into()).into();
        assert_eq!(err.public_message(), "Gender is required.");
    }
}
