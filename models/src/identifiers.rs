use core::ops::Deref;
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

/// Storage key of a document. Serialized as the hyphenated UUID string.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> ValidationResult<Self> {
        Uuid::from_slice(bytes)
            .map(RecordId)
            .map_err(|_| ValidationError::InvalidIdentifierLength)
    }

    /// Parses a path or body parameter; `what` names the entity in the error.
    pub fn parse(value: &str, what: &str) -> ValidationResult<Self> {
        Uuid::parse_str(value.trim())
            .map(RecordId)
            .map_err(|_| ValidationError::InvalidIdentifier(format!("{} {}", what, value)))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordId::parse(s, "record")
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        RecordId(uuid)
    }
}

pub const PATIENT_ID_MAX_LEN: usize = 64;

/// Human-readable patient number printed on cards and reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PatientId(String);

impl PatientId {
    pub fn new(value: &str) -> ValidationResult<Self> {
        let value = value.trim();
        if value.is_empty() || value.len() > PATIENT_ID_MAX_LEN {
            return Err(ValidationError::InvalidIdentifierLength);
        }
        if value.chars().any(|c| c.is_control() || c == '/') {
            return Err(ValidationError::InvalidIdentifier(value.to_string()));
        }
        Ok(PatientId(value.to_string()))
    }

    /// `{sequence:06}-{YYYYMMDD}`; the date part is the date of birth.
    pub fn generate(sequence: u64, dob: &DateTime<Utc>) -> Self {
        PatientId(format!("{:06}-{}", sequence % 1_000_000, dob.format("%Y%m%d")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PatientId::new(&raw).map_err(serde::de::Error::custom)
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for PatientId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for PatientId {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::new(s)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
