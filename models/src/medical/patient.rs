// models/src/medical/patient.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::{PatientId, RecordId};

/// Shown until a doctor records the first graded diagnosis.
pub const UNKNOWN_DISEASE_STAGE: &str = "N/A";

fn unknown_disease_stage() -> String {
    UNKNOWN_DISEASE_STAGE.to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl FromStr for Gender {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(ValidationError::InvalidEnumValue {
                field: "gender".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub patient_id: PatientId,
    pub patient_name: String,
    pub contact: String,
    pub dob: DateTime<Utc>,
    pub gender: Gender,
    // Appointment ids, in booking order.
    #[serde(default)]
    pub appointments: Vec<RecordId>,
    #[serde(default = "unknown_disease_stage")]
    pub latest_disease_stage: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for a first-time patient.
#[derive(Clone, Debug)]
pub struct NewPatient {
    pub patient_id: PatientId,
    pub patient_name: String,
    pub contact: String,
    pub dob: DateTime<Utc>,
    pub gender: Gender,
}

impl Patient {
    pub fn new(new_patient: NewPatient) -> Self {
        let now = Utc::now();
        Patient {
            id: RecordId::new(),
            patient_id: new_patient.patient_id,
            patient_name: new_patient.patient_name.trim().to_string(),
            contact: normalize_contact(&new_patient.contact),
            dob: new_patient.dob,
            gender: new_patient.gender,
            appointments: Vec::new(),
            latest_disease_stage: unknown_disease_stage(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_appointment(&mut self, appointment_id: RecordId) {
        if !self.appointments.contains(&appointment_id) {
            self.appointments.push(appointment_id);
        }
        self.updated_at = Utc::now();
    }

    /// Returns true when the reference was present.
    pub fn remove_appointment(&mut self, appointment_id: &RecordId) -> bool {
        let before = self.appointments.len();
        self.appointments.retain(|id| id != appointment_id);
        let removed = self.appointments.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn set_latest_disease_stage(&mut self, stage: Option<&str>) -> bool {
        let next = stage
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(unknown_disease_stage);
        if next == self.latest_disease_stage {
            return false;
        }
        self.latest_disease_stage = next;
        self.updated_at = Utc::now();
        true
    }

    pub fn summary(&self) -> PatientSummary {
        PatientSummary {
            id: self.id,
            patient_id: self.patient_id.clone(),
            patient_name: self.patient_name.clone(),
            contact: self.contact.clone(),
            dob: self.dob,
            gender: self.gender,
        }
    }
}

/// Projection returned by patient search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub patient_id: PatientId,
    pub patient_name: String,
    pub contact: String,
    pub dob: DateTime<Utc>,
    pub gender: Gender,
}

/// Contacts are compared as entered, minus surrounding whitespace.
pub fn normalize_contact(contact: &str) -> String {
    contact.trim().to_string()
}

pub fn validate_dob(dob: &DateTime<Utc>) -> ValidationResult<()> {
    if *dob > Utc::now() {
        return Err(ValidationError::FutureDate("Date of birth".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Patient {
        Patient::new(NewPatient {
            patient_id: PatientId::new("000001-19700101").unwrap(),
            patient_name: "  Meera Iyer ".into(),
            contact: " 9876543210 ".into(),
            dob: Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            gender: Gender::Female,
        })
    }

    #[test]
    fn new_patient_is_trimmed_and_unstaged() {
        let p = sample();
        assert_eq!(p.patient_name, "Meera Iyer");
        assert_eq!(p.contact, "9876543210");
        assert_eq!(p.latest_disease_stage, UNKNOWN_DISEASE_STAGE);
        assert!(p.appointments.is_empty());
    }

    #[test]
    fn appointment_references_are_not_duplicated() {
        let mut p = sample();
        let id = RecordId::new();
        p.add_appointment(id);
        p.add_appointment(id);
        assert_eq!(p.appointments, vec![id]);
        assert!(p.remove_appointment(&id));
        assert!(!p.remove_appointment(&id));
    }

    #[test]
    fn blank_stage_resets_to_unknown() {
        let mut p = sample();
        assert!(p.set_latest_disease_stage(Some("Moderate")));
        assert!(!p.set_latest_disease_stage(Some("Moderate")));
        assert!(p.set_latest_disease_stage(Some("  ")));
        assert_eq!(p.latest_disease_stage, UNKNOWN_DISEASE_STAGE);
    }

    #[test]
    fn serializes_with_mongo_style_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("_id").is_some());
        assert_eq!(json["patientId"], "000001-19700101");
        assert_eq!(json["gender"], "Female");
        assert_eq!(json["latestDiseaseStage"], "N/A");
    }

    #[test]
    fn gender_parsing() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert!("unknown".parse::<Gender>().is_err());
    }

    #[test]
    fn future_dob_is_rejected() {
        let tomorrow = Utc::now() + chrono::Duration::days(1);
        assert!(validate_dob(&tomorrow).is_err());
    }
}
