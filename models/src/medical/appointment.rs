// models/src/medical/appointment.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::{PatientId, RecordId};
use crate::medical::{non_blank, Patient};
use crate::timestamp::{parse_optional_datetime, string_or_number};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
}

impl AppointmentStatus {
    /// Completed is terminal.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        !(self == AppointmentStatus::Completed && next == AppointmentStatus::Scheduled)
    }
}

impl FromStr for AppointmentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            // Older clients sent "Complete".
            "completed" | "complete" => Ok(AppointmentStatus::Completed),
            other => Err(ValidationError::InvalidEnumValue {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => f.write_str("Scheduled"),
            AppointmentStatus::Completed => f.write_str("Completed"),
        }
    }
}

/// A visit. `P` is the patient reference: the stored form holds the patient's
/// record id, list endpoints substitute the patient document itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment<P = RecordId> {
    #[serde(rename = "_id")]
    pub id: RecordId,
    pub patient: P,
    pub patient_id: PatientId,
    #[serde(default)]
    pub is_archived: bool,
    pub appointment_date: DateTime<Utc>,
    pub sugar_level: String,
    pub bp: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease_probability: Option<String>,
    #[serde(default)]
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type PopulatedAppointment = Appointment<Option<Patient>>;

/// Validated vitals and visit details captured at the front desk.
#[derive(Clone, Debug)]
pub struct VisitDetails {
    pub appointment_date: DateTime<Utc>,
    pub sugar_level: String,
    pub bp: String,
    pub reason: String,
}

impl Appointment {
    pub fn new(patient: &Patient, details: VisitDetails) -> Self {
        let now = Utc::now();
        Appointment {
            id: RecordId::new(),
            patient: patient.id,
            patient_id: patient.patient_id.clone(),
            is_archived: false,
            appointment_date: details.appointment_date,
            sugar_level: details.sugar_level.trim().to_string(),
            bp: details.bp.trim().to_string(),
            reason: details.reason.trim().to_string(),
            diagnosis_notes: None,
            disease_stage: None,
            disease_probability: None,
            status: AppointmentStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn populate(self, patient: Option<Patient>) -> PopulatedAppointment {
        Appointment {
            id: self.id,
            patient,
            patient_id: self.patient_id,
            is_archived: self.is_archived,
            appointment_date: self.appointment_date,
            sugar_level: self.sugar_level,
            bp: self.bp,
            reason: self.reason,
            diagnosis_notes: self.diagnosis_notes,
            disease_stage: self.disease_stage,
            disease_probability: self.disease_probability,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl<P> Appointment<P> {
    pub fn transition_to(&mut self, next: AppointmentStatus) -> ValidationResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ValidationError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Returns false when the appointment was already archived.
    pub fn archive(&mut self) -> bool {
        if self.is_archived {
            return false;
        }
        self.is_archived = true;
        self.updated_at = Utc::now();
        true
    }

    pub fn apply_diagnosis(&mut self, update: &DiagnosisUpdate) -> ValidationResult<()> {
        let stage = non_blank(&update.disease_stage)
            .ok_or_else(|| ValidationError::RequiredField("diseaseStage".to_string()))?;
        let status = match non_blank(&update.status) {
            Some(raw) => raw.parse()?,
            None => AppointmentStatus::Completed,
        };
        self.transition_to(status)?;
        self.disease_stage = Some(stage.to_string());
        self.disease_probability = non_blank(&update.disease_probability).map(str::to_string);
        if let Some(notes) = non_blank(&update.diagnosis_notes) {
            self.diagnosis_notes = Some(notes.to_string());
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Absent fields are left as they are.
    pub fn apply_update(&mut self, update: &AppointmentUpdate) -> ValidationResult<()> {
        let appointment_date = parse_optional_datetime(update.appointment_date.as_deref())?;
        let status = non_blank(&update.status).map(str::parse::<AppointmentStatus>).transpose()?;
        if let Some(status) = status {
            self.transition_to(status)?;
        }
        if let Some(date) = appointment_date {
            self.appointment_date = date;
        }
        if let Some(reason) = non_blank(&update.reason) {
            self.reason = reason.to_string();
        }
        if let Some(sugar) = non_blank(&update.sugar_level) {
            self.sugar_level = sugar.to_string();
        }
        if let Some(bp) = non_blank(&update.bp) {
            self.bp = bp.to_string();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == AppointmentStatus::Completed
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub patient_mongo_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub contact: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub appointment_date: Option<String>,
    pub sugar_level: Option<String>,
    pub bp: Option<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub message: String,
    pub patient_id: PatientId,
}

/// Body of the doctor's "save diagnosis" call.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisUpdate {
    pub disease_stage: Option<String>,
    #[serde(default, deserialize_with = "string_or_number::deserialize")]
    pub disease_probability: Option<String>,
    pub diagnosis_notes: Option<String>,
    pub status: Option<String>,
}

/// Body of the front-desk edit call.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentUpdate {
    pub appointment_date: Option<String>,
    pub reason: Option<String>,
    pub sugar_level: Option<String>,
    pub bp: Option<String>,
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medical::{Gender, NewPatient};
    use chrono::TimeZone;

    fn patient() -> Patient {
        Patient::new(NewPatient {
            patient_id: PatientId::new("000007-19611111").unwrap(),
            patient_name: "Tomas Ruiz".into(),
            contact: "555-0100".into(),
            dob: Utc.with_ymd_and_hms(1961, 11, 11, 0, 0, 0).unwrap(),
            gender: Gender::Male,
        })
    }

    fn appointment() -> Appointment {
        Appointment::new(
            &patient(),
            VisitDetails {
                appointment_date: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
                sugar_level: "180".into(),
                bp: "130/85".into(),
                reason: "Follow-up".into(),
            },
        )
    }

    #[test]
    fn new_appointment_is_scheduled_and_active() {
        let a = appointment();
        assert_eq!(a.status, AppointmentStatus::Scheduled);
        assert!(!a.is_archived);
        assert_eq!(a.patient_id.as_str(), "000007-19611111");
    }

    #[test]
    fn diagnosis_completes_the_visit() {
        let mut a = appointment();
        let update: DiagnosisUpdate =
            serde_json::from_str(r#"{"diseaseStage":"Mild","diseaseProbability":0.91}"#).unwrap();
        a.apply_diagnosis(&update).unwrap();
        assert_eq!(a.status, AppointmentStatus::Completed);
        assert_eq!(a.disease_stage.as_deref(), Some("Mild"));
        assert_eq!(a.disease_probability.as_deref(), Some("0.91"));
    }

    #[test]
    fn diagnosis_requires_a_stage() {
        let mut a = appointment();
        let err = a.apply_diagnosis(&DiagnosisUpdate::default()).unwrap_err();
        assert_eq!(err, ValidationError::RequiredField("diseaseStage".into()));
        assert_eq!(a.status, AppointmentStatus::Scheduled);
    }

    #[test]
    fn completed_cannot_go_back_to_scheduled() {
        let mut a = appointment();
        a.transition_to(AppointmentStatus::Completed).unwrap();
        let update = AppointmentUpdate {
            status: Some("Scheduled".into()),
            reason: Some("changed".into()),
            ..Default::default()
        };
        assert!(matches!(
            a.apply_update(&update),
            Err(ValidationError::InvalidStatusTransition { .. })
        ));
        assert_eq!(a.reason, "Follow-up");
    }

    #[test]
    fn update_leaves_absent_fields_alone() {
        let mut a = appointment();
        let update = AppointmentUpdate {
            bp: Some("120/80".into()),
            appointment_date: Some("2024-06-10T11:15".into()),
            ..Default::default()
        };
        a.apply_update(&update).unwrap();
        assert_eq!(a.bp, "120/80");
        assert_eq!(a.sugar_level, "180");
        assert_eq!(a.appointment_date, Utc.with_ymd_and_hms(2024, 6, 10, 11, 15, 0).unwrap());
    }

    #[test]
    fn archive_is_idempotent() {
        let mut a = appointment();
        assert!(a.archive());
        assert!(!a.archive());
        assert!(a.is_archived);
    }

    #[test]
    fn populated_form_embeds_the_patient() {
        let p = patient();
        let json = serde_json::to_value(appointment().populate(Some(p.clone()))).unwrap();
        assert_eq!(json["patient"]["patientName"], "Tomas Ruiz");
        assert_eq!(json["status"], "Scheduled");
        assert_eq!(json["isArchived"], false);
    }

    #[test]
    fn legacy_complete_status_is_accepted() {
        assert_eq!("Complete".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Completed);
    }
}
