// medical_knowledge/src/patient/patient_service.rs
//! Patient lookups: by patientId, visit history, and front-desk search.

use log::debug;
use regex::RegexBuilder;

use lib::database::Database;
use models::errors::{ClinicError, ClinicResult};
use models::medical::{Appointment, Patient, PatientSummary};

pub const SEARCH_LIMIT: usize = 10;
pub const PATIENT_NOT_FOUND_MESSAGE: &str = "Patient not found.";

#[derive(Clone, Debug)]
pub struct PatientService {
    db: Database,
}

impl PatientService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get_patient(&self, patient_id: &str) -> ClinicResult<Patient> {
        self.db
            .find_patient_by_patient_id(patient_id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(PATIENT_NOT_FOUND_MESSAGE.to_string()))
    }

    /// Every appointment recorded under `patient_id`, archived ones included,
    /// newest appointment date first. Unknown ids yield an empty history.
    pub async fn patient_history(&self, patient_id: &str) -> ClinicResult<Vec<Appointment>> {
        let patient_id = patient_id.trim();
        let mut history: Vec<Appointment> = self
            .db
            .list_appointments()
            .await?
            .into_iter()
            .filter(|a| a.patient_id.as_str() == patient_id)
            .collect();
        history.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
        Ok(history)
    }

    /// Case-insensitive substring match on name or contact. The query is
    /// matched literally.
    pub async fn search_patients(&self, query: &str) -> ClinicResult<Vec<PatientSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .map_err(|e| ClinicError::InternalError(format!("search pattern: {}", e)))?;

        let mut patients = self.db.list_patients().await?;
        patients.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let matches: Vec<PatientSummary> = patients
            .iter()
            .filter(|p| pattern.is_match(&p.patient_name) || pattern.is_match(&p.contact))
            .take(SEARCH_LIMIT)
            .map(Patient::summary)
            .collect();
        debug!("Patient search matched {} record(s)", matches.len());
        Ok(matches)
    }

    /// All patients, most recently registered first.
    pub async fn list_patients(&self) -> ClinicResult<Vec<Patient>> {
        let mut patients = self.db.list_patients().await?;
        patients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(patients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use models::identifiers::PatientId;
    use models::medical::{Gender, NewPatient, VisitDetails};

    async fn seed(db: &Database, n: u32, name: &str, contact: &str) -> Patient {
        let mut patient = Patient::new(NewPatient {
            patient_id: PatientId::new(&format!("{:06}-19800101", n)).unwrap(),
            patient_name: name.into(),
            contact: contact.into(),
            dob: Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0).unwrap(),
            gender: Gender::Other,
        });
        patient.created_at = Utc::now() + Duration::seconds(n as i64);
        db.create_patient(&patient).await.unwrap();
        patient
    }

    #[tokio::test]
    async fn blank_query_returns_nothing() {
        let db = Database::in_memory();
        seed(&db, 1, "Ravi Kumar", "9000000001").await;
        let service = PatientService::new(db);
        assert!(service.search_patients("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_matches_name_or_contact_case_insensitively() {
        let db = Database::in_memory();
        seed(&db, 1, "Ravi Kumar", "9000000001").await;
        seed(&db, 2, "Priya Nair", "9000000002").await;
        let service = PatientService::new(db);

        let by_name = service.search_patients("kUmAr").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].patient_name, "Ravi Kumar");

        let by_contact = service.search_patients("0000000").await.unwrap();
        assert_eq!(by_contact.len(), 2);
    }

    #[tokio::test]
    async fn search_input_is_literal() {
        let db = Database::in_memory();
        seed(&db, 1, "Ravi Kumar", "9000000001").await;
        seed(&db, 2, "A.B. Shah", "(555) 123").await;
        let service = PatientService::new(db);
        assert!(service.search_patients(".*").await.unwrap().is_empty());
        assert_eq!(service.search_patients("(555)").await.unwrap().len(), 1);
        assert_eq!(service.search_patients("A.B.").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_is_capped() {
        let db = Database::in_memory();
        for n in 0..15 {
            seed(&db, n, &format!("Patient {}", n), &format!("555-01{:02}", n)).await;
        }
        let service = PatientService::new(db);
        let found = service.search_patients("patient").await.unwrap();
        assert_eq!(found.len(), SEARCH_LIMIT);
        assert_eq!(found[0].patient_name, "Patient 0");
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let service = PatientService::new(Database::in_memory());
        let err = service.get_patient("nope").await.unwrap_err();
        assert_eq!(err.public_message(), PATIENT_NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let db = Database::in_memory();
        let patient = seed(&db, 1, "Ravi Kumar", "9000000001").await;
        for day in [3, 10, 7] {
            let appointment = Appointment::new(
                &patient,
                VisitDetails {
                    appointment_date: Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap(),
                    sugar_level: "140".into(),
                    bp: "120/80".into(),
                    reason: "Screening".into(),
                },
            );
            db.save_appointment(&appointment).await.unwrap();
        }
        let service = PatientService::new(db);
        let days: Vec<u32> = service
            .patient_history(patient.patient_id.as_str())
            .await
            .unwrap()
            .iter()
            .map(|a| chrono::Datelike::day(&a.appointment_date))
            .collect();
        assert_eq!(days, vec![10, 7, 3]);
        assert!(service.patient_history("other").await.unwrap().is_empty());
    }
}
