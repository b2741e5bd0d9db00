// medical_knowledge/src/appointments/appointment_service.rs
//! Booking and the appointment lifecycle: diagnosis, edits, archive, delete.

use std::collections::HashMap;

use log::{debug, info};

use lib::database::Database;
use models::errors::{ClinicError, ClinicResult, ValidationError};
use models::identifiers::{PatientId, RecordId};
use models::medical::{
    missing_fields, non_blank, validate_dob, Appointment, AppointmentUpdate, BookAppointmentRequest,
    BookingConfirmation, DiagnosisUpdate, Gender, NewPatient, Patient, PopulatedAppointment,
    VisitDetails,
};
use models::timestamp::parse_datetime;

pub const REQUIRED_FIELDS_MESSAGE: &str = "Please fill all required fields.";
pub const BOOKED_MESSAGE: &str = "Appointment booked successfully!";
pub const EXISTING_PATIENT_NOT_FOUND_MESSAGE: &str = "Existing patient not found.";
pub const INVALID_PATIENT_ID_MESSAGE: &str = "Invalid patient ID";
pub const INVALID_APPOINTMENT_ID_MESSAGE: &str = "Invalid Appointment ID";
pub const APPOINTMENT_NOT_FOUND_MESSAGE: &str = "Appointment not found";

const PATIENT_SEQUENCE: &str = "patient";
const MAX_GENERATED_ID_ATTEMPTS: usize = 5;

#[derive(Clone, Debug)]
pub struct AppointmentService {
    db: Database,
}

pub fn parse_appointment_id(raw: &str) -> ClinicResult<RecordId> {
    RecordId::parse(raw, "appointment")
        .map_err(|_| ClinicError::InvalidRequest(INVALID_APPOINTMENT_ID_MESSAGE.to_string()))
}

impl AppointmentService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Books a visit for an existing patient (`patientMongoId`) or registers
    /// a new patient first.
    pub async fn book(&self, request: BookAppointmentRequest) -> ClinicResult<BookingConfirmation> {
        let missing = missing_fields(&[
            ("patientName", &request.patient_name),
            ("contact", &request.contact),
            ("dob", &request.dob),
            ("appointmentDate", &request.appointment_date),
            ("sugarLevel", &request.sugar_level),
            ("bp", &request.bp),
            ("reason", &request.reason),
        ]);
        if !missing.is_empty() {
            debug!("Booking rejected, missing: {}", missing.join(", "));
            return Err(ClinicError::InvalidRequest(REQUIRED_FIELDS_MESSAGE.to_string()));
        }
        let field = |value: &Option<String>| non_blank(value).unwrap_or_default().to_string();
        let details = VisitDetails {
            appointment_date: parse_datetime(&field(&request.appointment_date))?,
            sugar_level: field(&request.sugar_level),
            bp: field(&request.bp),
            reason: field(&request.reason),
        };

        let _guard = self.db.write_lock().await;
        let mut patient = match non_blank(&request.patient_mongo_id) {
            Some(raw_id) => {
                let id = RecordId::parse(raw_id, "patient")
                    .map_err(|_| ClinicError::InvalidRequest(INVALID_PATIENT_ID_MESSAGE.to_string()))?;
                self.db
                    .get_patient(&id)
                    .await?
                    .ok_or_else(|| ClinicError::NotFound(EXISTING_PATIENT_NOT_FOUND_MESSAGE.to_string()))?
            }
            None => self.register_patient(&request).await?,
        };

        let appointment = Appointment::new(&patient, details);
        self.db.save_appointment(&appointment).await?;
        patient.add_appointment(appointment.id);
        self.db.save_patient(&patient).await?;
        info!("Booked appointment {} for patient {}", appointment.id, patient.patient_id);

        Ok(BookingConfirmation {
            message: BOOKED_MESSAGE.to_string(),
            patient_id: patient.patient_id,
        })
    }

    /// Caller holds the write lock.
    async fn register_patient(&self, request: &BookAppointmentRequest) -> ClinicResult<Patient> {
        let dob = parse_datetime(non_blank(&request.dob).unwrap_or_default())?;
        validate_dob(&dob)?;
        let gender: Gender = non_blank(&request.gender)
            .ok_or_else(|| ValidationError::RequiredField("Gender".to_string()))?
            .parse()?;
        let patient_id = match non_blank(&request.patient_id) {
            Some(raw) => PatientId::new(raw)?,
            None => self.generate_patient_id(&dob).await?,
        };

        let patient = Patient::new(NewPatient {
            patient_id,
            patient_name: non_blank(&request.patient_name).unwrap_or_default().to_string(),
            contact: non_blank(&request.contact).unwrap_or_default().to_string(),
            dob,
            gender,
        });
        self.db.create_patient(&patient).await?;
        info!("Registered patient {}", patient.patient_id);
        Ok(patient)
    }

    async fn generate_patient_id(&self, dob: &chrono::DateTime<chrono::Utc>) -> ClinicResult<PatientId> {
        for _ in 0..MAX_GENERATED_ID_ATTEMPTS {
            let candidate = PatientId::generate(self.db.next_sequence(PATIENT_SEQUENCE).await?, dob);
            if self.db.find_patient_by_patient_id(candidate.as_str()).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(ClinicError::Conflict(lib::database::DUPLICATE_PATIENT_MESSAGE.to_string()))
    }

    async fn populate(&self, appointments: Vec<Appointment>) -> ClinicResult<Vec<PopulatedAppointment>> {
        let patients: HashMap<RecordId, Patient> = self
            .db
            .list_patients()
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();
        Ok(appointments
            .into_iter()
            .map(|a| {
                let patient = patients.get(&a.patient).cloned();
                a.populate(patient)
            })
            .collect())
    }

    /// Non-archived appointments with their patient, newest appointment date first.
    pub async fn list_active(&self) -> ClinicResult<Vec<PopulatedAppointment>> {
        let mut active: Vec<Appointment> = self
            .db
            .list_appointments()
            .await?
            .into_iter()
            .filter(|a| !a.is_archived)
            .collect();
        active.sort_by(|a, b| b.appointment_date.cmp(&a.appointment_date));
        self.populate(active).await
    }

    /// Archived appointments with their patient, most recently touched first.
    pub async fn list_archived(&self) -> ClinicResult<Vec<PopulatedAppointment>> {
        let mut archived: Vec<Appointment> = self
            .db
            .list_appointments()
            .await?
            .into_iter()
            .filter(|a| a.is_archived)
            .collect();
        archived.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        self.populate(archived).await
    }

    async fn load(&self, id: &RecordId) -> ClinicResult<Appointment> {
        self.db
            .get_appointment(id)
            .await?
            .ok_or_else(|| ClinicError::NotFound(APPOINTMENT_NOT_FOUND_MESSAGE.to_string()))
    }

    pub async fn save_diagnosis(&self, id: &str, update: DiagnosisUpdate) -> ClinicResult<Appointment> {
        let id = parse_appointment_id(id)?;
        let _guard = self.db.write_lock().await;
        let mut appointment = self.load(&id).await?;
        appointment.apply_diagnosis(&update)?;
        self.db.save_appointment(&appointment).await?;
        self.refresh_latest_stage(&appointment.patient).await?;
        info!("Diagnosis saved on appointment {}", appointment.id);
        Ok(appointment)
    }

    pub async fn update_details(&self, id: &str, update: AppointmentUpdate) -> ClinicResult<PopulatedAppointment> {
        let id = parse_appointment_id(id)?;
        let _guard = self.db.write_lock().await;
        let mut appointment = self.load(&id).await?;
        appointment.apply_update(&update)?;
        self.db.save_appointment(&appointment).await?;
        self.refresh_latest_stage(&appointment.patient).await?;
        let patient = self.db.get_patient(&appointment.patient).await?;
        Ok(appointment.populate(patient))
    }

    /// Idempotent.
    pub async fn archive(&self, id: &str) -> ClinicResult<Appointment> {
        let id = parse_appointment_id(id)?;
        let _guard = self.db.write_lock().await;
        let mut appointment = self.load(&id).await?;
        if appointment.archive() {
            self.db.save_appointment(&appointment).await?;
            info!("Archived appointment {}", appointment.id);
        }
        Ok(appointment)
    }

    /// Removes the appointment and its reference on the patient.
    pub async fn delete(&self, id: &str) -> ClinicResult<Appointment> {
        let id = parse_appointment_id(id)?;
        let _guard = self.db.write_lock().await;
        let appointment = self.load(&id).await?;
        self.db.delete_appointment(&id).await?;
        if let Some(mut patient) = self.db.get_patient(&appointment.patient).await? {
            if patient.remove_appointment(&id) {
                self.db.save_patient(&patient).await?;
            }
        }
        self.refresh_latest_stage(&appointment.patient).await?;
        info!("Deleted appointment {}", id);
        Ok(appointment)
    }

    /// Caller holds the write lock.
    async fn refresh_latest_stage(&self, patient_ref: &RecordId) -> ClinicResult<()> {
        let Some(mut patient) = self.db.get_patient(patient_ref).await? else {
            return Ok(());
        };
        let latest = self
            .db
            .list_appointments()
            .await?
            .into_iter()
            .filter(|a| a.patient == *patient_ref && a.is_completed())
            .filter(|a| a.disease_stage.as_deref().map_or(false, |s| !s.trim().is_empty()))
            .max_by(|a, b| a.appointment_date.cmp(&b.appointment_date));
        let stage = latest.as_ref().and_then(|a| a.disease_stage.as_deref());
        if patient.set_latest_disease_stage(stage) {
            self.db.save_patient(&patient).await?;
            debug!("Patient {} latest stage is now {}", patient.patient_id, patient.latest_disease_stage);
        }
        Ok(())
    }
}
