// models/src/lib.rs

pub mod errors;
pub mod identifiers;
pub mod timestamp;

pub mod medical;

pub use errors::{ClinicError, ClinicResult, ValidationError, ValidationResult};
pub use identifiers::{PatientId, RecordId};
pub use medical::{
    Appointment, AppointmentStatus, Gender, OtpChallenge, Patient, PatientSummary,
    PopulatedAppointment, Prediction, PredictorOutput, Role, User, UserProfile,
};
