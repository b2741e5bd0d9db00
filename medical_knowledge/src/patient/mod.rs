// medical_knowledge/src/patient/mod.rs
pub mod patient_service;

pub use patient_service::*;
