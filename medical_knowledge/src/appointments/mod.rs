// medical_knowledge/src/appointments/mod.rs
pub mod appointment_service;

pub use appointment_service::*;
