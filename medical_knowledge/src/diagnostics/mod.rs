// medical_knowledge/src/diagnostics/mod.rs
pub mod classifier;
pub mod prediction_service;
pub mod upload_store;

pub use classifier::*;
pub use prediction_service::*;
pub use upload_store::*;
