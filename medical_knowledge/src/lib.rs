// medical_knowledge/src/lib.rs

pub mod appointments;
pub mod diagnostics;
pub mod patient;

pub use appointments::*;
pub use diagnostics::*;
pub use patient::*;
