// logging_service/src/lib.rs
pub mod log;

pub use self::log::{AuditAction, AuditEntry, AuditLog, AuditLogService};
