// logging_service/src/log.rs
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slog::{o, Drain, Logger};

use lib::database::Database;
use models::errors::ClinicResult;

const AUDIT_SEQUENCE: &str = "audit";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Signup,
    Login,
    PasswordResetRequested,
    PasswordReset,
    Booking,
    Diagnosis,
    AppointmentUpdate,
    Archive,
    Delete,
    Prediction,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "signup",
            AuditAction::Login => "login",
            AuditAction::PasswordResetRequested => "password_reset_requested",
            AuditAction::PasswordReset => "password_reset",
            AuditAction::Booking => "booking",
            AuditAction::Diagnosis => "diagnosis",
            AuditAction::AppointmentUpdate => "appointment_update",
            AuditAction::Archive => "archive",
            AuditAction::Delete => "delete",
            AuditAction::Prediction => "prediction",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    /// Username of the account, or `cli` for offline commands.
    pub actor: String,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn new(actor: impl Into<String>, action: AuditAction) -> Self {
        AuditEntry {
            at: Utc::now(),
            actor: actor.into(),
            action,
            target: None,
            detail: None,
        }
    }

    pub fn target(mut self, target: impl fmt::Display) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[async_trait]
pub trait AuditLog: Send + Sync + fmt::Debug {
    async fn record(&self, entry: AuditEntry) -> ClinicResult<()>;
    /// Newest first.
    async fn recent(&self, limit: usize) -> ClinicResult<Vec<AuditEntry>>;
}

pub struct AuditLogService {
    logger: Logger,
    db: Database,
}

impl fmt::Debug for AuditLogService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLogService")
            .field("engine", &self.db.engine_type())
            .finish()
    }
}

#[async_trait]
impl AuditLog for AuditLogService {
    async fn record(&self, entry: AuditEntry) -> ClinicResult<()> {
        slog::info!(self.logger, "audit";
            "action" => entry.action.as_str(),
            "actor" => entry.actor.as_str(),
            "target" => entry.target.as_deref().unwrap_or("-"),
            "detail" => entry.detail.as_deref().unwrap_or("-")
        );

        let seq = self.db.next_sequence(AUDIT_SEQUENCE).await?;
        self.db.append_audit_entry(seq.to_be_bytes().to_vec(), &entry).await
    }

    async fn recent(&self, limit: usize) -> ClinicResult<Vec<AuditEntry>> {
        let entries: Vec<AuditEntry> = self.db.audit_entries().await?;
        Ok(entries.into_iter().rev().take(limit).collect())
    }
}

impl AuditLogService {
    /// Audit lines go to the terminal through an async slog drain.
    pub fn new(db: Database) -> Self {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let logger = Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")));
        Self::with_logger(db, logger)
    }

    pub fn with_logger(db: Database, logger: Logger) -> Self {
        AuditLogService { logger, db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet(db: Database) -> AuditLogService {
        AuditLogService::with_logger(db, Logger::root(slog::Discard, o!()))
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let service = quiet(Database::in_memory());
        for action in [AuditAction::Signup, AuditAction::Login, AuditAction::Booking] {
            service.record(AuditEntry::new("desk@clinic.test", action)).await.unwrap();
        }
        let recent = service.recent(2).await.unwrap();
        let actions: Vec<AuditAction> = recent.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Booking, AuditAction::Login]);
    }

    #[tokio::test]
    async fn entries_survive_a_new_service_instance() {
        let db = Database::in_memory();
        quiet(db.clone())
            .record(
                AuditEntry::new("dr@clinic.test", AuditAction::Archive)
                    .target("appointment 42")
                    .detail("archived from dashboard"),
            )
            .await
            .unwrap();
        let recent = quiet(db).recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].target.as_deref(), Some("appointment 42"));
    }

    #[test]
    fn actions_serialize_snake_case() {
        let json = serde_json::to_string(&AuditAction::PasswordResetRequested).unwrap();
        assert_eq!(json, "\"password_reset_requested\"");
    }
}
