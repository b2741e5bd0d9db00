// server/src/api/state.rs
use std::sync::Arc;

use log::warn;

use lib::auth::AuthService;
use lib::config::ClinicConfig;
use lib::database::Database;
use lib::mailer::{build_mailer, Mailer};
use logging_service::{AuditEntry, AuditLog, AuditLogService};
use medical_knowledge::{AppointmentService, PatientService, PredictionService};
use models::errors::ClinicResult;

/// Everything a request handler can reach. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub patients: PatientService,
    pub appointments: AppointmentService,
    pub predictions: PredictionService,
    pub audit: Arc<dyn AuditLog>,
}

impl AppState {
    pub async fn from_config(config: &ClinicConfig) -> ClinicResult<Self> {
        let db = Database::new(config.storage.clone()).await?;
        let mailer = build_mailer(&config.mail)?;
        let audit: Arc<dyn AuditLog> = Arc::new(AuditLogService::new(db.clone()));
        Self::assemble(db, config, mailer, audit)
    }

    pub fn assemble(
        db: Database,
        config: &ClinicConfig,
        mailer: Arc<dyn Mailer>,
        audit: Arc<dyn AuditLog>,
    ) -> ClinicResult<Self> {
        Ok(AppState {
            auth: AuthService::new(db.clone(), &config.auth, mailer)?,
            patients: PatientService::new(db.clone()),
            appointments: AppointmentService::new(db.clone()),
            predictions: PredictionService::from_config(&config.predictor),
            audit,
            db,
        })
    }

    /// Audit failures are logged, never surfaced to the caller.
    pub async fn record(&self, entry: AuditEntry) {
        let action = entry.action;
        if let Err(e) = self.audit.record(entry).await {
            warn!("Failed to write {} audit entry: {}", action, e);
        }
    }
}
