// server/src/cli/handlers.rs

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use lib::auth::AuthService;
use lib::config::{load_clinic_config, write_default_config, ClinicConfig, StorageEngineType};
use lib::database::Database;
use lib::mailer::LogMailer;
use logging_service::{AuditAction, AuditEntry, AuditLog, AuditLogService};
use models::medical::{Role, SignupRequest};

use crate::api::{routes, AppState};

const CLI_ACTOR: &str = "cli";

#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub storage_engine: Option<StorageEngineType>,
}

impl ServeOverrides {
    pub fn apply(self, config: &mut ClinicConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(engine) = self.storage_engine {
            config.storage.engine = engine;
        }
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down gracefully..."),
                }
                return;
            }
            Err(e) => warn!("Failed to set up SIGTERM handler: {}", e),
        }
    }
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received SIGINT, shutting down gracefully..."),
        Err(e) => warn!("Failed to listen for SIGINT: {}", e),
    }
}

pub async fn handle_serve(config_path: Option<&Path>, overrides: ServeOverrides) -> Result<()> {
    let mut config = load_clinic_config(config_path)?;
    overrides.apply(&mut config);
    config.validate().map_err(|e| anyhow!(e))?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    if config.storage.engine == StorageEngineType::InMemory {
        warn!("Using in-memory storage; all records are lost on shutdown.");
    }

    let state = AppState::from_config(&config).await.map_err(|e| anyhow!(e))?;
    let (bound, server) = warp::serve(routes(state.clone()))
        .try_bind_with_graceful_shutdown(addr, shutdown_signal())
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Clinic API listening on http://{} (storage: {})", bound, state.db.engine_type());

    server.await;
    state.db.flush().await.map_err(|e| anyhow!(e))?;
    info!("Storage flushed, bye.");
    Ok(())
}

pub fn handle_init_config(path: &Path, force: bool) -> Result<()> {
    write_default_config(path, force)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

pub async fn handle_create_user(
    config_path: Option<&Path>,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<()> {
    let config = load_clinic_config(config_path)?;
    if config.storage.engine == StorageEngineType::InMemory {
        warn!("Storage engine is in_memory; the account will not outlive this command.");
    }
    let db = Database::new(config.storage.clone()).await.map_err(|e| anyhow!(e))?;
    let auth = AuthService::new(db.clone(), &config.auth, Arc::new(LogMailer)).map_err(|e| anyhow!(e))?;

    let profile = auth
        .signup(SignupRequest {
            username: Some(username.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            role: Some(role.to_string()),
        })
        .await
        .map_err(|e| anyhow!(e.public_message()))?;

    AuditLogService::new(db.clone())
        .record(AuditEntry::new(CLI_ACTOR, AuditAction::Signup).target(&profile.id))
        .await
        .map_err(|e| anyhow!(e))?;
    db.flush().await.map_err(|e| anyhow!(e))?;
    println!("Created {} account {} <{}>", profile.role, profile.username, profile.email);
    Ok(())
}

pub async fn handle_audit(config_path: Option<&Path>, limit: usize) -> Result<()> {
    let config = load_clinic_config(config_path)?;
    let db = Database::new(config.storage.clone()).await.map_err(|e| anyhow!(e))?;
    let entries = AuditLogService::new(db).recent(limit).await.map_err(|e| anyhow!(e))?;
    if entries.is_empty() {
        println!("No audit entries.");
    }
    for entry in entries {
        println!("{}", format_entry(&entry));
    }
    Ok(())
}

fn format_entry(entry: &AuditEntry) -> String {
    let mut line = format!(
        "{}  {:<24} {}",
        entry.at.format("%Y-%m-%d %H:%M:%S"),
        entry.action,
        entry.actor
    );
    if let Some(target) = &entry.target {
        line.push_str(&format!(" -> {}", target));
    }
    if let Some(detail) = &entry.detail {
        line.push_str(&format!(" ({})", detail));
    }
    line
}
