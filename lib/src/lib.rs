// lib/src/lib.rs

pub mod auth;
pub mod config;
pub mod database;
pub mod mailer;
pub mod storage_engine;

pub use auth::{AuthService, Claims, TokenIssuer};
pub use config::{ClinicConfig, StorageConfig, StorageEngineType};
pub use database::Database;
pub use mailer::{build_mailer, LogMailer, Mailer, MemoryMailer, OtpMail, SmtpMailer};
pub use storage_engine::{Collection, InMemoryStorage, StorageEngine, UniqueIndex};
#[cfg(feature = "with-sled")]
pub use storage_engine::SledStorage;
