// lib/src/config/config_helpers.rs
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ::config::{Config, Environment, File as ConfigFile, FileFormat};
use log::{debug, info, warn};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_yaml2 as serde_yaml;

use models::errors::{ClinicError, ClinicResult};

use crate::config::config_constants::*;
use crate::config::config_structs::*;

/// Loads the YAML file (explicit path, or `./clinic.yaml` when present) and
/// layers `CLINIC_*` environment variables on top.
pub fn load_clinic_config(config_file_path: Option<&Path>) -> Result<ClinicConfig> {
    let (path_to_use, required) = match config_file_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    if required || path_to_use.exists() {
        info!("Loading clinic config from {}", path_to_use.display());
    } else {
        warn!("Config file not found at {}. Using defaults and environment.", path_to_use.display());
    }

    let settings = Config::builder()
        .add_source(
            ConfigFile::from(path_to_use.as_path())
                .format(FileFormat::Yaml)
                .required(required),
        )
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("Failed to read configuration from {}", path_to_use.display()))?;

    let port_configured = port_is_configured(&settings);
    let mut config: ClinicConfig = settings
        .try_deserialize()
        .context("Failed to parse clinic configuration")?;

    config.apply_legacy_env(port_configured, |key| env::var(key).ok());
    if config.ensure_jwt_secret() {
        warn!("auth.jwt_secret is not set; generated a per-process secret. Tokens will not survive a restart.");
    }
    config.validate().map_err(|e| anyhow!(e))?;
    debug!("Effective config: {:?}", config);
    Ok(config)
}

/// Writes the default configuration as YAML. Refuses to overwrite unless `force`.
pub fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow!("{} already exists; pass --force to overwrite it", path.display()));
    }
    let yaml_string = serde_yaml::to_string(&ClinicConfig::default())
        .map_err(|e| anyhow!("Failed to serialize default config to YAML: {}", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directories for {}", path.display()))?;
    }
    fs::write(path, yaml_string)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

/// True when the file or a `CLINIC_*` variable set `server.port`, whatever
/// the value. Defaults are not part of `settings`.
fn port_is_configured(settings: &Config) -> bool {
    settings.get::<u16>("server.port").is_ok()
}

impl ClinicConfig {
    /// Honors `PORT`, `JWT_SECRET`, `EMAIL_USER` and `EMAIL_PASS` for settings
    /// that neither the file nor a `CLINIC_*` variable provided. An explicit
    /// `server.port` always wins over `PORT`, even when it equals the default.
    pub fn apply_legacy_env<F>(&mut self, port_configured: bool, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if !port_configured {
            if let Some(raw) = lookup("PORT") {
                match raw.trim().parse::<u16>() {
                    Ok(port) => self.server.port = port,
                    Err(_) => warn!("Ignoring PORT={:?}: not a valid port", raw),
                }
            }
        }
        if self.auth.jwt_secret.is_none() {
            self.auth.jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty());
        }
        if self.mail.username.is_none() {
            self.mail.username = lookup("EMAIL_USER").filter(|s| !s.is_empty());
        }
        if self.mail.password.is_none() {
            self.mail.password = lookup("EMAIL_PASS").filter(|s| !s.is_empty());
        }
        if lookup("CLINIC_MAIL__TRANSPORT").is_none()
            && self.mail.transport == MailTransport::Log
            && lookup("EMAIL_USER").is_some()
            && lookup("EMAIL_PASS").is_some()
        {
            self.mail.transport = MailTransport::Smtp;
        }
    }

    /// Returns true when a secret had to be generated.
    pub fn ensure_jwt_secret(&mut self) -> bool {
        let missing = self
            .auth
            .jwt_secret
            .as_deref()
            .map_or(true, |s| s.trim().is_empty());
        if missing {
            let secret: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(GENERATED_SECRET_LEN)
                .map(char::from)
                .collect();
            self.auth.jwt_secret = Some(secret);
        }
        missing
    }

    pub fn validate(&self) -> ClinicResult<()> {
        let invalid = |msg: String| Err(ClinicError::ConfigurationError(msg));

        if self.server.port == 0 {
            return invalid("server.port must be non-zero".into());
        }
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&self.auth.bcrypt_cost) {
            return invalid(format!(
                "auth.bcrypt_cost must be between {} and {}, got {}",
                MIN_BCRYPT_COST, MAX_BCRYPT_COST, self.auth.bcrypt_cost
            ));
        }
        if self.auth.token_ttl_minutes <= 0 || self.auth.otp_ttl_minutes <= 0 {
            return invalid("auth token and OTP lifetimes must be positive".into());
        }
        if self.auth.otp_max_attempts == 0 {
            return invalid("auth.otp_max_attempts must be at least 1".into());
        }
        if self.predictor.timeout_secs == 0 {
            return invalid("predictor.timeout_secs must be positive".into());
        }
        if self.predictor.max_upload_bytes == 0 {
            return invalid("predictor.max_upload_bytes must be positive".into());
        }
        if self.mail.transport == MailTransport::Smtp {
            if self.mail.smtp_host.trim().is_empty() {
                return invalid("mail.smtp_host is required for the smtp transport".into());
            }
            if self.mail.username.is_none() || self.mail.password.is_none() {
                return invalid("mail.username and mail.password are required for the smtp transport".into());
            }
            if self.mail.sender_address().is_none() {
                return invalid("mail.from_address is required for the smtp transport".into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid_once_a_secret_exists() {
        let mut config = ClinicConfig::default();
        assert_eq!(config.server.port, 5000);
        assert!(config.ensure_jwt_secret());
        assert!(!config.ensure_jwt_secret());
        assert_eq!(config.auth.jwt_secret.as_ref().map(String::len), Some(GENERATED_SECRET_LEN));
        config.validate().unwrap();
    }

    #[test]
    fn legacy_variables_fill_gaps() {
        let mut config = ClinicConfig::default();
        config.apply_legacy_env(false, lookup_from(&[
            ("PORT", "8081"),
            ("JWT_SECRET", "s3cret"),
            ("EMAIL_USER", "clinic@example.org"),
            ("EMAIL_PASS", "app-password"),
        ]));
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.mail.transport, MailTransport::Smtp);
        assert_eq!(config.mail.sender_address(), Some("clinic@example.org"));
        config.validate().unwrap();
    }

    #[test]
    fn explicit_values_win_over_legacy_variables() {
        let mut config = ClinicConfig::default();
        config.auth.jwt_secret = Some("from-file".into());
        config.apply_legacy_env(true, lookup_from(&[("PORT", "8081"), ("JWT_SECRET", "legacy")]));
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("from-file"));
    }

    #[test]
    fn explicit_default_port_is_still_explicit() {
        let settings = Config::builder()
            .add_source(ConfigFile::from_str("server:\n  port: 5000\n", FileFormat::Yaml))
            .build()
            .unwrap();
        let configured = port_is_configured(&settings);
        assert!(configured);

        let mut config: ClinicConfig = settings.try_deserialize().unwrap();
        config.apply_legacy_env(configured, lookup_from(&[("PORT", "8081")]));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn unset_port_yields_to_legacy_variable() {
        let settings = Config::builder()
            .add_source(ConfigFile::from_str("storage:\n  engine: in_memory\n", FileFormat::Yaml))
            .build()
            .unwrap();
        assert!(!port_is_configured(&settings));

        let mut config: ClinicConfig = settings.try_deserialize().unwrap();
        config.apply_legacy_env(false, lookup_from(&[("PORT", "8081")]));
        assert_eq!(config.server.port, 8081);
    }

    #[test]
    fn out_of_range_bcrypt_cost_is_rejected() {
        let mut config = ClinicConfig::default();
        config.ensure_jwt_secret();
        config.auth.bcrypt_cost = 3;
        assert!(matches!(config.validate(), Err(ClinicError::ConfigurationError(_))));
    }

    #[test]
    fn smtp_without_credentials_is_rejected() {
        let mut config = ClinicConfig::default();
        config.ensure_jwt_secret();
        config.mail.transport = MailTransport::Smtp;
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_yaml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clinic.yaml");
        fs::write(
            &path,
            "server:\n  port: 6001\nstorage:\n  engine: in_memory\nauth:\n  jwt_secret: test-secret\n  bcrypt_cost: 4\n",
        )
        .unwrap();
        let config = load_clinic_config(Some(&path)).unwrap();
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.storage.engine, StorageEngineType::InMemory);
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.predictor.timeout_secs, DEFAULT_PREDICTOR_TIMEOUT_SECS);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_clinic_config(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("clinic.yaml");
        write_default_config(&path, false).unwrap();
        assert!(path.exists());
        assert!(write_default_config(&path, false).is_err());
        write_default_config(&path, true).unwrap();
    }
}
