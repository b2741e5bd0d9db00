// lib/src/mailer.rs
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
use tokio::sync::Mutex as TokioMutex;

use models::errors::{ClinicError, ClinicResult};

use crate::config::{MailConfig, MailTransport};

/// The password-reset message. Carries the OTP, so it must never be logged.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpMail {
    pub to_name: String,
    pub to_address: String,
    pub otp: String,
    pub ttl_minutes: i64,
}

impl Debug for OtpMail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpMail")
            .field("to_address", &self.to_address)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl OtpMail {
    pub fn subject(&self) -> &'static str {
        "Your Password Reset OTP"
    }

    pub fn text_body(&self) -> String {
        format!(
            "Hello {},\n\nYour OTP for password reset is: {}\n\nThis OTP will expire in {} minutes.\n",
            self.to_name, self.otp, self.ttl_minutes
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            "<div style=\"font-family: Arial, sans-serif; line-height: 1.6;\">\
             <h3>Hello {name},</h3>\
             <p>You requested a password reset. Your One-Time Password (OTP) is:</p>\
             <h1 style=\"color: #333; background: #f4f4f4; padding: 10px 20px; border-radius: 5px; display: inline-block;\">{otp}</h1>\
             <p>This OTP will expire in {ttl} minutes.</p>\
             <p>If you did not request this, please ignore this email.</p>\
             </div>",
            name = escape_html(&self.to_name),
            otp = self.otp,
            ttl = self.ttl_minutes
        )
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    async fn send_otp(&self, mail: &OtpMail) -> ClinicResult<()>;
    fn transport_name(&self) -> &'static str;
}

pub fn build_mailer(config: &MailConfig) -> ClinicResult<Arc<dyn Mailer>> {
    match config.transport {
        MailTransport::Smtp => Ok(Arc::new(SmtpMailer::new(config)?)),
        MailTransport::Log => Ok(Arc::new(LogMailer)),
    }
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("from", &self.from.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> ClinicResult<Self> {
        let config_error = |msg: String| ClinicError::ConfigurationError(msg);

        let (Some(username), Some(password)) = (config.username.clone(), config.password.clone()) else {
            return Err(config_error("SMTP username and password are required".into()));
        };
        let sender = config
            .sender_address()
            .ok_or_else(|| config_error("mail.from_address is required".into()))?;
        let address: Address = sender
            .parse()
            .map_err(|e| config_error(format!("Invalid sender address '{}': {}", sender, e)))?;

        // Port 465 speaks TLS from the first byte; everything else upgrades with STARTTLS.
        let builder = if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| config_error(format!("Invalid SMTP relay '{}': {}", config.smtp_host, e)))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(SmtpMailer {
            transport,
            from: Mailbox::new(Some(config.from_name.clone()), address),
            host: config.smtp_host.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(&self, mail: &OtpMail) -> ClinicResult<()> {
        let to_address: Address = mail
            .to_address
            .parse()
            .map_err(|e| ClinicError::MailError(format!("Invalid recipient address: {}", e)))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(Some(mail.to_name.clone()), to_address))
            .subject(mail.subject())
            .multipart(MultiPart::alternative_plain_html(mail.text_body(), mail.html_body()))
            .map_err(|e| ClinicError::MailError(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ClinicError::MailError(format!("SMTP delivery via {} failed: {}", self.host, e)))?;
        info!("Password reset OTP sent to {}", mail.to_address);
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

/// Development transport: records that a mail would have gone out.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp(&self, mail: &OtpMail) -> ClinicResult<()> {
        info!(
            "mail.transport=log: password reset OTP for {} not delivered (expires in {} minutes)",
            mail.to_address, mail.ttl_minutes
        );
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every mail in memory; lets tests read the OTP a user would receive.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: TokioMutex<Vec<OtpMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OtpMail> {
        self.outbox.lock().await.clone()
    }

    pub async fn last_otp_for(&self, address: &str) -> Option<String> {
        self.outbox
            .lock()
            .await
            .iter()
            .rev()
            .find(|mail| mail.to_address.eq_ignore_ascii_case(address))
            .map(|mail| mail.otp.clone())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_otp(&self, mail: &OtpMail) -> ClinicResult<()> {
        self.outbox.lock().await.push(mail.clone());
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OtpMail {
        OtpMail {
            to_name: "Dr <Who>".into(),
            to_address: "who@clinic.org".into(),
            otp: "424242".into(),
            ttl_minutes: 10,
        }
    }

    #[test]
    fn bodies_carry_the_code_and_expiry() {
        let m = mail();
        assert!(m.text_body().contains("424242"));
        assert!(m.text_body().contains("10 minutes"));
        assert!(m.html_body().contains("Dr &lt;Who&gt;"));
    }

    #[test]
    fn debug_output_hides_the_code() {
        assert!(!format!("{:?}", mail()).contains("424242"));
    }

    #[test]
    fn log_transport_is_the_default() {
        let mailer = build_mailer(&MailConfig::default()).unwrap();
        assert_eq!(mailer.transport_name(), "log");
    }

    #[test]
    fn smtp_transport_needs_credentials() {
        let config = MailConfig {
            transport: MailTransport::Smtp,
            ..Default::default()
        };
        assert!(matches!(build_mailer(&config), Err(ClinicError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn smtp_transport_builds_without_connecting() {
        let config = MailConfig {
            transport: MailTransport::Smtp,
            username: Some("clinic@example.org".into()),
            password: Some("app-password".into()),
            ..Default::default()
        };
        let mailer = build_mailer(&config).unwrap();
        assert_eq!(mailer.transport_name(), "smtp");
    }

    #[tokio::test]
    async fn memory_mailer_returns_latest_code() {
        let mailer = MemoryMailer::new();
        mailer.send_otp(&mail()).await.unwrap();
        let mut second = mail();
        second.otp = "111111".into();
        mailer.send_otp(&second).await.unwrap();
        assert_eq!(mailer.last_otp_for("WHO@clinic.org").await.as_deref(), Some("111111"));
        assert_eq!(mailer.sent().await.len(), 2);
    }
}
