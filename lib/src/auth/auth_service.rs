// lib/src/auth/auth_service.rs
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};

use models::errors::{ClinicError, ClinicResult, ValidationError};
use models::medical::{
    missing_fields, non_blank, validate_email, ForgotPasswordRequest, LoginRequest, LoginResponse,
    ResetPasswordRequest, Role, SignupRequest, User, UserProfile,
};

use crate::auth::otp::{check_otp, generate_otp, issue_challenge, OtpVerdict};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::{Claims, TokenIssuer};
use crate::config::AuthConfig;
use crate::database::Database;
use crate::mailer::{Mailer, OtpMail};

pub const SIGNUP_FIELDS_MESSAGE: &str = "All fields (username, email, password, role) are required.";
pub const SIGNUP_OK_MESSAGE: &str = "Signup successful!!.";
pub const LOGIN_FIELDS_MESSAGE: &str = "All fields are required.";
pub const LOGIN_FAILED_MESSAGE: &str = "Invalid email, password, or role";
pub const USER_NOT_FOUND_MESSAGE: &str = "User not found.";
pub const OTP_SENT_MESSAGE: &str = "OTP has been sent to your email.";
pub const INVALID_OTP_MESSAGE: &str = "Invalid or expired OTP.";
pub const RESET_OK_MESSAGE: &str = "Password reset successful.";

/// Account lifecycle: signup, login, and OTP-based password reset.
#[derive(Clone, Debug)]
pub struct AuthService {
    db: Database,
    tokens: TokenIssuer,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
    otp_ttl_minutes: i64,
    otp_max_attempts: u32,
}

impl AuthService {
    pub fn new(db: Database, config: &AuthConfig, mailer: Arc<dyn Mailer>) -> ClinicResult<Self> {
        let secret = config
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ClinicError::ConfigurationError("auth.jwt_secret is not set".into()))?;
        Ok(AuthService {
            db,
            tokens: TokenIssuer::new(secret, config.token_ttl_minutes)?,
            mailer,
            bcrypt_cost: config.bcrypt_cost,
            otp_ttl_minutes: config.otp_ttl_minutes,
            otp_max_attempts: config.otp_max_attempts,
        })
    }

    pub async fn signup(&self, request: SignupRequest) -> ClinicResult<UserProfile> {
        let missing = missing_fields(&[
            ("username", &request.username),
            ("email", &request.email),
            ("password", &request.password),
            ("role", &request.role),
        ]);
        if !missing.is_empty() {
            return Err(ClinicError::InvalidRequest(SIGNUP_FIELDS_MESSAGE.to_string()));
        }
        let (Some(username), Some(email), Some(role)) = (
            non_blank(&request.username),
            non_blank(&request.email),
            non_blank(&request.role),
        ) else {
            return Err(ClinicError::InvalidRequest(SIGNUP_FIELDS_MESSAGE.to_string()));
        };
        let password = request.password.as_deref().unwrap_or_default();
        let role: Role = role.parse()?;
        validate_email(email)?;

        if self.db.find_user_by_email(email).await?.is_some() {
            return Err(ClinicError::AlreadyExists(crate::database::USER_EXISTS_MESSAGE.to_string()));
        }
        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let user = User::new(username, email, password_hash, role);
        // The email claim inside create_user settles concurrent signups.
        self.db.create_user(&user).await?;
        info!("Registered {} account {}", user.role, user.id);
        Ok(user.profile())
    }

    pub async fn login(&self, request: LoginRequest) -> ClinicResult<LoginResponse> {
        let (Some(email), Some(role)) = (non_blank(&request.email), non_blank(&request.role)) else {
            return Err(ClinicError::InvalidRequest(LOGIN_FIELDS_MESSAGE.to_string()));
        };
        let Some(password) = request.password.as_deref().filter(|p| !p.is_empty()) else {
            return Err(ClinicError::InvalidRequest(LOGIN_FIELDS_MESSAGE.to_string()));
        };
        let failed = || ClinicError::Auth(LOGIN_FAILED_MESSAGE.to_string());

        let user = self.db.find_user_by_email(email).await?.ok_or_else(failed)?;
        let password_ok = verify_password(password, &user.password_hash).await?;
        let role_ok = role.parse::<Role>().map_or(false, |r| r == user.role);
        if !password_ok || !role_ok {
            warn!("Rejected login for account {}", user.id);
            return Err(failed());
        }

        let token = self.tokens.issue(&user)?;
        info!("Account {} logged in as {}", user.id, user.role);
        Ok(LoginResponse {
            token,
            user: user.profile(),
        })
    }

    /// Stores a fresh OTP challenge and mails the code.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ClinicResult<UserProfile> {
        let email = non_blank(&request.email)
            .ok_or_else(|| ValidationError::RequiredField("Email".to_string()))?;

        let otp = generate_otp();
        let user = {
            let _guard = self.db.write_lock().await;
            let mut user = self
                .db
                .find_user_by_email(email)
                .await?
                .ok_or_else(|| ClinicError::NotFound(USER_NOT_FOUND_MESSAGE.to_string()))?;
            user.reset_password = Some(issue_challenge(&otp, Utc::now(), self.otp_ttl_minutes));
            self.db.save_user(&user).await?;
            user
        };

        self.mailer
            .send_otp(&OtpMail {
                to_name: user.username.clone(),
                to_address: user.email.clone(),
                otp,
                ttl_minutes: self.otp_ttl_minutes,
            })
            .await?;
        info!("Password reset requested for account {}", user.id);
        Ok(user.profile())
    }

    pub async fn reset_password(&self, request: ResetPasswordRequest) -> ClinicResult<UserProfile> {
        let invalid = || ClinicError::InvalidRequest(INVALID_OTP_MESSAGE.to_string());
        let (Some(email), Some(otp)) = (non_blank(&request.email), non_blank(&request.otp)) else {
            return Err(invalid());
        };
        let Some(new_password) = request.new_password.as_deref().filter(|p| !p.is_empty()) else {
            return Err(ValidationError::RequiredField("New password".to_string()).into());
        };

        // Hashing is slow, so it happens before the write lock is taken. The
        // challenge is re-read and checked under the lock.
        let pending = self.db.find_user_by_email(email).await?;
        if !pending.map_or(false, |u| u.reset_password.is_some()) {
            return Err(invalid());
        }
        let password_hash = hash_password(new_password, self.bcrypt_cost).await?;

        let _guard = self.db.write_lock().await;
        let mut user = self.db.find_user_by_email(email).await?.ok_or_else(invalid)?;
        let Some(mut challenge) = user.reset_password.take() else {
            return Err(invalid());
        };

        match check_otp(&mut challenge, otp, Utc::now(), self.otp_max_attempts) {
            OtpVerdict::Accepted => {
                user.password_hash = password_hash;
                self.db.save_user(&user).await?;
                info!("Password reset completed for account {}", user.id);
                Ok(user.profile())
            }
            OtpVerdict::Rejected => {
                user.reset_password = Some(challenge);
                self.db.save_user(&user).await?;
                Err(invalid())
            }
            OtpVerdict::Expired | OtpVerdict::Exhausted => {
                warn!("Discarding unusable reset OTP for account {}", user.id);
                self.db.save_user(&user).await?;
                Err(invalid())
            }
        }
    }

    pub fn authenticate(&self, token: &str) -> ClinicResult<Claims> {
        self.tokens.verify(token)
    }
}
