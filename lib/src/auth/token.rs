// lib/src/auth/token.rs
//! HS256 JSON Web Tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use models::errors::{ClinicError, ClinicResult};
use models::identifiers::RecordId;
use models::medical::{Role, User};

type HmacSha256 = Hmac<Sha256>;

pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: RecordId,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: i64) -> ClinicResult<Self> {
        if secret.is_empty() {
            return Err(ClinicError::ConfigurationError("JWT secret must not be empty".into()));
        }
        Ok(TokenIssuer {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::minutes(ttl_minutes),
        })
    }

    fn mac(&self) -> ClinicResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ClinicError::InternalError(format!("Failed to create HMAC: {}", e)))
    }

    pub fn issue(&self, user: &User) -> ClinicResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.encode(&claims)
    }

    pub fn encode(&self, claims: &Claims) -> ClinicResult<String> {
        let header = JwtHeader {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let claims_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let message = format!("{}.{}", header_b64, claims_b64);

        let mut mac = self.mac()?;
        mac.update(message.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", message, signature_b64))
    }

    pub fn verify(&self, token: &str) -> ClinicResult<Claims> {
        let invalid = || ClinicError::Auth(INVALID_TOKEN_MESSAGE.to_string());

        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let header: JwtHeader = URL_SAFE_NO_PAD
            .decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;
        if header.alg != "HS256" {
            return Err(invalid());
        }

        let claims: Claims = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or_else(invalid)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(invalid());
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::new("dr. grey", "grey@clinic.org", "hash".into(), role)
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new("secret", 60).unwrap();
        let doctor = user(Role::Doctor);
        let claims = issuer.verify(&issuer.issue(&doctor).unwrap()).unwrap();
        assert_eq!(claims.sub, doctor.id);
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let token = TokenIssuer::new("one", 60).unwrap().issue(&user(Role::Doctor)).unwrap();
        let err = TokenIssuer::new("two", 60).unwrap().verify(&token).unwrap_err();
        assert!(matches!(err, ClinicError::Auth(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new("secret", 60).unwrap();
        let now = Utc::now().timestamp();
        let token = issuer
            .encode(&Claims {
                sub: RecordId::new(),
                username: "x".into(),
                role: Role::Receptionist,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();
        assert!(issuer.verify(&token).is_err());
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let issuer = TokenIssuer::new("secret", 60).unwrap();
        let token = issuer.issue(&user(Role::Receptionist)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_claims = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&serde_json::json!({
                "sub": RecordId::new(), "username": "x", "role": "doctor",
                "iat": 0, "exp": i64::MAX
            }))
            .unwrap(),
        );
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);
        assert!(issuer.verify(&forged).is_err());
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let issuer = TokenIssuer::new("secret", 60).unwrap();
        for token in ["", "a.b", "a.b.c.d", "not a token"] {
            assert!(issuer.verify(token).is_err(), "{:?} accepted", token);
        }
    }
}
