// lib/src/auth/otp.rs
//! Six-digit one-time passwords for password reset.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use models::medical::OtpChallenge;

pub const OTP_MIN: u32 = 100_000;
pub const OTP_MAX: u32 = 999_999;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpVerdict {
    Accepted,
    Rejected,
    Expired,
    /// Too many wrong guesses; the challenge must be discarded.
    Exhausted,
}

pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(OTP_MIN..=OTP_MAX).to_string()
}

pub fn digest_otp(otp: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(otp.trim().as_bytes()))
}

pub fn issue_challenge(otp: &str, now: DateTime<Utc>, ttl_minutes: i64) -> OtpChallenge {
    OtpChallenge {
        digest: digest_otp(otp),
        expires_at: now + Duration::minutes(ttl_minutes),
        failed_attempts: 0,
    }
}

/// Checks `candidate`, counting a failed attempt on mismatch.
pub fn check_otp(
    challenge: &mut OtpChallenge,
    candidate: &str,
    now: DateTime<Utc>,
    max_attempts: u32,
) -> OtpVerdict {
    if challenge.is_expired(now) {
        return OtpVerdict::Expired;
    }
    if challenge.failed_attempts >= max_attempts {
        return OtpVerdict::Exhausted;
    }
    if digests_match(&digest_otp(candidate), &challenge.digest) {
        return OtpVerdict::Accepted;
    }
    challenge.failed_attempts += 1;
    if challenge.failed_attempts >= max_attempts {
        OtpVerdict::Exhausted
    } else {
        OtpVerdict::Rejected
    }
}

fn digests_match(candidate: &str, stored: &str) -> bool {
    candidate.as_bytes().ct_eq(stored.as_bytes()).into()
}
