// lib/src/auth/password.rs
use log::warn;
use tokio::task;

use models::errors::{ClinicError, ClinicResult};

/// bcrypt is deliberately slow, so both calls run on the blocking pool.
pub async fn hash_password(password: &str, cost: u32) -> ClinicResult<String> {
    let password = password.to_string();
    task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await?
        .map_err(|e| ClinicError::InternalError(format!("password hashing failed: {}", e)))
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: &str, password_hash: &str) -> ClinicResult<bool> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    let outcome = task::spawn_blocking(move || bcrypt::verify(password, &password_hash)).await?;
    match outcome {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash could not be checked: {}", e);
            Ok(false)
        }
    }
}
