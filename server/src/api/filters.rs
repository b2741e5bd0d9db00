// server/src/api/filters.rs
use std::convert::Infallible;

use warp::{Filter, Rejection};

use lib::auth::Claims;
use models::errors::ClinicError;
use models::medical::Role;

use crate::api::errors::reject;
use crate::api::state::AppState;

pub const MISSING_TOKEN_MESSAGE: &str = "Authentication required.";
pub const FORBIDDEN_MESSAGE: &str = "You do not have access to this resource.";
const MAX_JSON_BYTES: u64 = 64 * 1024;

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_JSON_BYTES).and(warp::body::json())
}

fn bearer_token(header: Option<&str>) -> Option<&str> {
    let header = header?.trim();
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

/// Any signed-in account.
pub fn with_auth(state: AppState) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            let token = bearer_token(header.as_deref())
                .ok_or_else(|| reject(ClinicError::Auth(MISSING_TOKEN_MESSAGE.to_string())))?;
            state.auth.authenticate(token).map_err(reject)
        })
}

pub fn with_role(state: AppState, role: Role) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    with_auth(state).and_then(move |claims: Claims| async move {
        if claims.role == role {
            Ok(claims)
        } else {
            Err(reject(ClinicError::Forbidden(FORBIDDEN_MESSAGE.to_string())))
        }
    })
}
