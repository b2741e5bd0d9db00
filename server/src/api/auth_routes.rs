// server/src/api/auth_routes.rs
use warp::{Filter, Rejection, Reply};

use lib::auth::auth_service::{OTP_SENT_MESSAGE, RESET_OK_MESSAGE, SIGNUP_OK_MESSAGE};
use logging_service::{AuditAction, AuditEntry};
use models::medical::{ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest};

use crate::api::errors::{message, ok, reject, ApiReply};
use crate::api::filters::{json_body, with_state};
use crate::api::state::AppState;

pub fn auth_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let signup = warp::path!("api" / "signup")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(signup);

    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(login);

    let forgot = warp::path!("api" / "forgot-password")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(forgot_password);

    let reset = warp::path!("api" / "reset-password")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state))
        .and_then(reset_password);

    signup.or(login).or(forgot).or(reset)
}

async fn signup(request: SignupRequest, state: AppState) -> ApiReply {
    let profile = state.auth.signup(request).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&profile.username, AuditAction::Signup).target(&profile.id))
        .await;
    ok(&message(SIGNUP_OK_MESSAGE))
}

async fn login(request: LoginRequest, state: AppState) -> ApiReply {
    let response = state.auth.login(request).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&response.user.username, AuditAction::Login).target(&response.user.id))
        .await;
    ok(&response)
}

async fn forgot_password(request: ForgotPasswordRequest, state: AppState) -> ApiReply {
    let profile = state.auth.forgot_password(request).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&profile.username, AuditAction::PasswordResetRequested).target(&profile.id))
        .await;
    ok(&message(OTP_SENT_MESSAGE))
}

async fn reset_password(request: ResetPasswordRequest, state: AppState) -> ApiReply {
    let profile = state.auth.reset_password(request).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&profile.username, AuditAction::PasswordReset).target(&profile.id))
        .await;
    ok(&message(RESET_OK_MESSAGE))
}
