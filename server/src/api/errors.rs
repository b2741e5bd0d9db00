// server/src/api/errors.rs
//! Maps `ClinicError` onto HTTP statuses and JSON bodies.

use std::convert::Infallible;

use log::{error, warn};
use serde_json::json;
use warp::http::StatusCode;
use warp::reject::Reject;
use warp::reply::{Json, WithStatus};
use warp::{Rejection, Reply};

use models::errors::{ClinicError, ValidationError};

/// Unified return type of the JSON handlers.
pub type ApiReply = Result<WithStatus<Json>, Rejection>;

#[derive(Debug)]
pub struct ApiReject(pub ClinicError);

impl Reject for ApiReject {}

pub fn reject(error: ClinicError) -> Rejection {
    warp::reject::custom(ApiReject(error))
}

pub fn status_for(error: &ClinicError) -> StatusCode {
    match error {
        ClinicError::InvalidRequest(_) | ClinicError::MissingUpload => StatusCode::BAD_REQUEST,
        ClinicError::Validation(ValidationError::InvalidStatusTransition { .. }) => StatusCode::CONFLICT,
        ClinicError::Validation(_) => StatusCode::BAD_REQUEST,
        ClinicError::AlreadyExists(_) | ClinicError::Conflict(_) => StatusCode::CONFLICT,
        ClinicError::NotFound(_) => StatusCode::NOT_FOUND,
        ClinicError::Auth(_) => StatusCode::UNAUTHORIZED,
        ClinicError::Forbidden(_) => StatusCode::FORBIDDEN,
        ClinicError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn ok<T: serde::Serialize>(body: &T) -> ApiReply {
    Ok(warp::reply::with_status(warp::reply::json(body), StatusCode::OK))
}

pub fn created<T: serde::Serialize>(body: &T) -> ApiReply {
    Ok(warp::reply::with_status(warp::reply::json(body), StatusCode::CREATED))
}

pub fn message(text: &str) -> serde_json::Value {
    json!({ "message": text })
}

/// `{"message": ...}` body for every error except the predictor's.
pub fn error_reply(error: &ClinicError) -> WithStatus<Json> {
    let status = status_for(error);
    if status.is_server_error() {
        error!("Request failed: {}", error);
    }
    warp::reply::with_status(warp::reply::json(&message(&error.public_message())), status)
}

/// `/predict` keeps the `{"error", "details"}` shape clients expect from it.
pub fn prediction_error_reply(error: &ClinicError) -> WithStatus<Json> {
    let status = status_for(error);
    let body = match error {
        ClinicError::PredictionError { message, details: Some(details) } => {
            json!({ "error": message, "details": details })
        }
        other => json!({ "error": other.public_message() }),
    };
    if status.is_server_error() {
        error!("Prediction failed: {}", error);
    }
    warp::reply::with_status(warp::reply::json(&body), status)
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(ApiReject(error)) = err.find::<ApiReject>() {
        return Ok(error_reply(error));
    }

    let (status, text) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        warn!("Rejected request body: {}", e);
        (StatusCode::BAD_REQUEST, "Invalid request body.".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "Invalid query string.".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large.".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "Content-Length required.".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported media type.".to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_string())
    };
    Ok(warp::reply::with_status(warp::reply::json(&message(&text)), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kinds() {
        assert_eq!(status_for(&ClinicError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(status_for(&ClinicError::Auth("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(&ClinicError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&ClinicError::MissingUpload), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&ClinicError::StorageError("disk".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        let transition = ValidationError::InvalidStatusTransition {
            from: "Completed".into(),
            to: "Scheduled".into(),
        };
        assert_eq!(status_for(&transition.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&ValidationError::RequiredField("Gender".into()).into()),
            StatusCode::BAD_REQUEST
        );
    }
}
