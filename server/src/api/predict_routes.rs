// server/src/api/predict_routes.rs
use futures::TryStreamExt;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::{Buf, Filter, Rejection, Reply};

use lib::auth::Claims;
use logging_service::{AuditAction, AuditEntry};
use models::errors::{ClinicError, ClinicResult};
use models::medical::Role;

use crate::api::errors::{prediction_error_reply, ApiReply};
use crate::api::filters::{with_role, with_state};
use crate::api::state::AppState;

pub const IMAGE_FIELD: &str = "image";
/// Room for multipart boundaries and headers on top of the image itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

struct UploadedImage {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

pub fn predict_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    // The image size is enforced while the part streams in, so chunked
    // bodies without a Content-Length are accepted. A request without a
    // multipart body is answered like one without an image.
    let form = warp::multipart::form()
        .max_length(None)
        .map(Some)
        .or(warp::any().map(|| None::<FormData>))
        .unify();

    warp::path!("predict")
        .and(warp::post())
        .and(with_role(state.clone(), Role::Doctor))
        .and(warp::header::optional::<u64>("content-length"))
        .and(form)
        .and(with_state(state))
        .and_then(predict)
}

async fn predict(claims: Claims, declared_length: Option<u64>, form: Option<FormData>, state: AppState) -> ApiReply {
    let limit = state.predictions.max_upload_bytes();
    let body_limit = limit.saturating_add(MULTIPART_OVERHEAD_BYTES);
    let image = match (declared_length, form) {
        (Some(length), _) if length > body_limit => Err(ClinicError::PayloadTooLarge(format!(
            "Image exceeds the {} byte upload limit.",
            limit
        ))),
        (_, Some(form)) => read_image(form, limit).await,
        (_, None) => Ok(None),
    };
    let outcome = match image {
        Ok(Some(image)) => state.predictions.predict(&image.bytes, image.file_name.as_deref()).await,
        Ok(None) => Err(ClinicError::MissingUpload),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(prediction) => {
            state
                .record(AuditEntry::new(&claims.username, AuditAction::Prediction).detail(prediction.stage.clone()))
                .await;
            Ok(warp::reply::with_status(warp::reply::json(&prediction), StatusCode::OK))
        }
        Err(e) => Ok(prediction_error_reply(&e)),
    }
}

/// The first part named `image`; other parts are ignored.
async fn read_image(form: FormData, limit: u64) -> ClinicResult<Option<UploadedImage>> {
    let mut parts = Box::pin(form);
    while let Some(part) = parts
        .try_next()
        .await
        .map_err(|e| ClinicError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        if part.name() != IMAGE_FIELD {
            continue;
        }
        return read_part(part, limit).await.map(Some);
    }
    Ok(None)
}

async fn read_part(part: Part, limit: u64) -> ClinicResult<UploadedImage> {
    let file_name = part.filename().map(str::to_string);
    let mut stream = Box::pin(part.stream());
    let mut bytes = Vec::new();
    while let Some(chunk) = stream
        .try_next()
        .await
        .map_err(|e| ClinicError::InvalidRequest(format!("Malformed multipart body: {}", e)))?
    {
        bytes.extend_from_slice(chunk.chunk());
        if bytes.len() as u64 > limit {
            return Err(ClinicError::PayloadTooLarge(format!(
                "Image exceeds the {} byte upload limit.",
                limit
            )));
        }
    }
    Ok(UploadedImage { bytes, file_name })
}
