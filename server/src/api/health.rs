// server/src/api/health.rs
use serde_json::json;
use warp::{Filter, Rejection, Reply};

use crate::api::errors::{ok, ApiReply};
use crate::api::filters::with_state;
use crate::api::state::AppState;

pub fn health_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("health")
        .and(warp::get())
        .and(with_state(state))
        .and_then(|state: AppState| async move { health(state) })
}

fn health(state: AppState) -> ApiReply {
    ok(&json!({ "status": "ok", "storage": state.db.engine_type() }))
}
