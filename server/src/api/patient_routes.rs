// server/src/api/patient_routes.rs
use serde::Deserialize;
use warp::{Filter, Rejection, Reply};

use lib::auth::Claims;

use crate::api::errors::{ok, reject, ApiReply};
use crate::api::filters::{with_auth, with_state};
use crate::api::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

pub fn patient_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let search = warp::path!("api" / "patients" / "search")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(warp::query::<SearchQuery>())
        .and(with_state(state.clone()))
        .and_then(search_patients);

    let list = warp::path!("api" / "patients")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_patients);

    let get = warp::path!("api" / "patient" / String)
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(get_patient);

    let history = warp::path!("api" / "patient" / String / "history")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state))
        .and_then(patient_history);

    search.or(list).or(get).or(history)
}

async fn search_patients(_claims: Claims, query: SearchQuery, state: AppState) -> ApiReply {
    let q = query.q.unwrap_or_default();
    let found = state.patients.search_patients(&q).await.map_err(reject)?;
    ok(&found)
}

async fn list_patients(_claims: Claims, state: AppState) -> ApiReply {
    let patients = state.patients.list_patients().await.map_err(reject)?;
    ok(&patients)
}

async fn get_patient(patient_id: String, _claims: Claims, state: AppState) -> ApiReply {
    let patient = state.patients.get_patient(&patient_id).await.map_err(reject)?;
    ok(&patient)
}

async fn patient_history(patient_id: String, _claims: Claims, state: AppState) -> ApiReply {
    let history = state.patients.patient_history(&patient_id).await.map_err(reject)?;
    ok(&history)
}
