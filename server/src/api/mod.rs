// server/src/api/mod.rs
//! REST API. Every route family takes the shared `AppState` and all
//! failures end in `handle_rejection`.

pub mod appointment_routes;
pub mod auth_routes;
pub mod errors;
pub mod filters;
pub mod health;
pub mod patient_routes;
pub mod predict_routes;
pub mod state;

use std::convert::Infallible;

use warp::{Filter, Reply};

pub use errors::{handle_rejection, ApiReject};
pub use state::AppState;

pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type", "authorization"])
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    auth_routes::auth_routes(state.clone())
        .or(patient_routes::patient_routes(state.clone()))
        .or(appointment_routes::appointment_routes(state.clone()))
        .or(predict_routes::predict_routes(state.clone()))
        .or(health::health_routes(state))
        .boxed()
        .with(cors)
        .recover(handle_rejection)
        .with(warp::log("clinic::api"))
}
