// server/src/api/appointment_routes.rs
use serde_json::json;
use warp::{Filter, Rejection, Reply};

use lib::auth::Claims;
use logging_service::{AuditAction, AuditEntry};
use models::medical::{AppointmentUpdate, BookAppointmentRequest, DiagnosisUpdate, Role};

use crate::api::errors::{created, message, ok, reject, ApiReply};
use crate::api::filters::{json_body, with_auth, with_role, with_state};
use crate::api::state::AppState;

pub const ARCHIVED_MESSAGE: &str = "Appointment archived successfully";
pub const DELETED_MESSAGE: &str = "Appointment deleted successfully";

pub fn appointment_routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let book = warp::path!("api" / "appointments")
        .and(warp::post())
        .and(with_auth(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(book_appointment);

    let active = warp::path!("api" / "appointmentdetails")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_active);

    let archived = warp::path!("api" / "appointments" / "archived")
        .and(warp::get())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(list_archived);

    let diagnose = warp::path!("api" / "appointment" / String)
        .and(warp::put())
        .and(with_role(state.clone(), Role::Doctor))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(save_diagnosis);

    let update = warp::path!("api" / "appointment" / "update" / String)
        .and(warp::put())
        .and(with_auth(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(update_details);

    let archive = warp::path!("api" / "appointment" / "archive" / String)
        .and(warp::put())
        .and(with_auth(state.clone()))
        .and(with_state(state.clone()))
        .and_then(archive_appointment);

    let delete = warp::path!("api" / "appointment" / String)
        .and(warp::delete())
        .and(with_auth(state.clone()))
        .and(with_state(state))
        .and_then(delete_appointment);

    book.or(active)
        .or(archived)
        .or(diagnose)
        .or(update)
        .or(archive)
        .or(delete)
}

async fn book_appointment(claims: Claims, request: BookAppointmentRequest, state: AppState) -> ApiReply {
    let confirmation = state.appointments.book(request).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&claims.username, AuditAction::Booking).target(&confirmation.patient_id))
        .await;
    created(&confirmation)
}

async fn list_active(_claims: Claims, state: AppState) -> ApiReply {
    let appointments = state.appointments.list_active().await.map_err(reject)?;
    ok(&appointments)
}

async fn list_archived(_claims: Claims, state: AppState) -> ApiReply {
    let appointments = state.appointments.list_archived().await.map_err(reject)?;
    ok(&appointments)
}

async fn save_diagnosis(id: String, claims: Claims, update: DiagnosisUpdate, state: AppState) -> ApiReply {
    let appointment = state.appointments.save_diagnosis(&id, update).await.map_err(reject)?;
    let stage = appointment.disease_stage.clone().unwrap_or_default();
    state
        .record(
            AuditEntry::new(&claims.username, AuditAction::Diagnosis)
                .target(&appointment.id)
                .detail(stage),
        )
        .await;
    ok(&appointment)
}

async fn update_details(id: String, claims: Claims, update: AppointmentUpdate, state: AppState) -> ApiReply {
    let appointment = state.appointments.update_details(&id, update).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&claims.username, AuditAction::AppointmentUpdate).target(&appointment.id))
        .await;
    ok(&appointment)
}

async fn archive_appointment(id: String, claims: Claims, state: AppState) -> ApiReply {
    let appointment = state.appointments.archive(&id).await.map_err(reject)?;
    state
        .record(AuditEntry::new(&claims.username, AuditAction::Archive).target(&appointment.id))
        .await;
    ok(&json!({ "message": ARCHIVED_MESSAGE, "appointment": appointment }))
}

async fn delete_appointment(id: String, claims: Claims, state: AppState) -> ApiReply {
    let appointment = state.appointments.delete(&id).await.map_err(reject)?;
    state
        .record(
            AuditEntry::new(&claims.username, AuditAction::Delete)
                .target(&appointment.id)
                .detail(appointment.patient_id.to_string()),
        )
        .await;
    ok(&message(DELETED_MESSAGE))
}
