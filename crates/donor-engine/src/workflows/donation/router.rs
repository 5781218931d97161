use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{AppointmentId, DonorId, RegistrationId, StaffId};
use super::repository::DonationStore;
use super::service::{DonationService, LifecycleError, ManualConfirmation, RegistrationOutcome};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRequest {
    pub donor_id: DonorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub donor_id: DonorId,
    /// Present when staff register the donor on their behalf.
    #[serde(default)]
    pub staff_id: Option<StaffId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualDonationRequest {
    pub donor_id: DonorId,
    pub staff_id: StaffId,
    #[serde(default)]
    pub joined_marrow_registry: bool,
}

/// Router builder exposing the admin endpoints of the donation lifecycle.
pub fn donation_router<S>(service: Arc<DonationService<S>>) -> Router
where
    S: DonationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/appointments/:appointment_id/eligibility",
            post(eligibility_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/registrations",
            post(register_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/registrations/:donor_id",
            delete(cancel_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/donations",
            post(manual_confirmation_handler::<S>),
        )
        .route(
            "/api/v1/appointments/:appointment_id/recipients",
            get(recipients_handler::<S>),
        )
        .route(
            "/api/v1/registrations/:registration_id/confirmation",
            post(confirmation_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn eligibility_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path(appointment_id): Path<u64>,
    axum::Json(request): axum::Json<EligibilityRequest>,
) -> Response
where
    S: DonationStore + 'static,
{
    match service.check_eligibility(request.donor_id, AppointmentId(appointment_id)) {
        Ok(decision) => {
            let payload = json!({
                "eligible": decision.is_eligible(),
                "reason": decision.summary(),
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn register_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path(appointment_id): Path<u64>,
    axum::Json(request): axum::Json<RegistrationRequest>,
) -> Response
where
    S: DonationStore + 'static,
{
    let appointment_id = AppointmentId(appointment_id);
    let outcome = match request.staff_id {
        Some(staff) => service.register_as_administrator(request.donor_id, appointment_id, staff),
        None => service.register(request.donor_id, appointment_id),
    };

    match outcome {
        Ok(RegistrationOutcome::Registered(registration)) => {
            (StatusCode::CREATED, axum::Json(registration)).into_response()
        }
        Ok(RegistrationOutcome::Rejected(reason)) => {
            let payload = json!({
                "error": reason.summary(),
                "reason": reason,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path((appointment_id, donor_id)): Path<(u64, u64)>,
) -> Response
where
    S: DonationStore + 'static,
{
    match service.cancel_registration(DonorId(donor_id), AppointmentId(appointment_id)) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => {
            let payload = json!({
                "error": "no active registration for this donor",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn confirmation_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path(registration_id): Path<u64>,
) -> Response
where
    S: DonationStore + 'static,
{
    match service.confirm_donation(RegistrationId(registration_id)) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn manual_confirmation_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path(appointment_id): Path<u64>,
    axum::Json(request): axum::Json<ManualDonationRequest>,
) -> Response
where
    S: DonationStore + 'static,
{
    let confirmation = ManualConfirmation {
        donor_id: request.donor_id,
        appointment_id: AppointmentId(appointment_id),
        confirmed_by: request.staff_id,
        joined_marrow_registry: request.joined_marrow_registry,
    };
    match service.confirm_manually(confirmation) {
        Ok(receipt) => (StatusCode::OK, axum::Json(receipt)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recipients_handler<S>(
    State(service): State<Arc<DonationService<S>>>,
    Path(appointment_id): Path<u64>,
) -> Response
where
    S: DonationStore + 'static,
{
    match service.notification_recipients(AppointmentId(appointment_id)) {
        Ok(donors) => (StatusCode::OK, axum::Json(donors)).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: LifecycleError) -> Response {
    let status = if error.is_conflict() {
        StatusCode::CONFLICT
    } else if error.is_data_integrity() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
