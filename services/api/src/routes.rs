use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use donor_engine::error::AppError;
use donor_engine::workflows::campaign::{AppointmentAnnouncer, NotificationChannel};
use donor_engine::workflows::donation::{
    donation_router, AppointmentId, DonationService, DonationStore,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_donation_routes<S, C>(
    service: Arc<DonationService<S>>,
    announcer: Arc<AppointmentAnnouncer<S, C>>,
) -> axum::Router
where
    S: DonationStore + 'static,
    C: NotificationChannel + 'static,
{
    donation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/appointments/:appointment_id/announcement",
            axum::routing::post(announcement_endpoint::<S, C>),
        )
        .layer(Extension(announcer))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn announcement_endpoint<S, C>(
    Extension(announcer): Extension<Arc<AppointmentAnnouncer<S, C>>>,
    Path(appointment_id): Path<u64>,
) -> Result<Json<serde_json::Value>, AppError>
where
    S: DonationStore + 'static,
    C: NotificationChannel + 'static,
{
    let report = announcer.announce(AppointmentId(appointment_id)).await?;
    Ok(Json(json!({
        "appointment_id": appointment_id,
        "attempted": report.attempted(),
        "succeeded": report.succeeded,
        "failed": report.failed,
    })))
}
