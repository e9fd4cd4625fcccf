use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::error::{ApiError, ErrorResponse};
use crate::models::{LocationReport, VehicleUpdate};
use crate::tracking::TrackingService;

/// Ingest a vehicle location report.
///
/// Updates the vehicle's hot state, snaps the position to the route
/// polyline, recomputes stop ETAs and pushes the composite update to the
/// route's subscribers.
#[utoipa::path(
    post,
    path = "/api/bus/update-location",
    request_body = LocationReport,
    responses(
        (status = 200, description = "Processed report with snapped position and ETAs", body = VehicleUpdate),
        (status = 400, description = "Malformed report", body = ErrorResponse),
        (status = 404, description = "Unknown vehicle", body = ErrorResponse),
        (status = 500, description = "Corrupt route data", body = ErrorResponse),
        (status = 503, description = "Store or cache unavailable", body = ErrorResponse)
    ),
    tag = "bus"
)]
pub async fn update_location(
    State(service): State<Arc<TrackingService>>,
    Json(report): Json<LocationReport>,
) -> Result<Json<VehicleUpdate>, ApiError> {
    Ok(Json(service.ingest(report).await?))
}

/// Live snapshot for one vehicle.
#[utoipa::path(
    get,
    path = "/api/bus/{id}/live",
    params(
        ("id" = String, Path, description = "Vehicle identifier")
    ),
    responses(
        (status = 200, description = "Current composite state; null position if the vehicle never reported", body = VehicleUpdate),
        (status = 404, description = "Unknown vehicle", body = ErrorResponse),
        (status = 503, description = "Store or cache unavailable", body = ErrorResponse)
    ),
    tag = "bus"
)]
pub async fn live(
    State(service): State<Arc<TrackingService>>,
    Path(id): Path<String>,
) -> Result<Json<VehicleUpdate>, ApiError> {
    Ok(Json(service.live_snapshot(&id).await?))
}

pub fn router(service: Arc<TrackingService>) -> Router {
    Router::new()
        .route("/update-location", post(update_location))
        .route("/{id}/live", get(live))
        .with_state(service)
}
