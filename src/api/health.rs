use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::geometry::GeometryCache;
use crate::cache::vehicle_state::VehicleStateStore;

#[derive(Clone)]
pub struct HealthState {
    pub geometry: Arc<GeometryCache>,
    pub vehicles: Arc<VehicleStateStore>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Number of vehicles with live state
    pub tracked_vehicles: usize,
    /// Number of routes with cached geometry
    pub cached_routes: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        tracked_vehicles: state.vehicles.tracked_vehicles().await,
        cached_routes: state.geometry.cached_routes().await,
    })
}

pub fn router(geometry: Arc<GeometryCache>, vehicles: Arc<VehicleStateStore>) -> Router {
    let state = HealthState { geometry, vehicles };
    Router::new()
        .route("/", get(health_check))
        .with_state(state)
}
