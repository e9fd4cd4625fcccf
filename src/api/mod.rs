pub mod bus;
pub mod error;
pub mod health;
pub mod routes;
pub mod ws;

pub use error::{ApiError, ErrorResponse};

use std::sync::Arc;

use axum::{routing::get, Router};
use utoipa::OpenApi;

use crate::cache::geometry::GeometryCache;
use crate::cache::vehicle_state::VehicleStateStore;
use crate::store::DurableStore;
use crate::tracking::TrackingService;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Live Bus Tracking API",
        description = "Real-time bus tracking: GPS ingest, map-matching, ETAs and live push",
        version = "0.1.0"
    ),
    paths(
        bus::update_location,
        bus::live,
        routes::route_with_polyline,
        health::health_check,
    ),
    components(schemas(
        crate::models::LocationReport,
        crate::models::VehicleUpdate,
        crate::models::SnappedLocation,
        crate::models::EtaStop,
        crate::models::VehicleStatus,
        crate::models::RouteWithPolyline,
        error::ErrorResponse,
        health::HealthResponse,
    )),
    tags(
        (name = "bus", description = "Vehicle ingest and live snapshots"),
        (name = "routes", description = "Stored route polylines"),
        (name = "health", description = "Service health check")
    )
)]
pub struct ApiDoc;

pub fn router(
    service: Arc<TrackingService>,
    store: DurableStore,
    geometry: Arc<GeometryCache>,
    vehicles: Arc<VehicleStateStore>,
) -> Router {
    let ws_state = ws::WsState {
        broadcaster: service.broadcaster().clone(),
    };

    Router::new()
        .nest("/bus", bus::router(service))
        .route(
            "/routes-with-polyline",
            get(routes::route_with_polyline).with_state(store),
        )
        .nest("/health", health::router(geometry, vehicles))
        .route("/ws/bus", get(ws::ws_bus).with_state(ws_state))
}
