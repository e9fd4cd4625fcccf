use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

use crate::api::error::ErrorResponse;
use crate::models::RouteWithPolyline;
use crate::store::DurableStore;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RouteNameQuery {
    /// Display name of the route
    pub route_name: String,
}

/// Fetch the stored polyline for a route by display name.
///
/// This is the read contract the geometry cache relies on; polyline
/// synthesis itself is an admin action outside this service.
#[utoipa::path(
    get,
    path = "/api/routes-with-polyline",
    params(RouteNameQuery),
    responses(
        (status = 200, description = "Stored polyline document", body = RouteWithPolyline),
        (status = 404, description = "No polyline synthesized for the route", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn route_with_polyline(
    State(store): State<DurableStore>,
    Query(query): Query<RouteNameQuery>,
) -> Result<Json<RouteWithPolyline>, (StatusCode, Json<ErrorResponse>)> {
    debug!(route_name = %query.route_name, "Fetching stored polyline");

    let record = store
        .polyline_by_name(&query.route_name)
        .await
        .map_err(|e| {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;

    let record = record.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No polyline for route '{}'", query.route_name),
            }),
        )
    })?;

    Ok(Json(RouteWithPolyline {
        id: record.route_id,
        route_name: record.route_name,
        geometry: record.geometry,
        distance: record.distance,
        duration: record.duration,
    }))
}
