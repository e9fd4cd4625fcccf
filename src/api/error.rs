use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::tracking::TrackingError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Renders the tracking error taxonomy onto HTTP statuses: validation 400,
/// unknown vehicle 404, transient 503, invariant 500.
#[derive(Debug)]
pub struct ApiError(pub TrackingError);

impl From<TrackingError> for ApiError {
    fn from(e: TrackingError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackingError::Validation(_) => StatusCode::BAD_REQUEST,
            TrackingError::UnknownVehicle(_) => StatusCode::NOT_FOUND,
            TrackingError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            TrackingError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
