//! Read-only access to the durable entities owned by the admin side.
//!
//! The live tracking core reads routes, stops, polylines and vehicle
//! registrations but never writes them; admin tooling owns all mutation.

use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow)]
pub struct VehicleRecord {
    pub vehicle_id: String,
    pub route_id: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct StopRecord {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PolylineRecord {
    pub route_id: String,
    pub route_name: String,
    pub geometry: String,
    pub distance: Option<f64>,
    pub duration: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct DurableStore {
    pool: SqlitePool,
}

impl DurableStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve a vehicle registration by id.
    pub async fn vehicle(&self, vehicle_id: &str) -> Result<Option<VehicleRecord>, StoreError> {
        let record = sqlx::query_as::<_, VehicleRecord>(
            "SELECT vehicle_id, route_id FROM vehicles WHERE vehicle_id = ?",
        )
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// The route's stops in traversal order.
    pub async fn stops_for_route(&self, route_id: &str) -> Result<Vec<StopRecord>, StoreError> {
        let stops = sqlx::query_as::<_, StopRecord>(
            "SELECT stop_id, name, lat, lng FROM stops WHERE route_id = ? ORDER BY sequence",
        )
        .bind(route_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stops)
    }

    /// The stored polyline for a route, if one has been synthesized.
    pub async fn polyline(&self, route_id: &str) -> Result<Option<PolylineRecord>, StoreError> {
        let record = sqlx::query_as::<_, PolylineRecord>(
            "SELECT route_id, route_name, geometry, distance, duration FROM polylines WHERE route_id = ?",
        )
        .bind(route_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Polyline lookup by display name, used by the admin read contract.
    pub async fn polyline_by_name(
        &self,
        route_name: &str,
    ) -> Result<Option<PolylineRecord>, StoreError> {
        let record = sqlx::query_as::<_, PolylineRecord>(
            "SELECT route_id, route_name, geometry, distance, duration FROM polylines WHERE route_name = ?",
        )
        .bind(route_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}
