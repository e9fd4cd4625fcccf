//! Per-route hot store of decoded geometry.
//!
//! Entries hold the decoded polyline in (lng, lat) order, the ordered stop
//! list, and each stop's precomputed arc-length offset. Entries are loaded
//! lazily from the durable store and are effectively immutable afterwards;
//! invalidation (after an admin replaces a polyline) is the only mutator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use geo::Coord;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::{DurableStore, StoreError};
use crate::tracking::map_match::{haversine_km, polyline_length_km, snap_to_polyline};

/// A stop more than this far off its route polyline is corrupt admin data.
const MAX_STOP_SNAP_KM: f64 = 1.0;
/// Expected proximity of the polyline endpoints to the terminal stops.
const ENDPOINT_TOLERANCE_KM: f64 = 0.25;

/// A route stop annotated with its arc-length offset along the polyline.
#[derive(Debug, Clone)]
pub struct StopWithOffset {
    pub stop_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub offset_km: f64,
}

/// Decoded geometry for one route.
#[derive(Debug)]
pub struct RouteGeometry {
    pub route_id: String,
    /// Polyline vertices in (lng, lat) order, matching the matcher convention
    pub coords: Vec<Coord<f64>>,
    /// Stops in traversal order with precomputed offsets
    pub stops: Vec<StopWithOffset>,
    pub total_km: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("no polyline computed for route {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("route geometry invariant violated: {0}")]
    Invariant(String),
}

struct CachedGeometry {
    geometry: Arc<RouteGeometry>,
    loaded_at: Instant,
}

pub struct GeometryCache {
    store: DurableStore,
    ttl: Option<Duration>,
    entries: RwLock<HashMap<String, CachedGeometry>>,
}

impl GeometryCache {
    pub fn new(store: DurableStore, ttl: Option<Duration>) -> Self {
        Self {
            store,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the decoded geometry for a route, loading it from the durable
    /// store on a cache miss. Concurrent misses may load redundantly; the
    /// last writer's entry is adopted by all later readers.
    pub async fn get(&self, route_id: &str) -> Result<Arc<RouteGeometry>, GeometryError> {
        if let Some(hit) = self.lookup(route_id).await {
            return Ok(hit);
        }

        let geometry = Arc::new(self.load(route_id).await?);
        debug!(
            route_id = %route_id,
            vertices = geometry.coords.len(),
            stops = geometry.stops.len(),
            total_km = geometry.total_km,
            "Cached route geometry"
        );

        let mut entries = self.entries.write().await;
        entries.insert(
            route_id.to_string(),
            CachedGeometry {
                geometry: geometry.clone(),
                loaded_at: Instant::now(),
            },
        );

        Ok(geometry)
    }

    /// Drop a route's cached geometry. Used when an admin action replaces
    /// the stored polyline.
    pub async fn invalidate(&self, route_id: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(route_id).is_some() {
            debug!(route_id = %route_id, "Invalidated cached route geometry");
        }
    }

    /// Number of routes currently cached.
    pub async fn cached_routes(&self) -> usize {
        self.entries.read().await.len()
    }

    async fn lookup(&self, route_id: &str) -> Option<Arc<RouteGeometry>> {
        let entries = self.entries.read().await;
        let cached = entries.get(route_id)?;
        if let Some(ttl) = self.ttl {
            if cached.loaded_at.elapsed() > ttl {
                return None;
            }
        }
        Some(cached.geometry.clone())
    }

    async fn load(&self, route_id: &str) -> Result<RouteGeometry, GeometryError> {
        let polyline_record = self
            .store
            .polyline(route_id)
            .await?
            .ok_or_else(|| GeometryError::NotFound(route_id.to_string()))?;

        let line = polyline::decode_polyline(&polyline_record.geometry, 5).map_err(|e| {
            GeometryError::Invariant(format!("undecodable polyline for route {route_id}: {e}"))
        })?;
        // The decoder yields (x, y) = (lng, lat), the matcher convention.
        let coords: Vec<Coord<f64>> = line.coords().copied().collect();
        if coords.len() < 2 {
            return Err(GeometryError::Invariant(format!(
                "polyline for route {route_id} has {} vertices, need at least 2",
                coords.len()
            )));
        }

        let stop_records = self.store.stops_for_route(route_id).await?;
        if stop_records.len() < 2 {
            warn!(
                route_id = %route_id,
                stops = stop_records.len(),
                "Route has fewer than two stops"
            );
        }

        let mut stops = Vec::with_capacity(stop_records.len());
        for record in stop_records {
            let matched = snap_to_polyline(&coords, record.lng, record.lat).ok_or_else(|| {
                GeometryError::Invariant(format!("polyline for route {route_id} is degenerate"))
            })?;
            if matched.distance_km > MAX_STOP_SNAP_KM {
                return Err(GeometryError::Invariant(format!(
                    "stop {} on route {route_id} lies {:.2} km off the polyline",
                    record.stop_id, matched.distance_km
                )));
            }
            stops.push(StopWithOffset {
                stop_id: record.stop_id,
                name: record.name,
                lat: record.lat,
                lng: record.lng,
                offset_km: matched.offset_km,
            });
        }

        if let (Some(first), Some(last)) = (stops.first(), stops.last()) {
            let first_coord = coords[0];
            let last_coord = coords[coords.len() - 1];
            let origin_gap = haversine_km(first_coord, Coord { x: first.lng, y: first.lat });
            let terminus_gap = haversine_km(last_coord, Coord { x: last.lng, y: last.lat });
            if origin_gap > ENDPOINT_TOLERANCE_KM || terminus_gap > ENDPOINT_TOLERANCE_KM {
                warn!(
                    route_id = %route_id,
                    origin_gap_km = origin_gap,
                    terminus_gap_km = terminus_gap,
                    "Polyline endpoints are far from the terminal stops"
                );
            }
        }

        let total_km = polyline_length_km(&coords);

        Ok(RouteGeometry {
            route_id: route_id.to_string(),
            coords,
            stops,
            total_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn seeded_store() -> (DurableStore, SqlitePool) {
        // One pinned connection keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        sqlx::query("INSERT INTO routes (route_id, route_name) VALUES ('R1', 'Blue Line')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO stops (route_id, stop_id, name, lat, lng, sequence) VALUES \
             ('R1', 'S1', 'Connaught Place', 28.6328, 77.2197, 0), \
             ('R1', 'S2', 'Anand Vihar', 28.628, 77.3649, 1)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let line: LineString<f64> = vec![(77.2197, 28.6328), (77.3649, 28.628)].into();
        let encoded = polyline::encode_coordinates(line, 5).unwrap();
        sqlx::query("INSERT INTO polylines (route_id, route_name, geometry) VALUES ('R1', 'Blue Line', ?)")
            .bind(&encoded)
            .execute(&pool)
            .await
            .unwrap();

        (DurableStore::new(pool.clone()), pool)
    }

    #[tokio::test]
    async fn miss_loads_decodes_and_caches() {
        let (store, _pool) = seeded_store().await;
        let cache = GeometryCache::new(store, None);
        assert_eq!(cache.cached_routes().await, 0);

        let geometry = cache.get("R1").await.unwrap();
        assert_eq!(geometry.coords.len(), 2);
        // (lng, lat) order
        assert!((geometry.coords[0].x - 77.2197).abs() < 1e-4);
        assert!((geometry.coords[0].y - 28.6328).abs() < 1e-4);
        assert_eq!(geometry.stops.len(), 2);
        assert_eq!(geometry.stops[0].stop_id, "S1");
        assert_eq!(geometry.stops[0].offset_km, 0.0);
        assert!((geometry.stops[1].offset_km - geometry.total_km).abs() < 1e-6);
        assert_eq!(cache.cached_routes().await, 1);
    }

    #[tokio::test]
    async fn hit_returns_shared_entry() {
        let (store, _pool) = seeded_store().await;
        let cache = GeometryCache::new(store, None);
        let first = cache.get("R1").await.unwrap();
        let second = cache.get("R1").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn missing_polyline_is_not_found() {
        let (store, _pool) = seeded_store().await;
        let cache = GeometryCache::new(store, None);
        let err = cache.get("R9").await.unwrap_err();
        assert!(matches!(err, GeometryError::NotFound(_)));
        assert_eq!(cache.cached_routes().await, 0);
    }

    #[tokio::test]
    async fn undecodable_polyline_is_invariant_error() {
        let (store, pool) = seeded_store().await;
        // Overwrite with bytes that cannot be a precision-5 polyline.
        sqlx::query("UPDATE polylines SET geometry = ? WHERE route_id = 'R1'")
            .bind("\u{1}\u{2}")
            .execute(&pool)
            .await
            .unwrap();

        let cache = GeometryCache::new(store, None);
        let err = cache.get("R1").await.unwrap_err();
        assert!(matches!(err, GeometryError::Invariant(_)));
    }

    #[tokio::test]
    async fn off_polyline_stop_is_invariant_error() {
        let (store, pool) = seeded_store().await;
        sqlx::query(
            "INSERT INTO stops (route_id, stop_id, name, lat, lng, sequence) VALUES \
             ('R1', 'S3', 'Wrong City', 12.9716, 77.5946, 2)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let cache = GeometryCache::new(store, None);
        let err = cache.get("R1").await.unwrap_err();
        assert!(matches!(err, GeometryError::Invariant(_)));
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let (store, _pool) = seeded_store().await;
        let cache = GeometryCache::new(store, None);
        let first = cache.get("R1").await.unwrap();
        cache.invalidate("R1").await;
        assert_eq!(cache.cached_routes().await, 0);
        let second = cache.get("R1").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
