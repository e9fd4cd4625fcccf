//! The live tracking engine: ingest and live-query pipelines.
//!
//! Ingest: validate -> resolve vehicle -> hot-state write -> geometry lookup
//! -> map-match -> ETAs -> broadcast -> respond. Live query runs the same
//! compute path from the stored hot state without writing or broadcasting.

pub mod eta;
pub mod liveness;
pub mod map_match;

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::cache::geometry::{GeometryCache, GeometryError};
use crate::cache::vehicle_state::{VehicleLiveState, VehicleStateStore};
use crate::config::TrackingConfig;
use crate::models::{LocationReport, SnappedLocation, VehicleStatus, VehicleUpdate};
use crate::store::{DurableStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    /// Malformed request; never retried.
    #[error("{0}")]
    Validation(String),
    /// Unknown vehicle or route binding; nothing was written.
    #[error("Bus {0} not found")]
    UnknownVehicle(String),
    /// Store or cache unavailable; devices queue and replay on this.
    #[error("Transient backend failure: {0}")]
    Transient(String),
    /// Corrupt admin data (undecodable polyline, stop off the line).
    #[error("Data invariant violated: {0}")]
    Invariant(String),
}

impl From<StoreError> for TrackingError {
    fn from(e: StoreError) -> Self {
        TrackingError::Transient(e.to_string())
    }
}

pub struct TrackingService {
    store: DurableStore,
    geometry: Arc<GeometryCache>,
    vehicles: Arc<VehicleStateStore>,
    broadcaster: Broadcaster,
    config: TrackingConfig,
}

impl TrackingService {
    pub fn new(
        store: DurableStore,
        geometry: Arc<GeometryCache>,
        vehicles: Arc<VehicleStateStore>,
        broadcaster: Broadcaster,
        config: TrackingConfig,
    ) -> Self {
        Self {
            store,
            geometry,
            vehicles,
            broadcaster,
            config,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn geometry(&self) -> &GeometryCache {
        &self.geometry
    }

    pub fn vehicles(&self) -> &VehicleStateStore {
        &self.vehicles
    }

    /// Process one location report and fan the resulting update out to the
    /// route's room. Exactly one event is emitted per successful ingest.
    pub async fn ingest(&self, report: LocationReport) -> Result<VehicleUpdate, TrackingError> {
        if report.bus_id.trim().is_empty() {
            return Err(TrackingError::Validation("busId must not be empty".into()));
        }
        if !report.lat.is_finite() || !report.lng.is_finite() {
            return Err(TrackingError::Validation(
                "lat and lng must be finite numbers".into(),
            ));
        }

        let vehicle = self
            .store
            .vehicle(&report.bus_id)
            .await?
            .ok_or_else(|| TrackingError::UnknownVehicle(report.bus_id.clone()))?;

        let now = Utc::now();
        let state = self
            .vehicles
            .record_report(
                &report.bus_id,
                &vehicle.route_id,
                report.lat,
                report.lng,
                report.speed,
                now,
            )
            .await;

        // The report just happened, so the vehicle is trivially online
        // regardless of the staleness threshold.
        let update = self
            .compose(&report.bus_id, &vehicle.route_id, Some(&state), now, true)
            .await?;

        info!(
            bus_id = %report.bus_id,
            route_id = %vehicle.route_id,
            avg_speed = update.avg_speed,
            "Processed location report"
        );
        self.broadcaster.emit(&vehicle.route_id, update.clone());

        Ok(update)
    }

    /// On-demand snapshot for one vehicle. A known vehicle that has never
    /// reported yields the null composite, not an error.
    pub async fn live_snapshot(&self, bus_id: &str) -> Result<VehicleUpdate, TrackingError> {
        let vehicle = self
            .store
            .vehicle(bus_id)
            .await?
            .ok_or_else(|| TrackingError::UnknownVehicle(bus_id.to_string()))?;

        let state = self.vehicles.read_state(bus_id).await;
        self.compose(bus_id, &vehicle.route_id, state.as_ref(), Utc::now(), false)
            .await
    }

    async fn compose(
        &self,
        bus_id: &str,
        route_id: &str,
        state: Option<&VehicleLiveState>,
        now: DateTime<Utc>,
        just_reported: bool,
    ) -> Result<VehicleUpdate, TrackingError> {
        let Some(state) = state else {
            return Ok(VehicleUpdate {
                success: true,
                bus_id: bus_id.to_string(),
                route_id: route_id.to_string(),
                snapped_location: None,
                avg_speed: 0.0,
                last_updated: None,
                eta_stops: vec![],
                status: VehicleStatus::Offline,
            });
        };

        let avg_speed = state.avg_speed();
        let raw = SnappedLocation {
            lat: state.lat,
            lng: state.lng,
        };

        // Geometry problems degrade the payload to the raw position instead
        // of failing the request: the hot state is already written, and a
        // fresh position without ETAs beats an error. Corrupt admin data is
        // the exception and surfaces as an invariant failure.
        let (snapped_location, eta_stops) = match self.geometry.get(route_id).await {
            Ok(geometry) => {
                match map_match::snap_to_polyline(&geometry.coords, state.lng, state.lat) {
                    Some(matched) => (
                        SnappedLocation {
                            lat: matched.lat,
                            lng: matched.lng,
                        },
                        eta::eta_stops(
                            matched.offset_km,
                            &geometry.stops,
                            avg_speed,
                            self.config.min_speed_floor_kmh,
                        ),
                    ),
                    None => (raw, vec![]),
                }
            }
            Err(GeometryError::NotFound(_)) => {
                debug!(route_id = %route_id, "No polyline for route, serving raw position");
                (raw, vec![])
            }
            Err(GeometryError::Store(e)) => {
                warn!(route_id = %route_id, error = %e, "Geometry load failed, serving raw position");
                (raw, vec![])
            }
            Err(GeometryError::Invariant(msg)) => return Err(TrackingError::Invariant(msg)),
        };

        let status = if just_reported {
            VehicleStatus::Online
        } else {
            liveness::classify(
                Some(state.last_updated),
                now,
                self.config.staleness_threshold_seconds,
            )
        };

        Ok(VehicleUpdate {
            success: true,
            bus_id: bus_id.to_string(),
            route_id: route_id.to_string(),
            snapped_location: Some(snapped_location),
            avg_speed,
            last_updated: Some(
                state
                    .last_updated
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            eta_stops,
            status,
        })
    }
}
