//! Per-vehicle hot state: last position, last report time and the bounded
//! ring of recent raw speeds.
//!
//! The store is the authority for live state; losing it is non-fatal since
//! the next report rehydrates the record (the smoothed speed restarts).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// Hot record for one vehicle, created on its first report.
#[derive(Debug, Clone)]
pub struct VehicleLiveState {
    /// Echo of the route binding resolved at ingest; the durable vehicle
    /// record stays authoritative.
    pub route_id: String,
    pub lat: f64,
    pub lng: f64,
    /// Server receive time of the last report
    pub last_updated: DateTime<Utc>,
    /// Recent raw speed samples, newest first, bounded by the ring size
    pub speeds: Vec<f64>,
}

impl VehicleLiveState {
    /// Arithmetic mean of the speed ring, rounded to one decimal.
    /// 0.0 for an empty ring.
    pub fn avg_speed(&self) -> f64 {
        if self.speeds.is_empty() {
            return 0.0;
        }
        let mean = self.speeds.iter().sum::<f64>() / self.speeds.len() as f64;
        (mean * 10.0).round() / 10.0
    }
}

pub struct VehicleStateStore {
    ring_size: usize,
    states: RwLock<HashMap<String, VehicleLiveState>>,
}

impl VehicleStateStore {
    pub fn new(ring_size: usize) -> Self {
        Self {
            ring_size,
            states: RwLock::new(HashMap::new()),
        }
    }

    /// Apply a report: replace position and timestamp, push the speed onto
    /// the ring head and truncate to the ring size. All fields change inside
    /// one write-lock section, so readers observe either the full pre-update
    /// or the full post-update record.
    ///
    /// Non-finite or negative speeds are excluded from the ring; the
    /// position and timestamp still update.
    pub async fn record_report(
        &self,
        vehicle_id: &str,
        route_id: &str,
        lat: f64,
        lng: f64,
        speed: f64,
        now: DateTime<Utc>,
    ) -> VehicleLiveState {
        let mut states = self.states.write().await;
        let state = states
            .entry(vehicle_id.to_string())
            .or_insert_with(|| VehicleLiveState {
                route_id: route_id.to_string(),
                lat,
                lng,
                last_updated: now,
                speeds: Vec::new(),
            });

        state.route_id = route_id.to_string();
        state.lat = lat;
        state.lng = lng;
        state.last_updated = now;
        if speed.is_finite() && speed >= 0.0 {
            state.speeds.insert(0, speed);
            state.speeds.truncate(self.ring_size);
        }

        state.clone()
    }

    pub async fn read_state(&self, vehicle_id: &str) -> Option<VehicleLiveState> {
        self.states.read().await.get(vehicle_id).cloned()
    }

    /// Number of vehicles with live state.
    pub async fn tracked_vehicles(&self) -> usize {
        self.states.read().await.len()
    }
}
