//! Per-stop arrival estimates from arc-length offsets and a smoothed speed.

use crate::cache::geometry::StopWithOffset;
use crate::models::EtaStop;

/// Compute `etaMinutes` for every stop, in traversal order.
///
/// Stops at or behind the vehicle's offset report 0. The smoothed speed is
/// floored at `min_floor_kmh` so a stationary vehicle still produces finite
/// estimates.
pub fn eta_stops(
    vehicle_offset_km: f64,
    stops: &[StopWithOffset],
    avg_speed_kmh: f64,
    min_floor_kmh: f64,
) -> Vec<EtaStop> {
    let effective_speed = avg_speed_kmh.max(min_floor_kmh);

    stops
        .iter()
        .map(|stop| {
            let remaining_km = (stop.offset_km - vehicle_offset_km).max(0.0);
            let eta_minutes = (remaining_km / effective_speed * 60.0).round() as i64;
            EtaStop {
                stop_id: stop.stop_id.clone(),
                name: stop.name.clone(),
                eta_minutes,
            }
        })
        .collect()
}
