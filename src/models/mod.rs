use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A raw location report sent by a vehicle's onboard device.
///
/// The server stamps arrival time itself; devices do not supply timestamps.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationReport {
    /// Vehicle identifier assigned at registration
    pub bus_id: String,
    /// Reported latitude (WGS84 degrees)
    pub lat: f64,
    /// Reported longitude (WGS84 degrees)
    pub lng: f64,
    /// Raw speed sample in km/h. Non-finite or negative values are ignored
    /// for speed smoothing but do not invalidate the report.
    pub speed: f64,
}

/// Position snapped onto the route polyline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnappedLocation {
    pub lat: f64,
    pub lng: f64,
}

/// Estimated arrival at a single stop, in route traversal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EtaStop {
    /// Stop identifier, stable within the route
    pub stop_id: String,
    /// Human-readable stop name
    pub name: String,
    /// Minutes until arrival; 0 for stops already passed
    pub eta_minutes: i64,
}

/// Whether a vehicle's last report is recent enough to trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VehicleStatus {
    Online,
    Offline,
}

/// The composite payload returned from live queries and pushed to
/// subscribers. Serialized identically on the HTTP and WebSocket paths.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleUpdate {
    pub success: bool,
    /// Vehicle identifier
    pub bus_id: String,
    /// Route the vehicle is bound to
    pub route_id: String,
    /// Position snapped to the route polyline; the raw reported position if
    /// no geometry is available; null if the vehicle has never reported
    pub snapped_location: Option<SnappedLocation>,
    /// Mean of the recent speed samples, one decimal, km/h
    pub avg_speed: f64,
    /// Server receive time of the last report (ISO-8601 UTC, milliseconds)
    pub last_updated: Option<String>,
    /// Per-stop arrival estimates in traversal order; empty when no geometry
    /// is available
    pub eta_stops: Vec<EtaStop>,
    pub status: VehicleStatus,
}

/// Stored polyline document for a route, as synthesized by the admin side.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteWithPolyline {
    /// Route identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Unique display name of the route
    pub route_name: String,
    /// Encoded polyline (precision 5) of the drivable path
    pub geometry: String,
    /// Total path length in meters, as reported by the router
    pub distance: Option<f64>,
    /// Estimated traversal time in seconds, as reported by the router
    pub duration: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_update_wire_field_names() {
        let update = VehicleUpdate {
            success: true,
            bus_id: "V1".into(),
            route_id: "R1".into(),
            snapped_location: Some(SnappedLocation {
                lat: 28.63,
                lng: 77.29,
            }),
            avg_speed: 40.0,
            last_updated: Some("2025-01-01T00:00:00.000Z".into()),
            eta_stops: vec![EtaStop {
                stop_id: "S1".into(),
                name: "Connaught Place".into(),
                eta_minutes: 0,
            }],
            status: VehicleStatus::Online,
        };

        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["busId"], "V1");
        assert_eq!(json["routeId"], "R1");
        assert_eq!(json["snappedLocation"]["lat"], 28.63);
        assert_eq!(json["snappedLocation"]["lng"], 77.29);
        assert_eq!(json["avgSpeed"], 40.0);
        assert_eq!(json["lastUpdated"], "2025-01-01T00:00:00.000Z");
        assert_eq!(json["etaStops"][0]["stopId"], "S1");
        assert_eq!(json["etaStops"][0]["etaMinutes"], 0);
        assert_eq!(json["status"], "online");
    }

    #[test]
    fn vehicle_update_never_reported() {
        let update = VehicleUpdate {
            success: true,
            bus_id: "V2".into(),
            route_id: "R1".into(),
            snapped_location: None,
            avg_speed: 0.0,
            last_updated: None,
            eta_stops: vec![],
            status: VehicleStatus::Offline,
        };

        let json: serde_json::Value = serde_json::to_value(&update).unwrap();
        assert_eq!(json["snappedLocation"], serde_json::Value::Null);
        assert_eq!(json["lastUpdated"], serde_json::Value::Null);
        assert_eq!(json["status"], "offline");
        assert_eq!(json["etaStops"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn location_report_accepts_camel_case() {
        let report: LocationReport =
            serde_json::from_str(r#"{"busId":"V1","lat":28.63,"lng":77.29,"speed":40}"#).unwrap();
        assert_eq!(report.bus_id, "V1");
        assert_eq!(report.speed, 40.0);
    }

    #[test]
    fn route_with_polyline_uses_underscore_id() {
        let doc = RouteWithPolyline {
            id: "R1".into(),
            route_name: "Blue Line".into(),
            geometry: "abc".into(),
            distance: Some(14180.0),
            duration: Some(1800.0),
        };
        let json: serde_json::Value = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "R1");
        assert_eq!(json["routeName"], "Blue Line");
    }
}
