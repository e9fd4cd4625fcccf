//! Snapping of GPS fixes onto a route polyline.
//!
//! The matcher is a pure function over an ordered (lng, lat) coordinate
//! sequence. For every segment it projects the query point onto the segment
//! in a planar local frame (longitude scaled by the cosine of the segment's
//! mean latitude), clamps the foot to the segment, and measures arc lengths
//! with the haversine formula. The foot with the smallest great-circle
//! distance to the query wins; ties go to the earliest segment.

use geo::{Coord, Distance, Haversine, Point};

/// Segments shorter than this collapse to their first vertex for the
/// projection step. Their length still counts toward cumulative offsets.
const SHORT_SEGMENT_KM: f64 = 0.001;

/// A point on the polyline together with its arc-length offset from the
/// polyline origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedPoint {
    pub lng: f64,
    pub lat: f64,
    /// Kilometers of arc length from the first polyline vertex to this point
    pub offset_km: f64,
    /// Great-circle distance from the query point to this point
    pub distance_km: f64,
}

/// Great-circle distance between two (lng, lat) coordinates in kilometers,
/// using the mean Earth radius (6371.0088 km).
pub fn haversine_km(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Haversine.distance(Point::from(a), Point::from(b)) / 1000.0
}

/// Total arc length of a polyline in kilometers.
pub fn polyline_length_km(coords: &[Coord<f64>]) -> f64 {
    coords.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Snap a (lng, lat) query point to the polyline.
///
/// Returns `None` only for polylines with fewer than two vertices. The
/// returned offset always lies in `[0, polyline_length_km(coords)]`.
pub fn snap_to_polyline(coords: &[Coord<f64>], lng: f64, lat: f64) -> Option<MatchedPoint> {
    if coords.len() < 2 {
        return None;
    }

    let query = Coord { x: lng, y: lat };
    let mut cumulative_km = 0.0;
    let mut best = MatchedPoint {
        lng: coords[0].x,
        lat: coords[0].y,
        offset_km: 0.0,
        distance_km: f64::INFINITY,
    };

    for pair in coords.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let seg_km = haversine_km(a, b);

        let (foot, along_km) = if seg_km < SHORT_SEGMENT_KM {
            (a, 0.0)
        } else {
            // Only ratios matter for the projection parameter, so degree
            // deltas with longitude scaled by cos(mean latitude) suffice.
            let scale = ((a.y + b.y) / 2.0).to_radians().cos();
            let dx = (b.x - a.x) * scale;
            let dy = b.y - a.y;
            let qx = (query.x - a.x) * scale;
            let qy = query.y - a.y;
            let t = ((qx * dx + qy * dy) / (dx * dx + dy * dy)).clamp(0.0, 1.0);
            let foot = Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            };
            // The planar foot can measure marginally past the segment end.
            (foot, haversine_km(a, foot).min(seg_km))
        };

        let distance_km = haversine_km(query, foot);
        if distance_km < best.distance_km {
            best = MatchedPoint {
                lng: foot.x,
                lat: foot.y,
                offset_km: cumulative_km + along_km,
                distance_km,
            };
        }

        cumulative_km += seg_km;
    }

    best.offset_km = best.offset_km.min(cumulative_km);
    Some(best)
}
