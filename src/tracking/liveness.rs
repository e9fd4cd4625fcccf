//! Online/offline classification from report age.

use chrono::{DateTime, Duration, Utc};

use crate::models::VehicleStatus;

/// A vehicle is online iff its last report is at most `threshold_seconds`
/// old at the moment of observation. No background sweeper exists; callers
/// apply this on every read.
pub fn classify(
    last_updated: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_seconds: u64,
) -> VehicleStatus {
    match last_updated {
        Some(t) if now.signed_duration_since(t) <= Duration::seconds(threshold_seconds as i64) => {
            VehicleStatus::Online
        }
        _ => VehicleStatus::Offline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_735_689_600 + secs, 0).unwrap()
    }

    #[test]
    fn fresh_report_is_online() {
        assert_eq!(classify(Some(at(0)), at(10), 90), VehicleStatus::Online);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        assert_eq!(classify(Some(at(0)), at(90), 90), VehicleStatus::Online);
        assert_eq!(classify(Some(at(0)), at(91), 90), VehicleStatus::Offline);
    }

    #[test]
    fn missing_timestamp_is_offline() {
        assert_eq!(classify(None, at(0), 90), VehicleStatus::Offline);
    }

    #[test]
    fn future_timestamp_is_online() {
        // Clock skew between nodes must not flap a reporting vehicle offline.
        assert_eq!(classify(Some(at(5)), at(0), 90), VehicleStatus::Online);
    }
}
