use serde::Deserialize;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,
    /// Allowed CORS origins. Required unless cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Explicitly allow all origins (development only). Defaults to false.
    #[serde(default)]
    pub cors_permissive: bool,
    /// Live tracking configuration
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// Configuration for the live tracking engine.
///
/// All fields have defaults matching typical urban bus operation: a vehicle
/// reporting every 10-30 seconds stays online with a 90 second staleness
/// threshold, and a three-sample speed ring smooths over single-tick GPS
/// noise without hiding real slowdowns.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Seconds since the last report before a vehicle is classified offline.
    #[serde(default = "TrackingConfig::default_staleness_threshold_seconds")]
    pub staleness_threshold_seconds: u64,
    /// Number of recent raw speed samples kept per vehicle. The smoothed
    /// speed used for ETAs is the arithmetic mean of this ring.
    #[serde(default = "TrackingConfig::default_speed_ring_size")]
    pub speed_ring_size: usize,
    /// Lower bound on the smoothed speed when computing ETAs. Prevents
    /// division by zero and unbounded ETAs while a vehicle is stationary.
    #[serde(default = "TrackingConfig::default_min_speed_floor_kmh")]
    pub min_speed_floor_kmh: f64,
    /// Optional lifetime of a cached route geometry in seconds. Absent means
    /// entries live until explicitly invalidated.
    #[serde(default)]
    pub geometry_cache_ttl_seconds: Option<u64>,
    /// Deadline applied to every request, bounding store and cache I/O.
    #[serde(default = "TrackingConfig::default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            staleness_threshold_seconds: Self::default_staleness_threshold_seconds(),
            speed_ring_size: Self::default_speed_ring_size(),
            min_speed_floor_kmh: Self::default_min_speed_floor_kmh(),
            geometry_cache_ttl_seconds: None,
            request_timeout_seconds: Self::default_request_timeout_seconds(),
        }
    }
}

impl TrackingConfig {
    /// Validate configuration values and log warnings for potential issues.
    pub fn validate(&self) {
        if self.speed_ring_size == 0 {
            warn!("speed_ring_size is 0 — smoothed speeds will always be 0 and ETAs will use the floor speed");
        }
        if self.min_speed_floor_kmh <= 0.0 {
            warn!(
                floor = self.min_speed_floor_kmh,
                "min_speed_floor_kmh is not positive — stationary vehicles will produce unbounded ETAs"
            );
        }
        if self.staleness_threshold_seconds == 0 {
            warn!("staleness_threshold_seconds is 0 — vehicles will appear offline immediately after reporting");
        }
    }

    fn default_staleness_threshold_seconds() -> u64 {
        90
    }
    fn default_speed_ring_size() -> usize {
        3
    }
    fn default_min_speed_floor_kmh() -> f64 {
        1.0
    }
    fn default_request_timeout_seconds() -> u64 {
        10
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: Self::default_bind_addr(),
            cors_origins: Vec::new(),
            cors_permissive: false,
            tracking: TrackingConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn default_bind_addr() -> String {
        "0.0.0.0:3000".to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_config_default_values() {
        let config = TrackingConfig::default();
        assert_eq!(config.staleness_threshold_seconds, 90);
        assert_eq!(config.speed_ring_size, 3);
        assert_eq!(config.min_speed_floor_kmh, 1.0);
        assert_eq!(config.geometry_cache_ttl_seconds, None);
        assert_eq!(config.request_timeout_seconds, 10);
    }

    #[test]
    fn tracking_config_deserialize_full() {
        let yaml = r#"
            staleness_threshold_seconds: 120
            speed_ring_size: 5
            min_speed_floor_kmh: 2.5
            geometry_cache_ttl_seconds: 600
            request_timeout_seconds: 5
        "#;
        let config: TrackingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.staleness_threshold_seconds, 120);
        assert_eq!(config.speed_ring_size, 5);
        assert_eq!(config.min_speed_floor_kmh, 2.5);
        assert_eq!(config.geometry_cache_ttl_seconds, Some(600));
        assert_eq!(config.request_timeout_seconds, 5);
    }

    #[test]
    fn tracking_config_deserialize_partial_uses_defaults() {
        let yaml = r#"
            staleness_threshold_seconds: 30
        "#;
        let config: TrackingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.staleness_threshold_seconds, 30);
        assert_eq!(config.speed_ring_size, 3);
        assert_eq!(config.min_speed_floor_kmh, 1.0);
    }

    #[test]
    fn tracking_config_deserialize_empty_uses_defaults() {
        let yaml = "{}";
        let config: TrackingConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.staleness_threshold_seconds, 90);
        assert_eq!(config.speed_ring_size, 3);
    }

    #[test]
    fn config_without_tracking_uses_defaults() {
        let yaml = r#"
            bind_addr: "127.0.0.1:8080"
            cors_permissive: true
        "#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert!(config.cors_permissive);
        assert_eq!(config.tracking.staleness_threshold_seconds, 90);
        assert_eq!(config.tracking.speed_ring_size, 3);
    }

    #[test]
    fn config_with_tracking_overrides() {
        let yaml = r#"
            cors_origins:
              - "https://map.example.com"
            tracking:
              staleness_threshold_seconds: 45
              speed_ring_size: 4
        "#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cors_origins, vec!["https://map.example.com"]);
        assert_eq!(config.tracking.staleness_threshold_seconds, 45);
        assert_eq!(config.tracking.speed_ring_size, 4);
        assert_eq!(config.tracking.min_speed_floor_kmh, 1.0);
    }
}
