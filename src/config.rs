use std::fmt::Display;
use std::str::FromStr;

use chrono::TimeDelta;

use crate::error::{Result, SafetyError};

/// Proximity threshold in raw degrees, roughly 1km near the equator.
pub const DEFAULT_RISK_RADIUS: f64 = 0.01;
pub const DEFAULT_CHECK_IN_INTERVAL_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub risk_radius: f64,
    pub check_in_interval_secs: i64,
    pub tick_interval_ms: u64,
    pub osm_pbf_path: Option<String>,
    pub safety_zone_resolution: u8,
    pub seed_demo_reports: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            risk_radius: DEFAULT_RISK_RADIUS,
            check_in_interval_secs: DEFAULT_CHECK_IN_INTERVAL_SECS,
            tick_interval_ms: 1000,
            osm_pbf_path: None,
            safety_zone_resolution: 9,
            seed_demo_reports: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            risk_radius: parse_or(&lookup, "RISK_RADIUS", defaults.risk_radius)?,
            check_in_interval_secs: parse_or(
                &lookup,
                "CHECK_IN_INTERVAL_SECS",
                defaults.check_in_interval_secs,
            )?,
            tick_interval_ms: parse_or(&lookup, "TICK_INTERVAL_MS", defaults.tick_interval_ms)?,
            osm_pbf_path: lookup("OSM_PBF_PATH").filter(|p| !p.trim().is_empty()),
            safety_zone_resolution: parse_or(
                &lookup,
                "SAFETY_ZONE_RESOLUTION",
                defaults.safety_zone_resolution,
            )?,
            seed_demo_reports: parse_or(&lookup, "SEED_DEMO_REPORTS", defaults.seed_demo_reports)?,
        };

        if !(config.risk_radius.is_finite() && config.risk_radius > 0.0) {
            return Err(SafetyError::invalid("RISK_RADIUS must be a positive number"));
        }
        if config.check_in_interval_secs <= 0 {
            return Err(SafetyError::invalid("CHECK_IN_INTERVAL_SECS must be positive"));
        }
        if config.tick_interval_ms == 0 {
            return Err(SafetyError::invalid("TICK_INTERVAL_MS must be positive"));
        }

        Ok(config)
    }

    pub fn check_in_interval(&self) -> TimeDelta {
        TimeDelta::seconds(self.check_in_interval_secs)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SafetyError::invalid(format!("{key}={raw:?}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.risk_radius, 0.01);
        assert_eq!(config.check_in_interval(), TimeDelta::seconds(300));
        assert!(config.osm_pbf_path.is_none());
        assert!(config.seed_demo_reports);
        assert_eq!(config.listen_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("CHECK_IN_INTERVAL_SECS", "60"),
            ("OSM_PBF_PATH", "assets/cape-town.osm.pbf"),
            ("SEED_DEMO_REPORTS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.check_in_interval_secs, 60);
        assert_eq!(config.osm_pbf_path.as_deref(), Some("assets/cape-town.osm.pbf"));
        assert!(!config.seed_demo_reports);
    }

    #[test]
    fn bad_values_fail() {
        let err = Config::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, SafetyError::InvalidInput(_)));

        let err = Config::from_lookup(lookup(&[("RISK_RADIUS", "-1")])).unwrap_err();
        assert!(matches!(err, SafetyError::InvalidInput(_)));
    }
}
