//! Connection settings read from the environment.
//! Defaults match a factory-configured unit on its own access point.

use std::time::Duration;

use crate::protocol::{DEFAULT_PIN, DEFAULT_PORT};

pub const DEFAULT_HOST: &str = "10.0.0.1";
pub const DEFAULT_POLL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub pin: String,
    /// Refresh cadence for the coordinator.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            pin: DEFAULT_PIN.to_string(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_empty("PROAIR_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match non_empty("PROAIR_PORT") {
            Some(s) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| format!("PROAIR_PORT must be a port number, got {s:?}"))?,
            None => DEFAULT_PORT,
        };

        let pin = non_empty("PROAIR_PIN").unwrap_or_else(|| DEFAULT_PIN.to_string());
        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err("PROAIR_PIN must contain digits only".to_string());
        }

        let poll_secs = match non_empty("PROAIR_POLL_SECS") {
            Some(s) => match s.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => return Err(format!("PROAIR_POLL_SECS must be a positive integer, got {s:?}")),
            },
            None => DEFAULT_POLL_SECS,
        };

        Ok(Config {
            host: host.trim().to_string(),
            port,
            pin: pin.trim().to_string(),
            poll_interval: Duration::from_secs(poll_secs),
        })
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
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, 1235);
        assert_eq!(config.pin, "2909");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn reads_all_keys() {
        let config = Config::from_lookup(lookup(&[
            ("PROAIR_HOST", "192.168.1.40"),
            ("PROAIR_PORT", "4000"),
            ("PROAIR_PIN", "0000"),
            ("PROAIR_POLL_SECS", "10"),
        ]))
        .unwrap();
        assert_eq!(config.host, "192.168.1.40");
        assert_eq!(config.port, 4000);
        assert_eq!(config.pin, "0000");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("PROAIR_PORT", "http")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PROAIR_PIN", "12a4")])).is_err());
        assert!(Config::from_lookup(lookup(&[("PROAIR_POLL_SECS", "0")])).is_err());
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup(&[("PROAIR_HOST", "  ")])).unwrap();
        assert_eq!(config.host, DEFAULT_HOST);
    }
}
