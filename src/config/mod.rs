//! Configuration module - environment variable parsing

use std::env;
use std::path::PathBuf;

use crate::util::time::TIMESTEP_DEFAULT_MS;

/// Simulation configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Fixed tick length in milliseconds
    pub timestep_ms: u16,
    /// Seed for combat and AI rolls
    pub seed: u64,
    /// Stop after this many ticks; run until shutdown when unset
    pub max_ticks: Option<u64>,
    /// JSON map layout; the built-in demo map when unset
    pub terrain_path: Option<PathBuf>,
    /// Ticks between presentation snapshots
    pub snapshot_interval: u32,
    /// Capacity of the outbound record channel
    pub outbound_capacity: usize,
}

const DEFAULT_SEED: u64 = 0x5eed;

impl SimConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let timestep_ms = parse_or(&lookup, "SIM_TIMESTEP_MS", TIMESTEP_DEFAULT_MS)?;
        if timestep_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "SIM_TIMESTEP_MS",
                value: "0".to_string(),
            });
        }

        let seed = match lookup("SIM_SEED") {
            Some(raw) => parse_seed(&raw).ok_or(ConfigError::Invalid {
                name: "SIM_SEED",
                value: raw,
            })?,
            None => DEFAULT_SEED,
        };

        let max_ticks = match lookup("SIM_MAX_TICKS") {
            Some(raw) => Some(raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "SIM_MAX_TICKS",
                value: raw.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            timestep_ms,
            seed,
            max_ticks,
            terrain_path: lookup("SIM_TERRAIN_PATH").map(PathBuf::from),
            snapshot_interval: parse_or(&lookup, "SIM_SNAPSHOT_INTERVAL", 12)?,
            outbound_capacity: parse_or(&lookup, "SIM_OUTBOUND_CAPACITY", 256)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

/// Decimal or `0x`-prefixed hex
fn parse_seed(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<SimConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SimConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.timestep_ms, 8);
        assert_eq!(config.seed, 0x5eed);
        assert_eq!(config.max_ticks, None);
        assert!(config.terrain_path.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("SIM_TIMESTEP_MS", "16"),
            ("SIM_SEED", "0xff"),
            ("SIM_MAX_TICKS", "1000"),
            ("SIM_TERRAIN_PATH", "maps/henesys.json"),
        ])
        .unwrap();
        assert_eq!(config.timestep_ms, 16);
        assert_eq!(config.seed, 255);
        assert_eq!(config.max_ticks, Some(1000));
        assert_eq!(config.terrain_path, Some(PathBuf::from("maps/henesys.json")));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            load(&[("SIM_TIMESTEP_MS", "0")]),
            Err(ConfigError::Invalid { name: "SIM_TIMESTEP_MS", .. })
        ));
        assert!(load(&[("SIM_SEED", "seed")]).is_err());
        assert!(load(&[("SIM_MAX_TICKS", "-1")]).is_err());
    }
}
