// src/config.rs
//! Chain configuration: TTLs, auto-bump threshold and sweeper cadence.
//!
//! Loaded from a JSON file or from the environment (`.env` honoured).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::error::{ChainError, Result};
use crate::expiry::ExpiryPolicy;

/// Upper bound for either TTL: 100 years.
pub const MAX_TTL_HOURS: u64 = 100 * 365 * 24;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    /// Default time-to-live in hours
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Time-to-live for bumped nodes in hours
    #[serde(default = "default_bumped_ttl_hours")]
    pub bumped_ttl_hours: u64,

    /// Live node count at which new nodes are bumped automatically
    #[serde(default = "default_auto_bump_above")]
    pub auto_bump_above: Option<usize>,

    /// Interval between background sweeps (in seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Enable the background sweeper
    #[serde(default = "default_sweep_enabled")]
    pub sweep_enabled: bool,
}

fn default_ttl_hours() -> u64 {
    11
}

fn default_bumped_ttl_hours() -> u64 {
    8
}

fn default_auto_bump_above() -> Option<usize> {
    Some(9000)
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_enabled() -> bool {
    true
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            bumped_ttl_hours: default_bumped_ttl_hours(),
            auto_bump_above: default_auto_bump_above(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_enabled: default_sweep_enabled(),
        }
    }
}

impl ChainConfig {
    /// Read and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        let config: ChainConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Defaults overridden by `HASHLET_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(v) = env::var("HASHLET_TTL_HOURS") {
            config.ttl_hours = parse_var("HASHLET_TTL_HOURS", &v)?;
        }
        if let Ok(v) = env::var("HASHLET_BUMPED_TTL_HOURS") {
            config.bumped_ttl_hours = parse_var("HASHLET_BUMPED_TTL_HOURS", &v)?;
        }
        if let Ok(v) = env::var("HASHLET_AUTO_BUMP_ABOVE") {
            config.auto_bump_above = match v.trim().to_lowercase().as_str() {
                "off" | "none" | "" => None,
                other => Some(parse_var("HASHLET_AUTO_BUMP_ABOVE", other)?),
            };
        }
        if let Ok(v) = env::var("HASHLET_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = parse_var("HASHLET_SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Ok(v) = env::var("HASHLET_SWEEP_ENABLED") {
            config.sweep_enabled = parse_var("HASHLET_SWEEP_ENABLED", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl_hours == 0 {
            return Err(ChainError::InvalidConfig("ttl_hours must be positive".into()));
        }
        if self.bumped_ttl_hours == 0 {
            return Err(ChainError::InvalidConfig(
                "bumped_ttl_hours must be positive".into(),
            ));
        }
        if self.ttl_hours > MAX_TTL_HOURS {
            return Err(ChainError::InvalidConfig(format!(
                "ttl_hours ({}) exceeds maximum of {}",
                self.ttl_hours, MAX_TTL_HOURS
            )));
        }
        if self.bumped_ttl_hours > self.ttl_hours {
            return Err(ChainError::InvalidConfig(format!(
                "bumped_ttl_hours ({}) exceeds ttl_hours ({})",
                self.bumped_ttl_hours, self.ttl_hours
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ChainError::InvalidConfig(
                "sweep_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Expiry policy for these TTLs. Values above `MAX_TTL_HOURS` are
    /// clamped; `validate` rejects them first on every load path.
    pub fn policy(&self) -> ExpiryPolicy {
        ExpiryPolicy {
            ttl: Duration::hours(self.ttl_hours.min(MAX_TTL_HOURS) as i64),
            bumped_ttl: Duration::hours(self.bumped_ttl_hours.min(MAX_TTL_HOURS) as i64),
        }
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ChainError::InvalidConfig(format!("{} has invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ChainConfig::default();
        assert_eq!(config.ttl_hours, 11);
        assert_eq!(config.bumped_ttl_hours, 8);
        assert_eq!(config.auto_bump_above, Some(9000));
        assert!(config.sweep_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ChainConfig::default().policy();
        assert_eq!(policy.ttl, Duration::hours(11));
        assert_eq!(policy.bumped_ttl, Duration::hours(8));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_ttl = ChainConfig {
            ttl_hours: 0,
            ..Default::default()
        };
        assert!(matches!(zero_ttl.validate(), Err(ChainError::InvalidConfig(_))));

        let inverted = ChainConfig {
            ttl_hours: 4,
            bumped_ttl_hours: 8,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let no_interval = ChainConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert!(no_interval.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ChainConfig = serde_json::from_str(r#"{"ttl_hours": 24}"#).unwrap();
        assert_eq!(config.ttl_hours, 24);
        assert_eq!(config.bumped_ttl_hours, 8);
        assert_eq!(config.auto_bump_above, Some(9000));

        let disabled: ChainConfig = serde_json::from_str(r#"{"auto_bump_above": null}"#).unwrap();
        assert_eq!(disabled.auto_bump_above, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chain.json");
        let config = ChainConfig {
            ttl_hours: 12,
            sweep_interval_secs: 5,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = ChainConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"ttl_hours": 0}"#).unwrap();
        assert!(matches!(ChainConfig::load(&path), Err(ChainError::InvalidConfig(_))));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(ChainConfig::load(&path), Err(ChainError::Serialization(_))));

        let missing = dir.path().join("missing.json");
        assert!(matches!(ChainConfig::load(&missing), Err(ChainError::Io(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_ttl() {
        let max = ChainConfig {
            ttl_hours: MAX_TTL_HOURS,
            ..Default::default()
        };
        assert!(max.validate().is_ok());
        assert_eq!(max.policy().ttl, Duration::hours(MAX_TTL_HOURS as i64));

        for ttl_hours in [MAX_TTL_HOURS + 1, 10_000_000_000_000, u64::MAX] {
            let config = ChainConfig {
                ttl_hours,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(ChainError::InvalidConfig(_))));
            // Never negative, never panics
            assert!(config.policy().ttl > Duration::zero());
        }

        // bumped above max is caught by the ordering check
        let bumped = ChainConfig {
            bumped_ttl_hours: u64::MAX,
            ..Default::default()
        };
        assert!(bumped.validate().is_err());
    }

    #[test]
    fn test_load_rejects_oversized_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        fs::write(&path, format!(r#"{{"ttl_hours": {}}}"#, u64::MAX)).unwrap();
        assert!(matches!(ChainConfig::load(&path), Err(ChainError::InvalidConfig(_))));
    }

    // Only test touching HASHLET_* variables; keep it that way to avoid races.
    #[test]
    fn test_from_env_overrides() {
        const VARS: [&str; 5] = [
            "HASHLET_TTL_HOURS",
            "HASHLET_BUMPED_TTL_HOURS",
            "HASHLET_AUTO_BUMP_ABOVE",
            "HASHLET_SWEEP_INTERVAL_SECS",
            "HASHLET_SWEEP_ENABLED",
        ];
        let clear = || {
            for var in VARS {
                env::remove_var(var);
            }
        };

        clear();
        assert_eq!(ChainConfig::from_env().unwrap(), ChainConfig::default());

        env::set_var("HASHLET_TTL_HOURS", "24");
        env::set_var("HASHLET_BUMPED_TTL_HOURS", " 6 ");
        env::set_var("HASHLET_AUTO_BUMP_ABOVE", "500");
        env::set_var("HASHLET_SWEEP_INTERVAL_SECS", "15");
        env::set_var("HASHLET_SWEEP_ENABLED", "false");
        let config = ChainConfig::from_env().unwrap();
        assert_eq!(config.ttl_hours, 24);
        assert_eq!(config.bumped_ttl_hours, 6);
        assert_eq!(config.auto_bump_above, Some(500));
        assert_eq!(config.sweep_interval_secs, 15);
        assert!(!config.sweep_enabled);

        for off in ["off", "None", ""] {
            env::set_var("HASHLET_AUTO_BUMP_ABOVE", off);
            assert_eq!(ChainConfig::from_env().unwrap().auto_bump_above, None);
        }

        env::set_var("HASHLET_TTL_HOURS", "eleven");
        assert!(matches!(ChainConfig::from_env(), Err(ChainError::InvalidConfig(_))));

        env::set_var("HASHLET_TTL_HOURS", u64::MAX.to_string());
        assert!(matches!(ChainConfig::from_env(), Err(ChainError::InvalidConfig(_))));

        env::set_var("HASHLET_TTL_HOURS", "24");
        env::set_var("HASHLET_SWEEP_ENABLED", "sometimes");
        assert!(matches!(ChainConfig::from_env(), Err(ChainError::InvalidConfig(_))));

        clear();
    }
}
