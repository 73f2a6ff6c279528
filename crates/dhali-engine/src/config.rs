use std::path::Path;

use serde::{Deserialize, Serialize};

use dhali_core::DhaliError;
use dhali_cost::CostModelConfig;

/// Every knob named in §6, loadable from a JSON file or the process
/// environment the way the reference wiring binary's CLI already loads its
/// own configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Required channel settle delay, in seconds. Pinned to equality, never `>=`.
    pub settle_delay: u64,
    /// Rate-limit window, in seconds.
    pub rate_limit_window: f64,
    /// Staged-claim count at which the default rate limiter trips.
    pub staged_buffer_limit: u64,
    #[serde(flatten)]
    pub cost: CostModelConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay: 15_768_000,
            rate_limit_window: 1.0,
            staged_buffer_limit: 10,
            cost: CostModelConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DhaliError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| DhaliError::InvalidInput(format!("reading config file: {e}")))?;
        let config: Self =
            serde_json::from_str(&data).map_err(|e| DhaliError::Serialization(e.to_string()))?;
        config.cost.validate()?;
        Ok(config)
    }

    /// Starts from [`EngineConfig::default`] and overrides any field named
    /// by a matching `DHALI_*` environment variable.
    pub fn from_env() -> Result<Self, DhaliError> {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("DHALI_SETTLE_DELAY") {
            if let Ok(parsed) = v.parse() {
                config.settle_delay = parsed;
            }
        }
        if let Ok(v) = std::env::var("DHALI_RATE_LIMIT_WINDOW") {
            if let Ok(parsed) = v.parse() {
                config.rate_limit_window = parsed;
            }
        }
        if let Ok(v) = std::env::var("DHALI_STAGED_BUFFER_LIMIT") {
            if let Ok(parsed) = v.parse() {
                config.staged_buffer_limit = parsed;
            }
        }
        if let Ok(v) = std::env::var("DHALI_FUDGE_FACTOR") {
            if let Ok(parsed) = v.parse() {
                config.cost.fudge_factor = parsed;
            }
        }
        config.cost.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = EngineConfig::default();
        assert_eq!(config.settle_delay, 15_768_000);
        assert_eq!(config.rate_limit_window, 1.0);
        assert_eq!(config.cost.fudge_factor, 5.0);
        assert_eq!(config.cost.dollars_to_drops_rate, 2.5);
        assert_eq!(config.cost.machine_classes.get("standard"), Some(&1.0));
    }

    #[test]
    fn from_env_rejects_fudge_factor_below_one() {
        std::env::set_var("DHALI_FUDGE_FACTOR", "0.2");
        let result = EngineConfig::from_env();
        std::env::remove_var("DHALI_FUDGE_FACTOR");
        assert!(result.is_err());
    }
}
