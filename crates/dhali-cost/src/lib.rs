use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use dhali_core::DhaliError;

/// Knobs for the pure cost calculation in §4.4, loaded as part of
/// [`dhali_engine::config::EngineConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostModelConfig {
    pub fudge_factor: f64,
    pub price_per_gib_s: f64,
    pub dollars_to_drops_rate: f64,
    pub machine_classes: HashMap<String, f64>,
}

impl Default for CostModelConfig {
    fn default() -> Self {
        let mut machine_classes = HashMap::new();
        machine_classes.insert("standard".to_string(), 1.0);
        Self {
            fudge_factor: 5.0,
            price_per_gib_s: 0.000_002_905,
            dollars_to_drops_rate: 2.5,
            machine_classes,
        }
    }
}

impl CostModelConfig {
    /// `fudge_factor` must be `>= 1`; below that the calculator would
    /// silently under-charge. Called on every config construction path
    /// (file, env, defaults) before the config is handed to the engine.
    pub fn validate(&self) -> Result<(), DhaliError> {
        if self.fudge_factor < 1.0 {
            return Err(DhaliError::InvalidInput(format!(
                "fudge_factor must be >= 1, got {}",
                self.fudge_factor
            )));
        }
        Ok(())
    }
}

/// `cost_dollars = price_per_GiB_s * fudge_factor * memory_GiB * runtime_ms *
/// request_size_bytes * response_size_bytes / 1000`. Rejects negative inputs,
/// `fudge_factor < 1`, and machine classes absent from `config.machine_classes`.
pub fn determine_cost_dollars(
    config: &CostModelConfig,
    machine_type: &str,
    runtime_ms: f64,
    request_size_bytes: f64,
    response_size_bytes: f64,
) -> Result<f64, DhaliError> {
    config.validate()?;
    if runtime_ms < 0.0 {
        return Err(DhaliError::InvalidInput(
            "runtime_ms must be non-negative".to_string(),
        ));
    }
    if request_size_bytes < 0.0 {
        return Err(DhaliError::InvalidInput(
            "request_size_bytes must be non-negative".to_string(),
        ));
    }
    if response_size_bytes < 0.0 {
        return Err(DhaliError::InvalidInput(
            "response_size_bytes must be non-negative".to_string(),
        ));
    }

    let memory_gib = config.machine_classes.get(machine_type).copied().ok_or_else(|| {
        DhaliError::InvalidInput(format!("unknown machine_type: {machine_type}"))
    })?;

    let gib_s_dollars_price = config.price_per_gib_s * config.fudge_factor;
    Ok(gib_s_dollars_price * memory_gib * runtime_ms * request_size_bytes * response_size_bytes
        / 1000.0)
}

/// `dollars_to_drops(dollars) = dollars * rate`. Rejects negative dollars.
pub fn convert_dollars_to_drops(config: &CostModelConfig, dollars: f64) -> Result<f64, DhaliError> {
    if dollars < 0.0 {
        return Err(DhaliError::InvalidInput(
            "dollars must be non-negative".to_string(),
        ));
    }
    Ok(dollars * config.dollars_to_drops_rate)
}
