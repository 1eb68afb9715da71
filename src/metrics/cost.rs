//! Pricing configuration and the daily cost ceiling.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-model pricing, in USD per 1000 tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub description: String,
}

/// Daily spend limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLimits {
    /// Hard ceiling; recording fails once cumulative spend reaches it
    pub daily_max: f64,
    /// Soft threshold; a warning fires once when first crossed
    pub warning_threshold: f64,
    #[serde(default)]
    pub enable_alerts: bool,
}

/// Pricing table plus limits, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub models: HashMap<String, ModelPricing>,
    pub default_model: String,
    pub cost_limits: CostLimits,
}

impl PricingConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("invalid pricing config: {e}")))?;
        if !config.models.contains_key(&config.default_model) {
            return Err(Error::Config(format!(
                "default_model {:?} has no pricing entry",
                config.default_model
            )));
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read pricing config: {e}")))?;
        Self::from_yaml(&yaml)
    }

    /// Cost of one call: `(prompt × input + completion × output) / 1000`.
    /// Unknown models are priced with the default model's entry.
    pub fn cost_for(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let pricing = self
            .models
            .get(model)
            .or_else(|| self.models.get(&self.default_model));
        let Some(pricing) = pricing else { return 0.0 };
        (prompt_tokens as f64 * pricing.input_price_per_1k
            + completion_tokens as f64 * pricing.output_price_per_1k)
            / 1000.0
    }
}

#[derive(Debug)]
struct CostState {
    day: NaiveDate,
    spent: f64,
    warned: bool,
}

/// Enforces the daily spend ceiling over a pricing table.
///
/// Enforcement is advisory by construction: the record operation fails, not
/// the model-call path, so callers decide whether to stop dispatching.
pub struct CostManager {
    pricing: PricingConfig,
    state: Mutex<CostState>,
}

impl CostManager {
    pub fn new(pricing: PricingConfig) -> Self {
        Self {
            pricing,
            state: Mutex::new(CostState {
                day: chrono::Utc::now().date_naive(),
                spent: 0.0,
                warned: false,
            }),
        }
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    /// Record the cost of one call and return it.
    ///
    /// Fails with [`Error::CostCeiling`] once cumulative spend for the day
    /// has reached `daily_max`. The warning threshold fires a single
    /// warning the first time it is crossed, when alerts are enabled.
    pub fn record(&self, model: &str, prompt_tokens: u64, completion_tokens: u64) -> Result<f64> {
        let cost = self
            .pricing
            .cost_for(model, prompt_tokens, completion_tokens);
        let limits = &self.pricing.cost_limits;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let today = chrono::Utc::now().date_naive();
        if state.day != today {
            state.day = today;
            state.spent = 0.0;
            state.warned = false;
        }

        if state.spent >= limits.daily_max {
            return Err(Error::CostCeiling {
                spent: state.spent,
                ceiling: limits.daily_max,
            });
        }

        state.spent += cost;
        if limits.enable_alerts && !state.warned && state.spent >= limits.warning_threshold {
            state.warned = true;
            tracing::warn!(
                spent = state.spent,
                threshold = limits.warning_threshold,
                ceiling = limits.daily_max,
                "daily LLM spend crossed the warning threshold"
            );
        }
        Ok(cost)
    }

    /// Cumulative spend for the current day.
    pub fn spent_today(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spent
    }
}
