use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_FALLBACK_SELL_PRICE: &str = "FARM_INVESTMENT_FALLBACK_SELL_PRICE";
pub const ENV_FALLBACK_UNIT_COST: &str = "FARM_INVESTMENT_FALLBACK_UNIT_COST";
pub const ENV_DISCOUNT_RATE: &str = "FARM_INVESTMENT_DISCOUNT_RATE";
pub const ENV_IRR_MAX_ITERATIONS: &str = "FARM_INVESTMENT_IRR_MAX_ITERATIONS";
pub const ENV_IRR_TOLERANCE: &str = "FARM_INVESTMENT_IRR_TOLERANCE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
    #[error("Malformed configuration: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Engine-wide settings shared by every scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sell price used when no history exists for the study year.
    pub fallback_sell_price: Decimal,
    /// Unit cost used when no history exists for the study year.
    pub fallback_unit_cost: Decimal,
    pub projection_defaults: ProjectionDefaults,
    pub solver: IrrSolverConfig,
    /// Discount rate (percent) for NPV and payback. Defaults to the loan rate.
    pub discount_rate: Option<Decimal>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fallback_sell_price: dec!(3.05),
            fallback_unit_cost: dec!(1.98),
            projection_defaults: ProjectionDefaults::default(),
            solver: IrrSolverConfig::default(),
            discount_rate: None,
        }
    }
}

/// Seed values for newly initialised projection years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionDefaults {
    pub unit_count: u32,
    pub yield_per_unit_per_day: Decimal,
    pub days_in_year: u32,
}

impl Default for ProjectionDefaults {
    fn default() -> Self {
        ProjectionDefaults {
            unit_count: 200,
            yield_per_unit_per_day: dec!(8.75),
            days_in_year: 365,
        }
    }
}

/// Newton-Raphson settings for the IRR solver. Rates are fractions here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrSolverConfig {
    pub initial_guess: Decimal,
    pub max_iterations: u32,
    /// Converged once |NPV| drops below this amount.
    pub tolerance: Decimal,
    pub lower_bound: Decimal,
    pub upper_bound: Decimal,
}

impl Default for IrrSolverConfig {
    fn default() -> Self {
        IrrSolverConfig {
            initial_guess: dec!(0.1),
            max_iterations: 100,
            tolerance: dec!(0.0001),
            lower_bound: dec!(-0.99),
            upper_bound: dec!(10),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Applies the `FARM_INVESTMENT_*` variables of this process on top of `self`.
    pub fn with_process_env(self) -> Result<Self, ConfigError> {
        self.with_env_map(std::env::vars().collect())
    }

    /// Applies environment overrides on top of `self`.
    pub fn with_env_map(mut self, env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        if let Some(price) = parse_env::<Decimal>(&env_map, ENV_FALLBACK_SELL_PRICE)? {
            self.fallback_sell_price = price;
        }
        if let Some(cost) = parse_env::<Decimal>(&env_map, ENV_FALLBACK_UNIT_COST)? {
            self.fallback_unit_cost = cost;
        }
        if let Some(rate) = parse_env::<Decimal>(&env_map, ENV_DISCOUNT_RATE)? {
            self.discount_rate = Some(rate);
        }
        if let Some(iterations) = parse_env::<u32>(&env_map, ENV_IRR_MAX_ITERATIONS)? {
            self.solver.max_iterations = iterations;
        }
        if let Some(tolerance) = parse_env::<Decimal>(&env_map, ENV_IRR_TOLERANCE)? {
            self.solver.tolerance = tolerance;
        }

        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if matches!(self.discount_rate, Some(rate) if rate <= dec!(-100)) {
            return Err(ConfigError::InvalidValue(
                "discount_rate".to_string(),
                "must be greater than -100%".to_string(),
            ));
        }
        if self.solver.max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "solver.max_iterations".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        if self.solver.tolerance <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue(
                "solver.tolerance".to_string(),
                "must be positive".to_string(),
            ));
        }
        if self.solver.lower_bound <= dec!(-1) || self.solver.lower_bound >= self.solver.upper_bound {
            return Err(ConfigError::InvalidValue(
                "solver bounds".to_string(),
                "need -1 < lower_bound < upper_bound".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(env_map: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError> {
    env_map
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw.clone()))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_env_keeps_defaults() {
        let config = EngineConfig::default().with_env_map(HashMap::new()).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::default()
            .with_env_map(env(&[
                (ENV_FALLBACK_SELL_PRICE, "2.80"),
                (ENV_DISCOUNT_RATE, "12"),
                (ENV_IRR_MAX_ITERATIONS, "250"),
            ]))
            .unwrap();

        assert_eq!(config.fallback_sell_price, dec!(2.80));
        assert_eq!(config.fallback_unit_cost, dec!(1.98));
        assert_eq!(config.discount_rate, Some(dec!(12)));
        assert_eq!(config.solver.max_iterations, 250);
    }

    #[test]
    fn test_invalid_env_value() {
        let result = EngineConfig::default().with_env_map(env(&[(ENV_IRR_TOLERANCE, "abc")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue(key, _)) if key == ENV_IRR_TOLERANCE));
    }

    #[test]
    fn test_discount_rate_at_minus_hundred_is_rejected() {
        let result = EngineConfig::default().with_env_map(env(&[(ENV_DISCOUNT_RATE, "-100")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "fallback_unit_cost": "2.10", "solver": { "max_iterations": 50 } }"#)
            .unwrap();

        assert_eq!(config.fallback_unit_cost, dec!(2.10));
        assert_eq!(config.fallback_sell_price, dec!(3.05));
        assert_eq!(config.solver.max_iterations, 50);
        assert_eq!(config.solver.tolerance, dec!(0.0001));
        assert_eq!(config.projection_defaults, ProjectionDefaults::default());
    }
}
