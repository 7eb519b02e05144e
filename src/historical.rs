//! Seeding the first projected year from recorded prices.
//!
//! The ledger side of the application knows what was actually sold and spent
//! in a given year. The engine only consumes the resulting averages through
//! [`HistoricalPriceSource`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::YearlyAssumption;

/// Average price and cost per unit of output recorded for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalAverages {
    pub average_sell_price: Decimal,
    pub average_unit_cost: Decimal,
}

impl HistoricalAverages {
    /// Averages from yearly ledger totals. Both are zero when nothing was
    /// produced.
    pub fn from_totals(total_revenue: Decimal, total_cost: Decimal, total_output: Decimal) -> Self {
        if total_output <= Decimal::ZERO {
            return HistoricalAverages {
                average_sell_price: Decimal::ZERO,
                average_unit_cost: Decimal::ZERO,
            };
        }
        HistoricalAverages {
            average_sell_price: total_revenue / total_output,
            average_unit_cost: total_cost / total_output,
        }
    }

    pub fn margin(&self) -> Decimal {
        self.average_sell_price - self.average_unit_cost
    }
}

/// Read-only lookup of recorded averages by calendar year.
pub trait HistoricalPriceSource {
    fn averages_for_year(&self, year: i32) -> anyhow::Result<Option<HistoricalAverages>>;
}

/// Map-backed source, e.g. averages loaded alongside a scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InMemoryHistory {
    years: HashMap<i32, HistoricalAverages>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, averages: HistoricalAverages) {
        self.years.insert(year, averages);
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

impl HistoricalPriceSource for InMemoryHistory {
    fn averages_for_year(&self, year: i32) -> anyhow::Result<Option<HistoricalAverages>> {
        Ok(self.years.get(&year).copied())
    }
}

/// Returns a copy of `assumptions` whose first year carries the recorded
/// price and cost of that year.
///
/// A missing record, or a zero average, falls back to the configured
/// constants. The input slice is left untouched.
pub fn seed_first_year(
    assumptions: &[YearlyAssumption],
    source: &dyn HistoricalPriceSource,
    config: &EngineConfig,
) -> EngineResult<Vec<YearlyAssumption>> {
    let mut seeded = assumptions.to_vec();
    let Some(first) = seeded.first_mut() else {
        return Ok(seeded);
    };

    let year = first.year;
    let recorded = source
        .averages_for_year(year)
        .map_err(|source| EngineError::HistoricalLookup { year, source })?;

    let (price, cost) = match recorded {
        Some(averages) => (
            non_zero_or(averages.average_sell_price, config.fallback_sell_price),
            non_zero_or(averages.average_unit_cost, config.fallback_unit_cost),
        ),
        None => {
            tracing::debug!(year, "no recorded averages, using fallbacks");
            (config.fallback_sell_price, config.fallback_unit_cost)
        }
    };

    *first = first.clone().with_prices(price, cost);
    Ok(seeded)
}

fn non_zero_or(value: Decimal, fallback: Decimal) -> Decimal {
    if value.is_zero() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    struct FailingSource;

    impl HistoricalPriceSource for FailingSource {
        fn averages_for_year(&self, _year: i32) -> anyhow::Result<Option<HistoricalAverages>> {
            Err(anyhow::anyhow!("database not available"))
        }
    }

    fn years() -> Vec<YearlyAssumption> {
        vec![
            YearlyAssumption::new(2025, 215, dec!(33), 90, dec!(9), dec!(9)),
            YearlyAssumption::new(2026, 265, dec!(35), 365, dec!(9), dec!(9)),
        ]
    }

    #[test]
    fn test_from_totals() {
        let averages = HistoricalAverages::from_totals(dec!(305000), dec!(198000), dec!(100000));
        assert_eq!(averages.average_sell_price, dec!(3.05));
        assert_eq!(averages.average_unit_cost, dec!(1.98));
        assert_eq!(averages.margin(), dec!(1.07));
    }

    #[test]
    fn test_from_totals_without_output() {
        let averages = HistoricalAverages::from_totals(dec!(1000), dec!(500), Decimal::ZERO);
        assert_eq!(averages.average_sell_price, Decimal::ZERO);
        assert_eq!(averages.average_unit_cost, Decimal::ZERO);
    }

    #[test]
    fn test_seed_uses_recorded_averages_for_first_year_only() {
        let mut history = InMemoryHistory::new();
        history.insert(
            2025,
            HistoricalAverages {
                average_sell_price: dec!(2.90),
                average_unit_cost: dec!(2.10),
            },
        );
        let original = years();
        let seeded = seed_first_year(&original, &history, &EngineConfig::default()).unwrap();

        assert_eq!(seeded[0].sell_price, dec!(2.90));
        assert_eq!(seeded[0].production_cost, dec!(2.10));
        assert_eq!(seeded[1].sell_price, dec!(9));
        assert_eq!(original[0].sell_price, dec!(9));
    }

    #[test]
    fn test_seed_falls_back_when_missing_or_zero() {
        let mut history = InMemoryHistory::new();
        history.insert(
            2025,
            HistoricalAverages {
                average_sell_price: Decimal::ZERO,
                average_unit_cost: dec!(2.20),
            },
        );
        let config = EngineConfig::default();

        let seeded = seed_first_year(&years(), &history, &config).unwrap();
        assert_eq!(seeded[0].sell_price, dec!(3.05));
        assert_eq!(seeded[0].production_cost, dec!(2.20));

        let seeded = seed_first_year(&years(), &InMemoryHistory::new(), &config).unwrap();
        assert_eq!(seeded[0].sell_price, dec!(3.05));
        assert_eq!(seeded[0].production_cost, dec!(1.98));
    }

    #[test]
    fn test_seed_propagates_lookup_failure() {
        let result = seed_first_year(&years(), &FailingSource, &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::HistoricalLookup { year: 2025, .. })));
    }

    #[test]
    fn test_history_from_json() {
        let history: InMemoryHistory =
            serde_json::from_str(r#"{ "2024": { "average_sell_price": "2.9", "average_unit_cost": "2.3" } }"#).unwrap();
        assert!(!history.is_empty());
        assert_eq!(history.averages_for_year(2024).unwrap().unwrap().margin(), dec!(0.6));
        assert!(history.averages_for_year(2025).unwrap().is_none());

        let empty: InMemoryHistory = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_seed_empty_assumptions() {
        let seeded = seed_first_year(&[], &FailingSource, &EngineConfig::default()).unwrap();
        assert!(seeded.is_empty());
    }
}
