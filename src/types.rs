use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How often the contractual loan is repaid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentFrequency {
    /// Equal installments every month (Price table).
    Monthly,
    /// Constant amortization once a year (SAC).
    Annual,
}

/// Loan and study parameters of a single scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentParameters {
    /// The amount borrowed and invested at the start of the study.
    pub principal: Decimal,
    /// The annual interest rate as a percentage (e.g., 16.5 for 16.5%).
    pub annual_rate: Decimal,
    /// Number of repayment periods, in years.
    pub term_periods: u32,
    /// Years before the first principal repayment.
    pub grace_years: u32,
    pub payment_frequency: PaymentFrequency,
    /// Calendar year of projection index 0.
    pub study_start_year: i32,
}

impl InvestmentParameters {
    /// Rejects parameter combinations the engine cannot compute with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.principal < Decimal::ZERO {
            return Err(EngineError::invalid("principal", "cannot be negative"));
        }
        if self.annual_rate < Decimal::ZERO {
            return Err(EngineError::invalid("annual_rate", "cannot be negative"));
        }
        if self.term_periods == 0 {
            return Err(EngineError::invalid("term_periods", "must be at least one period"));
        }
        Ok(())
    }

    /// Annual rate as a fraction (16.5 -> 0.165).
    pub fn annual_rate_fraction(&self) -> Decimal {
        self.annual_rate / dec!(100)
    }

    /// The principal repaid on every SAC period.
    pub fn fixed_principal_portion(&self) -> EngineResult<Decimal> {
        if self.term_periods == 0 {
            return Err(EngineError::DivisionByZero {
                context: "fixed principal portion".into(),
            });
        }
        Ok(self.principal / Decimal::from(self.term_periods))
    }
}

/// Operating assumptions for one projected year.
///
/// The yearly output is never stored: [`YearlyAssumption::derived_output`]
/// recomputes it from its three factors on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAssumption {
    pub year: i32,
    /// Productive units, e.g. milking cows.
    pub unit_count: u32,
    pub yield_per_unit_per_day: Decimal,
    /// Productive days; lower than 365 for a partial first year.
    pub days_in_year: u32,
    /// Percentage of output lost before sale (0 to 100).
    #[serde(default)]
    pub loss_percent: Decimal,
    pub sell_price: Decimal,
    pub production_cost: Decimal,
    /// Revenue outside core production, e.g. sale of heifers.
    #[serde(default)]
    pub extra_revenue: Decimal,
}

impl YearlyAssumption {
    pub fn new(
        year: i32,
        unit_count: u32,
        yield_per_unit_per_day: Decimal,
        days_in_year: u32,
        sell_price: Decimal,
        production_cost: Decimal,
    ) -> Self {
        YearlyAssumption {
            year,
            unit_count,
            yield_per_unit_per_day,
            days_in_year,
            loss_percent: Decimal::ZERO,
            sell_price,
            production_cost,
            extra_revenue: Decimal::ZERO,
        }
    }

    pub fn with_loss_percent(mut self, loss_percent: Decimal) -> Self {
        self.loss_percent = loss_percent;
        self
    }

    pub fn with_extra_revenue(mut self, extra_revenue: Decimal) -> Self {
        self.extra_revenue = extra_revenue;
        self
    }

    pub fn with_unit_count(mut self, unit_count: u32) -> Self {
        self.unit_count = unit_count;
        self
    }

    pub fn with_yield_per_unit_per_day(mut self, yield_per_unit_per_day: Decimal) -> Self {
        self.yield_per_unit_per_day = yield_per_unit_per_day;
        self
    }

    pub fn with_days_in_year(mut self, days_in_year: u32) -> Self {
        self.days_in_year = days_in_year;
        self
    }

    pub fn with_prices(mut self, sell_price: Decimal, production_cost: Decimal) -> Self {
        self.sell_price = sell_price;
        self.production_cost = production_cost;
        self
    }

    /// `unit_count * yield_per_unit_per_day * days_in_year`.
    pub fn derived_output(&self) -> Decimal {
        Decimal::from(self.unit_count)
            * self.yield_per_unit_per_day
            * Decimal::from(self.days_in_year)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.yield_per_unit_per_day < Decimal::ZERO {
            return Err(EngineError::invalid(
                "yield_per_unit_per_day",
                format!("negative yield in {}", self.year),
            ));
        }
        if self.days_in_year > 366 {
            return Err(EngineError::invalid(
                "days_in_year",
                format!("{} days in {}", self.days_in_year, self.year),
            ));
        }
        if self.loss_percent < Decimal::ZERO || self.loss_percent > dec!(100) {
            return Err(EngineError::invalid(
                "loss_percent",
                format!("{} is outside 0..=100 in {}", self.loss_percent, self.year),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_year() -> YearlyAssumption {
        YearlyAssumption::new(2026, 265, dec!(35), 365, dec!(3.05), dec!(1.98))
    }

    #[test]
    fn test_derived_output_matches_factors() {
        assert_eq!(sample_year().derived_output(), dec!(3385375));
    }

    #[rstest]
    #[case(sample_year().with_unit_count(300), dec!(3832500))]
    #[case(sample_year().with_yield_per_unit_per_day(dec!(40)), dec!(3869000))]
    #[case(sample_year().with_days_in_year(90), dec!(834750))]
    fn test_derived_output_follows_each_factor(
        #[case] year: YearlyAssumption,
        #[case] expected: Decimal,
    ) {
        assert_eq!(year.derived_output(), expected);
    }

    #[test]
    fn test_loss_percent_out_of_range_is_rejected() {
        let year = sample_year().with_loss_percent(dec!(101));
        assert!(matches!(
            year.validate(),
            Err(EngineError::InvalidInput { ref field, .. }) if field == "loss_percent"
        ));
    }

    #[test]
    fn test_zero_term_is_rejected() {
        let params = InvestmentParameters {
            principal: dec!(100000),
            annual_rate: dec!(10),
            term_periods: 0,
            grace_years: 0,
            payment_frequency: PaymentFrequency::Annual,
            study_start_year: 2025,
        };
        assert!(params.validate().is_err());
        assert!(matches!(
            params.fixed_principal_portion(),
            Err(EngineError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_payment_frequency_serializes_lowercase() {
        let json = serde_json::to_string(&PaymentFrequency::Monthly).unwrap();
        assert_eq!(json, "\"monthly\"");
    }
}
