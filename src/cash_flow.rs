//! Yearly free cash flow to equity (FCFE).
//!
//! Debt service always follows the SAC convention here, whatever the
//! contractual payment frequency: repayment starts the year after the grace
//! period and lasts `term_periods` years.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{InvestmentParameters, YearlyAssumption};

/// Cash generation of one projected year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowResult {
    pub year: i32,
    /// 0-based projection index.
    pub index: usize,
    pub derived_output: Decimal,
    /// Output left after losses.
    pub effective_output: Decimal,
    /// Sell price minus production cost.
    pub unit_margin: Decimal,
    pub gross_cash_generation: Decimal,
    pub in_repayment: bool,
    pub principal_due: Decimal,
    pub interest_due: Decimal,
    pub extra_revenue: Decimal,
    pub net_cash_flow: Decimal,
}

/// Inclusive range of projection indices in which the loan is serviced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepaymentWindow {
    pub first: usize,
    pub last: usize,
}

impl RepaymentWindow {
    pub fn for_parameters(params: &InvestmentParameters) -> Self {
        let first = params.grace_years as usize + 1;
        let last = first + params.term_periods as usize - 1;
        RepaymentWindow { first, last }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }
}

/// Projects one [`CashFlowResult`] per assumption, index for index.
///
/// # Errors
///
/// Returns an error if the parameters are invalid, an assumption is
/// malformed, or the assumptions are not consecutive years starting at
/// `study_start_year`.
pub fn project_cash_flows(
    params: &InvestmentParameters,
    assumptions: &[YearlyAssumption],
) -> EngineResult<Vec<CashFlowResult>> {
    params.validate()?;
    check_alignment(params, assumptions)?;

    let window = RepaymentWindow::for_parameters(params);
    let fixed_principal = params.fixed_principal_portion()?;
    let annual_rate = params.annual_rate_fraction();

    let results = assumptions
        .iter()
        .enumerate()
        .map(|(index, assumption)| {
            let derived_output = assumption.derived_output();
            let effective_output = derived_output * (Decimal::ONE - assumption.loss_percent / dec!(100));
            let unit_margin = assumption.sell_price - assumption.production_cost;
            let gross_cash_generation = effective_output * unit_margin;

            let in_repayment = window.contains(index);
            let (principal_due, interest_due) = if in_repayment {
                let years_already_paid = Decimal::from(index.saturating_sub(window.first) as u64);
                let outstanding = params.principal - fixed_principal * years_already_paid;
                (fixed_principal, outstanding * annual_rate)
            } else {
                (Decimal::ZERO, Decimal::ZERO)
            };

            let net_cash_flow =
                gross_cash_generation - principal_due - interest_due + assumption.extra_revenue;

            CashFlowResult {
                year: assumption.year,
                index,
                derived_output,
                effective_output,
                unit_margin,
                gross_cash_generation,
                in_repayment,
                principal_due,
                interest_due,
                extra_revenue: assumption.extra_revenue,
                net_cash_flow,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        years = results.len(),
        first_repayment = window.first,
        last_repayment = window.last,
        "cash flows projected"
    );

    Ok(results)
}

/// The evaluation series: `-principal` at period 0 followed by each year's
/// net cash flow.
pub fn investment_flows(params: &InvestmentParameters, results: &[CashFlowResult]) -> Vec<Decimal> {
    std::iter::once(-params.principal)
        .chain(results.iter().map(|r| r.net_cash_flow))
        .collect()
}

fn check_alignment(params: &InvestmentParameters, assumptions: &[YearlyAssumption]) -> EngineResult<()> {
    if assumptions.is_empty() {
        return Err(EngineError::invalid("assumptions", "at least one projected year is required"));
    }

    for (index, assumption) in assumptions.iter().enumerate() {
        let expected = i32::try_from(index)
            .ok()
            .and_then(|offset| params.study_start_year.checked_add(offset))
            .ok_or_else(|| EngineError::invalid("assumptions", "too many projected years"))?;
        if assumption.year != expected {
            return Err(EngineError::MisalignedAssumptions {
                index,
                expected,
                found: assumption.year,
            });
        }
        assumption.validate()?;
    }

    Ok(())
}
