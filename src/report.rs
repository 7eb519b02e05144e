//! Display-ready views over an evaluated projection.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cash_flow::{CashFlowResult, investment_flows};
use crate::error::{EngineError, EngineResult};
use crate::evaluation::{EvaluationResult, discounted_flows};
use crate::types::{InvestmentParameters, YearlyAssumption};

/// One period of the FCFE analysis table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowAnalysisRow {
    pub period: u32,
    /// `None` for the synthetic investment period.
    pub year: Option<i32>,
    /// `(1 + rate/100)^period`.
    pub discount_factor: Decimal,
    pub investment_outflow: Decimal,
    /// Gross cash generation plus extra revenue.
    pub fcfe_generation: Decimal,
    pub net_flow: Decimal,
    pub cumulative_net_flow: Decimal,
    pub discounted_net_flow: Decimal,
    pub cumulative_discounted_flow: Decimal,
    /// The net flow discounted at the IRR; these sum to ~0.
    pub irr_check: Option<Decimal>,
    /// Fractional payback, set only on the period where it happens.
    pub payback_marker: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// NPV is non-negative.
    pub viable: bool,
    /// IRR is at least the loan rate; `None` without an IRR.
    pub irr_beats_rate: Option<bool>,
    pub average_unit_margin: Decimal,
    /// Principal repaid per SAC period.
    pub principal_installment: Decimal,
    pub total_fcfe_generation: Decimal,
    /// Undiscounted sum of the series, investment included.
    pub total_net_cash_flow: Decimal,
}

/// Builds the per-period table for the series `[-principal, net_0, ..]`.
pub fn build_cash_flow_analysis(
    params: &InvestmentParameters,
    results: &[CashFlowResult],
    evaluation: &EvaluationResult,
) -> EngineResult<Vec<CashFlowAnalysisRow>> {
    let flows = investment_flows(params, results);
    let discounted = discounted_flows(evaluation.discount_rate, &flows)?;
    let irr_discounted = match &evaluation.irr {
        Some(solution) => match discounted_flows(solution.rate_percent, &flows) {
            Ok(values) => Some(values),
            Err(error) => {
                tracing::warn!(rate = %solution.rate_percent, %error, "Cannot discount the series at its IRR");
                None
            }
        },
        None => None,
    };
    let payback_period = evaluation.payback.periods() as usize;
    let payback_fraction = evaluation.payback.fractional();
    let one_plus_r = Decimal::ONE + evaluation.discount_rate / dec!(100);

    let mut cumulative = Decimal::ZERO;
    let mut cumulative_discounted = Decimal::ZERO;
    let mut rows = Vec::with_capacity(flows.len());

    for (t, net_flow) in flows.iter().enumerate() {
        let period = u32::try_from(t).map_err(|_| EngineError::invalid("flows", "series too long"))?;
        let discount_factor = one_plus_r
            .checked_powu(period.into())
            .ok_or_else(|| EngineError::overflow(format!("discount factor at period {t}")))?;
        cumulative += *net_flow;
        cumulative_discounted += discounted[t];

        let year_result = t.checked_sub(1).and_then(|i| results.get(i));
        let fcfe_generation = year_result
            .map(|r| r.gross_cash_generation + r.extra_revenue)
            .unwrap_or_default();

        rows.push(CashFlowAnalysisRow {
            period,
            year: year_result.map(|r| r.year),
            discount_factor,
            investment_outflow: if t == 0 { *net_flow } else { Decimal::ZERO },
            fcfe_generation,
            net_flow: *net_flow,
            cumulative_net_flow: cumulative,
            discounted_net_flow: discounted[t],
            cumulative_discounted_flow: cumulative_discounted,
            irr_check: irr_discounted.as_ref().map(|values| values[t]),
            payback_marker: payback_fraction.filter(|_| t == payback_period),
        });
    }

    Ok(rows)
}

pub fn summarize(
    params: &InvestmentParameters,
    assumptions: &[YearlyAssumption],
    results: &[CashFlowResult],
    evaluation: &EvaluationResult,
) -> EngineResult<ScenarioSummary> {
    let average_unit_margin = if assumptions.is_empty() {
        Decimal::ZERO
    } else {
        let total: Decimal = assumptions
            .iter()
            .map(|a| a.sell_price - a.production_cost)
            .sum();
        total / Decimal::from(assumptions.len() as u64)
    };

    Ok(ScenarioSummary {
        viable: evaluation.npv >= Decimal::ZERO,
        irr_beats_rate: evaluation
            .irr
            .as_ref()
            .map(|solution| solution.rate_percent >= params.annual_rate),
        average_unit_margin,
        principal_installment: params.fixed_principal_portion()?,
        total_fcfe_generation: results
            .iter()
            .map(|r| r.gross_cash_generation + r.extra_revenue)
            .sum(),
        total_net_cash_flow: investment_flows(params, results).iter().sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cash_flow::project_cash_flows;
    use crate::config::IrrSolverConfig;
    use crate::evaluation::{IrrSolution, IrrStatus, Payback, evaluate};
    use crate::types::PaymentFrequency;

    fn params() -> InvestmentParameters {
        InvestmentParameters {
            principal: dec!(1000),
            annual_rate: dec!(10),
            term_periods: 1,
            grace_years: 1,
            payment_frequency: PaymentFrequency::Annual,
            study_start_year: 2025,
        }
    }

    fn years() -> Vec<YearlyAssumption> {
        // 100 units of output a year at a margin of 5 -> 500 a year.
        (0..4)
            .map(|i| YearlyAssumption::new(2025 + i, 1, dec!(1), 100, dec!(6), dec!(1)))
            .collect()
    }

    #[test]
    fn test_analysis_table_lines_up_with_series() {
        let params = params();
        let assumptions = years();
        let results = project_cash_flows(&params, &assumptions).unwrap();
        let flows = investment_flows(&params, &results);
        let evaluation = evaluate(params.annual_rate, &flows, &IrrSolverConfig::default()).unwrap();

        let rows = build_cash_flow_analysis(&params, &results, &evaluation).unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].year, None);
        assert_eq!(rows[0].investment_outflow, dec!(-1000));
        assert_eq!(rows[0].discount_factor, Decimal::ONE);
        assert_eq!(rows[1].year, Some(2025));
        assert_eq!(rows[2].discount_factor, dec!(1.21));
        // One grace year, so year index 2 services the loan: 500 - 1000 - 100.
        assert_eq!(rows[2].net_flow, dec!(500));
        assert_eq!(rows[3].net_flow, dec!(-600));
        assert_eq!(rows[4].cumulative_net_flow, dec!(-100));
        assert!((rows[4].cumulative_discounted_flow - evaluation.npv).abs() < dec!(0.000001));

        // -1000, 500, 500, -600, 500 is still short of the investment at 10%.
        assert_eq!(evaluation.payback, Payback::NotRecovered);
        assert!(rows.iter().all(|r| r.payback_marker.is_none()));
    }

    #[test]
    fn test_payback_marker_sits_on_recovery_period() {
        let params = params();
        // 200 units of output at a margin of 5 -> 1000 a year.
        let assumptions: Vec<YearlyAssumption> = (0..4)
            .map(|i| YearlyAssumption::new(2025 + i, 1, dec!(1), 200, dec!(6), dec!(1)))
            .collect();
        let results = project_cash_flows(&params, &assumptions).unwrap();
        let flows = investment_flows(&params, &results);
        let evaluation = evaluate(params.annual_rate, &flows, &IrrSolverConfig::default()).unwrap();

        let rows = build_cash_flow_analysis(&params, &results, &evaluation).unwrap();

        // 1000/1.1 leaves 100/1.1 to recover, a 0.11 share of 1000/1.21.
        let marked: Vec<(u32, Decimal)> = rows
            .iter()
            .filter_map(|r| r.payback_marker.map(|marker| (r.period, marker)))
            .collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].0, 2);
        assert!((marked[0].1 - dec!(1.11)).abs() < dec!(0.000001));
        assert_eq!(evaluation.payback.fractional(), Some(marked[0].1));
    }

    #[test]
    fn test_irr_check_is_empty_when_irr_cannot_discount() {
        let params = params();
        let results = project_cash_flows(&params, &years()).unwrap();
        let flows = investment_flows(&params, &results);
        let mut evaluation = evaluate(params.annual_rate, &flows, &IrrSolverConfig::default()).unwrap();
        evaluation.irr = Some(IrrSolution {
            rate_percent: dec!(-100),
            status: IrrStatus::IterationsExhausted,
            iterations: 100,
            residual: Decimal::ZERO,
        });

        let rows = build_cash_flow_analysis(&params, &results, &evaluation).unwrap();

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.irr_check.is_none()));
        assert!((rows[4].cumulative_discounted_flow - evaluation.npv).abs() < dec!(0.000001));
    }

    #[test]
    fn test_summary() {
        let params = params();
        let assumptions = years();
        let results = project_cash_flows(&params, &assumptions).unwrap();
        let flows = investment_flows(&params, &results);
        let evaluation = evaluate(params.annual_rate, &flows, &IrrSolverConfig::default()).unwrap();

        let summary = summarize(&params, &assumptions, &results, &evaluation).unwrap();

        assert_eq!(summary.average_unit_margin, dec!(5));
        assert_eq!(summary.principal_installment, dec!(1000));
        assert_eq!(summary.total_fcfe_generation, dec!(2000));
        assert_eq!(summary.total_net_cash_flow, dec!(-100));
        assert!(!summary.viable);
        assert_eq!(summary.viable, evaluation.npv >= Decimal::ZERO);
    }
}
