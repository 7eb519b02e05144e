//! A named what-if case and its full evaluation.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::{AmortizationSchedule, calculate_amortization};
use crate::cash_flow::{CashFlowResult, investment_flows, project_cash_flows};
use crate::config::{EngineConfig, ProjectionDefaults};
use crate::error::{EngineError, EngineResult};
use crate::evaluation::{EvaluationResult, evaluate};
use crate::report::{CashFlowAnalysisRow, ScenarioSummary, build_cash_flow_analysis, summarize};
use crate::types::{InvestmentParameters, PaymentFrequency, YearlyAssumption};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub parameters: InvestmentParameters,
    pub projection_years: u32,
    pub assumptions: Vec<YearlyAssumption>,
}

/// Everything derived from one scenario, recomputed in full on every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub amortization: AmortizationSchedule,
    pub cash_flows: Vec<CashFlowResult>,
    pub evaluation: EvaluationResult,
    pub analysis: Vec<CashFlowAnalysisRow>,
    pub summary: ScenarioSummary,
}

impl Scenario {
    /// A scenario whose years are seeded from `config.projection_defaults`.
    pub fn new(
        name: impl Into<String>,
        parameters: InvestmentParameters,
        projection_years: u32,
        config: &EngineConfig,
    ) -> Self {
        let assumptions = default_assumptions(
            &parameters,
            projection_years,
            &config.projection_defaults,
            config.fallback_sell_price,
            config.fallback_unit_cost,
        );
        Scenario {
            name: name.into(),
            parameters,
            projection_years,
            assumptions,
        }
    }

    /// Representative dairy expansion: 6,000,000 at 16.5% a.a. repaid
    /// over 5 years (SAC), herd growing from 215 to 500 cows over 2025-2033.
    pub fn base_case() -> Self {
        let price = dec!(3.05);
        let cost = dec!(1.98);
        let herd: [(u32, Decimal, u32, Decimal); 9] = [
            (215, dec!(33), 90, dec!(0)),
            (265, dec!(35), 365, dec!(0)),
            (338, dec!(36), 365, dec!(0)),
            (425, dec!(37), 365, dec!(0)),
            (500, dec!(38), 365, dec!(720000)),
            (500, dec!(39), 365, dec!(2400000)),
            (500, dec!(40), 365, dec!(1995000)),
            (500, dec!(44), 365, dec!(2295000)),
            (500, dec!(45), 365, dec!(2250000)),
        ];

        let assumptions = herd
            .iter()
            .zip(2025..)
            .map(|(&(cows, litres, days, extra), year)| {
                YearlyAssumption::new(year, cows, litres, days, price, cost).with_extra_revenue(extra)
            })
            .collect();

        Scenario {
            name: "Base case".to_string(),
            parameters: InvestmentParameters {
                principal: dec!(6000000),
                annual_rate: dec!(16.5),
                term_periods: 5,
                grace_years: 0,
                payment_frequency: PaymentFrequency::Annual,
                study_start_year: 2025,
            },
            projection_years: 9,
            assumptions,
        }
    }

    /// Replaces one year, returning the updated scenario.
    pub fn with_assumption(mut self, index: usize, assumption: YearlyAssumption) -> EngineResult<Self> {
        let slot = self.assumptions.get_mut(index).ok_or_else(|| {
            EngineError::invalid("assumptions", format!("no projected year at index {index}"))
        })?;
        *slot = assumption;
        Ok(self)
    }
}

/// One seeded year per projection year, starting at `study_start_year`.
pub fn default_assumptions(
    parameters: &InvestmentParameters,
    projection_years: u32,
    defaults: &ProjectionDefaults,
    sell_price: Decimal,
    production_cost: Decimal,
) -> Vec<YearlyAssumption> {
    (0..projection_years)
        .map_while(|offset| {
            let offset = i32::try_from(offset).ok()?;
            let year = parameters.study_start_year.checked_add(offset)?;
            Some(YearlyAssumption::new(
                year,
                defaults.unit_count,
                defaults.yield_per_unit_per_day,
                defaults.days_in_year,
                sell_price,
                production_cost,
            ))
        })
        .collect()
}

/// Runs every stage of the engine for one scenario.
///
/// # Errors
///
/// Returns an error if the parameters or assumptions are invalid, or if
/// `projection_years` differs from the number of assumptions.
#[tracing::instrument(skip_all, fields(scenario = %scenario.name))]
pub fn evaluate_scenario(scenario: &Scenario, config: &EngineConfig) -> EngineResult<ScenarioReport> {
    if scenario.assumptions.len() != scenario.projection_years as usize {
        return Err(EngineError::invalid(
            "projection_years",
            format!(
                "{} years declared but {} assumptions given",
                scenario.projection_years,
                scenario.assumptions.len()
            ),
        ));
    }

    let params = &scenario.parameters;
    let amortization = calculate_amortization(params)?;
    let cash_flows = project_cash_flows(params, &scenario.assumptions)?;
    let flows = investment_flows(params, &cash_flows);
    let discount_rate = config.discount_rate.unwrap_or(params.annual_rate);
    let evaluation = evaluate(discount_rate, &flows, &config.solver)?;
    let analysis = build_cash_flow_analysis(params, &cash_flows, &evaluation)?;
    let summary = summarize(params, &scenario.assumptions, &cash_flows, &evaluation)?;

    tracing::info!(
        npv = %evaluation.npv.round_dp(2),
        irr = ?evaluation.irr.as_ref().map(|s| s.rate_percent.round_dp(4)),
        payback = evaluation.payback.periods(),
        "scenario evaluated"
    );

    Ok(ScenarioReport {
        name: scenario.name.clone(),
        amortization,
        cash_flows,
        evaluation,
        analysis,
        summary,
    })
}

/// Evaluates each scenario on its own; one failure leaves the rest intact.
pub fn evaluate_scenarios(
    scenarios: &[Scenario],
    config: &EngineConfig,
) -> Vec<(String, EngineResult<ScenarioReport>)> {
    scenarios
        .iter()
        .map(|scenario| {
            let report = evaluate_scenario(scenario, config);
            if let Err(error) = &report {
                tracing::warn!(scenario = %scenario.name, %error, "scenario evaluation failed");
            }
            (scenario.name.clone(), report)
        })
        .collect()
}
