//! Discounted evaluation of an investment flow series.
//!
//! Every function here takes the prepended series produced by
//! [`crate::cash_flow::investment_flows`]: the (negative) investment at
//! period 0 followed by one net flow per projected year. Rates are
//! percentages at this boundary.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::IrrSolverConfig;
use crate::error::{EngineError, EngineResult};

/// How the IRR solver finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrrStatus {
    /// |NPV| fell below the tolerance.
    Converged,
    /// The iteration cap was hit; `rate_percent` is the last guess and
    /// should be shown with a warning.
    IterationsExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrSolution {
    pub rate_percent: Decimal,
    pub status: IrrStatus,
    pub iterations: u32,
    /// NPV at the returned rate.
    pub residual: Decimal,
}

impl IrrSolution {
    pub fn is_converged(&self) -> bool {
        self.status == IrrStatus::Converged
    }
}

/// Discounted payback of a flow series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Payback {
    Recovered {
        /// Count of whole periods until the cumulative discounted flow is
        /// non-negative.
        periods: u32,
        /// Period count with linear interpolation inside the last period.
        fractional: Decimal,
    },
    /// The series never recovers the investment.
    NotRecovered,
}

impl Payback {
    /// Whole periods, or 0 when never recovered.
    pub fn periods(&self) -> u32 {
        match self {
            Payback::Recovered { periods, .. } => *periods,
            Payback::NotRecovered => 0,
        }
    }

    pub fn fractional(&self) -> Option<Decimal> {
        match self {
            Payback::Recovered { fractional, .. } => Some(*fractional),
            Payback::NotRecovered => None,
        }
    }
}

/// Scenario-level figures derived from one flow series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Rate (percent) used for NPV and payback.
    pub discount_rate: Decimal,
    pub npv: Decimal,
    /// `None` when the solver aborted.
    pub irr: Option<IrrSolution>,
    pub payback: Payback,
}

/// Net Present Value: `sum(flow[t] / (1 + rate/100)^t)`.
///
/// # Errors
///
/// Returns an error if `rate_percent <= -100`, the series is empty, or a
/// discounted flow does not fit in a `Decimal` (see [`discounted_flows`]).
pub fn npv(rate_percent: Decimal, flows: &[Decimal]) -> EngineResult<Decimal> {
    discounted_flows(rate_percent, flows)?
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, value| {
            acc.checked_add(value)
                .ok_or_else(|| EngineError::overflow("NPV sum"))
        })
}

/// Each flow divided by its discount factor `(1 + rate/100)^t`.
///
/// For negative rates the flows are multiplied by the growing reciprocal
/// `(1 + rate/100)^-t` instead, since the factor itself would shrink below
/// the smallest `Decimal` after a few dozen periods. A discounted flow that
/// exceeds `Decimal::MAX` (a -99% rate over about 15 periods) is reported
/// as [`EngineError::NumericOverflow`].
pub fn discounted_flows(rate_percent: Decimal, flows: &[Decimal]) -> EngineResult<Vec<Decimal>> {
    check_series(flows)?;
    let one_plus_r = discount_base(rate_percent)?;

    let mut discounted = Vec::with_capacity(flows.len());
    if one_plus_r < Decimal::ONE {
        let growth = Decimal::ONE
            .checked_div(one_plus_r)
            .ok_or_else(|| EngineError::overflow("discount growth"))?;
        let mut multiplier = Decimal::ONE;
        for (t, flow) in flows.iter().enumerate() {
            if t > 0 {
                multiplier = multiplier
                    .checked_mul(growth)
                    .ok_or_else(|| EngineError::overflow(format!("discount multiplier at period {t}")))?;
            }
            let value = flow
                .checked_mul(multiplier)
                .ok_or_else(|| EngineError::overflow(format!("discounted flow at period {t}")))?;
            discounted.push(value);
        }
        return Ok(discounted);
    }

    let mut factor = Decimal::ONE;
    for (t, flow) in flows.iter().enumerate() {
        if t > 0 {
            factor = factor
                .checked_mul(one_plus_r)
                .ok_or_else(|| EngineError::overflow(format!("discount factor at period {t}")))?;
        }
        let value = flow
            .checked_div(factor)
            .ok_or_else(|| EngineError::overflow(format!("discounted flow at period {t}")))?;
        discounted.push(value);
    }

    Ok(discounted)
}

/// Internal Rate of Return by Newton-Raphson.
///
/// Starts from `config.initial_guess` and keeps every guess inside
/// `[lower_bound, upper_bound]`: a step that would leave the range lands
/// halfway between the current guess and the bound it crossed. The solver
/// works in `f64`, where `(1 + rate)^t` stays finite for any realistic
/// horizon; if it does not, the guess backs off toward the last rate that
/// evaluated cleanly. Running out of iterations is not an error: the last
/// guess comes back with [`IrrStatus::IterationsExhausted`].
///
/// # Errors
///
/// Returns [`EngineError::ConvergenceFailure`] when the derivative vanishes
/// (e.g. every flow after period 0 is zero).
pub fn irr(flows: &[Decimal], config: &IrrSolverConfig) -> EngineResult<IrrSolution> {
    check_series(flows)?;
    if flows.len() < 2 {
        return Err(EngineError::invalid("flows", "IRR requires at least 2 cash flows"));
    }

    let series = flows
        .iter()
        .map(ToPrimitive::to_f64)
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| EngineError::overflow("IRR cash flows"))?;
    let tolerance = solver_setting(config.tolerance, "tolerance")?;
    let lower = solver_setting(config.lower_bound, "lower_bound")?;
    let upper = solver_setting(config.upper_bound, "upper_bound")?;

    let mut guess = solver_setting(config.initial_guess, "initial_guess")?
        .max(lower)
        .min(upper);
    let mut last_finite: Option<f64> = None;
    let mut npv_at_guess = 0.0;

    for iteration in 0..config.max_iterations {
        let Some((value, derivative)) = npv_and_derivative(guess, &series) else {
            let Some(previous) = last_finite else {
                tracing::warn!(iteration, rate = guess, "IRR discount terms out of range");
                return Err(EngineError::ConvergenceFailure {
                    iterations: iteration,
                    last_rate: to_decimal(guess * 100.0),
                });
            };
            tracing::debug!(iteration, rate = guess, previous, "IRR discount terms out of range, backing off");
            guess = (guess + previous) / 2.0;
            continue;
        };
        last_finite = Some(guess);
        npv_at_guess = value;

        if value.abs() < tolerance {
            tracing::debug!(iterations = iteration, rate = guess, "IRR converged");
            return Ok(IrrSolution {
                rate_percent: to_decimal(guess * 100.0),
                status: IrrStatus::Converged,
                iterations: iteration,
                residual: to_decimal(value),
            });
        }

        if derivative == 0.0 {
            tracing::warn!(iteration, rate = guess, "IRR derivative is zero");
            return Err(EngineError::ConvergenceFailure {
                iterations: iteration,
                last_rate: to_decimal(guess * 100.0),
            });
        }

        guess = bounded_step(guess, guess - value / derivative, lower, upper);
    }

    let residual = npv_and_derivative(guess, &series)
        .map(|(value, _)| value)
        .unwrap_or(npv_at_guess);

    tracing::warn!(
        iterations = config.max_iterations,
        rate = guess,
        residual,
        "IRR did not converge"
    );

    Ok(IrrSolution {
        rate_percent: to_decimal(guess * 100.0),
        status: IrrStatus::IterationsExhausted,
        iterations: config.max_iterations,
        residual: to_decimal(residual),
    })
}

/// Discounted payback, walking the cumulative discounted flow.
///
/// The first period `t >= 1` at which the running total turns non-negative
/// gives `periods = t` and `fractional = (t - 1) + |prior| / discounted[t]`.
pub fn payback(rate_percent: Decimal, flows: &[Decimal]) -> EngineResult<Payback> {
    let discounted = discounted_flows(rate_percent, flows)?;

    let mut cumulative = discounted[0];
    if cumulative >= Decimal::ZERO {
        return Ok(Payback::Recovered {
            periods: 0,
            fractional: Decimal::ZERO,
        });
    }

    for (t, current) in discounted.iter().enumerate().skip(1) {
        let prior = cumulative;
        cumulative += *current;
        if cumulative >= Decimal::ZERO {
            let periods = u32::try_from(t).map_err(|_| EngineError::invalid("flows", "series too long"))?;
            let fractional = Decimal::from(periods - 1) + prior.abs() / *current;
            return Ok(Payback::Recovered { periods, fractional });
        }
    }

    Ok(Payback::NotRecovered)
}

/// NPV, IRR and payback of one series.
///
/// A solver abort is reported as `irr: None`; domain errors still propagate.
pub fn evaluate(
    discount_rate: Decimal,
    flows: &[Decimal],
    solver: &IrrSolverConfig,
) -> EngineResult<EvaluationResult> {
    let npv = npv(discount_rate, flows)?;
    let payback = payback(discount_rate, flows)?;
    let irr = match irr(flows, solver) {
        Ok(solution) => Some(solution),
        Err(EngineError::ConvergenceFailure { .. }) => None,
        Err(other) => return Err(other),
    };

    Ok(EvaluationResult {
        discount_rate,
        npv,
        irr,
        payback,
    })
}

fn check_series(flows: &[Decimal]) -> EngineResult<()> {
    if flows.is_empty() {
        return Err(EngineError::invalid("flows", "cash flow series is empty"));
    }
    Ok(())
}

fn discount_base(rate_percent: Decimal) -> EngineResult<Decimal> {
    if rate_percent <= dec!(-100) {
        return Err(EngineError::invalid("discount_rate", "must be greater than -100%"));
    }
    Ok(Decimal::ONE + rate_percent / dec!(100))
}

/// Newton target `next`, pulled back inside `[lower, upper]`.
fn bounded_step(guess: f64, next: f64, lower: f64, upper: f64) -> f64 {
    if next < lower {
        (guess + lower) / 2.0
    } else if next > upper {
        (guess + upper) / 2.0
    } else {
        next
    }
}

/// NPV at `rate` (a fraction) and its derivative
/// `sum(-t * flow[t] / (1 + rate)^(t + 1))`. `None` unless both are finite.
fn npv_and_derivative(rate: f64, flows: &[f64]) -> Option<(f64, f64)> {
    let one_plus_r = 1.0 + rate;
    let mut factor = 1.0;
    let mut value = 0.0;
    let mut derivative = 0.0;

    for (t, flow) in flows.iter().enumerate() {
        if t > 0 {
            factor *= one_plus_r;
            derivative -= t as f64 * flow / (factor * one_plus_r);
        }
        value += flow / factor;
    }

    (value.is_finite() && derivative.is_finite()).then_some((value, derivative))
}

fn solver_setting(value: Decimal, field: &str) -> EngineResult<f64> {
    value
        .to_f64()
        .ok_or_else(|| EngineError::invalid(field, "not representable as f64"))
}

/// Saturates at the `Decimal` range.
fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(if value.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}
