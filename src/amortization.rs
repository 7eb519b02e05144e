//! Contractual repayment schedules.
//!
//! Two systems are supported, selected by [`PaymentFrequency`]:
//! - **Price (Sistema Francês)**, monthly: the installment is fixed and the
//!   interest/principal split shifts over time.
//! - **SAC (Sistema de Amortização Constante)**, annual: the principal portion
//!   is fixed and the installment declines with the balance.

use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{InvestmentParameters, PaymentFrequency};

/// Residual balance below this magnitude is rounding dust.
const BALANCE_DUST: Decimal = dec!(0.000001);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmortizationSystem {
    Price,
    Sac,
}

/// One payment period of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationRow {
    /// 1-indexed period number.
    pub period: u32,
    pub due_date: NaiveDate,
    pub interest_portion: Decimal,
    pub principal_portion: Decimal,
    pub installment_total: Decimal,
    /// Balance after this payment, never negative.
    pub remaining_balance: Decimal,
    /// Cash paid through this period.
    pub cumulative_cost: Decimal,
}

/// A complete schedule plus its headline figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmortizationSchedule {
    pub system: AmortizationSystem,
    /// The first installment; constant throughout for Price.
    pub first_installment: Decimal,
    /// The last installment; the lowest one for SAC.
    pub last_installment: Decimal,
    pub total_interest: Decimal,
    /// The total amount paid over the lifetime of the loan.
    pub total_paid: Decimal,
    pub rows: Vec<AmortizationRow>,
}

/// Builds the schedule matching the scenario's payment frequency.
///
/// # Errors
///
/// Returns an error if the parameters are invalid (e.g. zero term).
pub fn calculate_amortization(params: &InvestmentParameters) -> EngineResult<AmortizationSchedule> {
    params.validate()?;

    let schedule = match params.payment_frequency {
        PaymentFrequency::Monthly => calculate_price_schedule(params)?,
        PaymentFrequency::Annual => calculate_sac_schedule(params)?,
    };

    tracing::debug!(
        system = ?schedule.system,
        periods = schedule.rows.len(),
        total_paid = %schedule.total_paid,
        "amortization schedule built"
    );

    Ok(schedule)
}

/// Calculates the monthly Price table (fixed payments).
///
/// The Price table formula is: PMT = P * [i(1 + i)^n] / [(1 + i)^n – 1], with
/// the nominal monthly rate `i = annual_rate / 100 / 12` and `n = term * 12`.
/// At a zero rate the installment is simply `P / n`.
///
/// `cumulative_cost` is `installment * period`.
pub fn calculate_price_schedule(params: &InvestmentParameters) -> EngineResult<AmortizationSchedule> {
    params.validate()?;

    let monthly_rate = params.annual_rate / dec!(100) / dec!(12);
    let total_months = params
        .term_periods
        .checked_mul(12)
        .ok_or_else(|| EngineError::invalid("term_periods", "too many monthly periods"))?;
    let installment = price_installment(params.principal, monthly_rate, total_months)?;
    let start = study_start_date(params.study_start_year)?;

    let mut balance = params.principal;
    let mut total_interest = Decimal::ZERO;
    let mut rows = Vec::with_capacity(total_months as usize);

    for month in 1..=total_months {
        let interest = balance * monthly_rate;
        let principal_portion = installment - interest;
        balance -= principal_portion;
        total_interest += interest;

        let due_date = start
            .checked_add_months(Months::new(month))
            .ok_or_else(|| EngineError::invalid("term_periods", "due date out of range"))?;

        rows.push(AmortizationRow {
            period: month,
            due_date,
            interest_portion: interest,
            principal_portion,
            installment_total: installment,
            remaining_balance: settle_balance(balance, month == total_months),
            cumulative_cost: installment * Decimal::from(month),
        });
    }

    Ok(AmortizationSchedule {
        system: AmortizationSystem::Price,
        first_installment: installment.round_dp(2),
        last_installment: installment.round_dp(2),
        total_interest: total_interest.round_dp(2),
        total_paid: (installment * Decimal::from(total_months)).round_dp(2),
        rows,
    })
}

/// Calculates the annual SAC table (constant amortization).
///
/// The principal portion is `P / term` every year while interest accrues on
/// the outstanding balance, so installments decline over time.
/// `cumulative_cost` is the running sum of installments.
pub fn calculate_sac_schedule(params: &InvestmentParameters) -> EngineResult<AmortizationSchedule> {
    params.validate()?;

    let annual_rate = params.annual_rate_fraction();
    let fixed_amortization = params.fixed_principal_portion()?;
    let mut balance = params.principal;
    let mut cumulative = Decimal::ZERO;
    let mut total_interest = Decimal::ZERO;
    let mut rows = Vec::with_capacity(params.term_periods as usize);

    for year in 1..=params.term_periods {
        let interest = balance * annual_rate;
        let installment = fixed_amortization + interest;
        balance -= fixed_amortization;
        cumulative += installment;
        total_interest += interest;

        let due_year = i32::try_from(year)
            .ok()
            .and_then(|offset| params.study_start_year.checked_add(offset))
            .ok_or_else(|| EngineError::invalid("term_periods", "due date out of range"))?;

        rows.push(AmortizationRow {
            period: year,
            due_date: study_start_date(due_year)?,
            interest_portion: interest,
            principal_portion: fixed_amortization,
            installment_total: installment,
            remaining_balance: settle_balance(balance, year == params.term_periods),
            cumulative_cost: cumulative,
        });
    }

    let first_installment = rows.first().map(|r| r.installment_total).unwrap_or_default();
    let last_installment = rows.last().map(|r| r.installment_total).unwrap_or_default();

    Ok(AmortizationSchedule {
        system: AmortizationSystem::Sac,
        first_installment: first_installment.round_dp(2),
        last_installment: last_installment.round_dp(2),
        total_interest: total_interest.round_dp(2),
        total_paid: cumulative.round_dp(2),
        rows,
    })
}

fn price_installment(principal: Decimal, monthly_rate: Decimal, total_months: u32) -> EngineResult<Decimal> {
    if total_months == 0 {
        return Err(EngineError::DivisionByZero {
            context: "Price installment".into(),
        });
    }
    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(total_months));
    }

    let growth = (Decimal::ONE + monthly_rate)
        .checked_powu(total_months.into())
        .ok_or_else(|| EngineError::overflow("Price compounding factor"))?;
    let denominator = growth - Decimal::ONE;
    if denominator.is_zero() {
        return Err(EngineError::DivisionByZero {
            context: "Price installment".into(),
        });
    }

    principal
        .checked_mul(monthly_rate * growth)
        .map(|numerator| numerator / denominator)
        .ok_or_else(|| EngineError::overflow("Price installment"))
}

fn study_start_date(year: i32) -> EngineResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| EngineError::invalid("study_start_year", format!("{year} is not a valid year")))
}

fn settle_balance(balance: Decimal, last_period: bool) -> Decimal {
    if last_period && balance.abs() < BALANCE_DUST {
        return Decimal::ZERO;
    }
    balance.max(Decimal::ZERO)
}
